// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Remote Container
//!
//! Identity of the container a mirror session targets. A [`RemoteContainer`]
//! is produced by a [`RemoteContainerResolver`] before a session starts and is
//! read-only for the lifetime of the session.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Container identity, log context and resolution contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::radar::{RadarClient, RadarConnectionProvider, RadarError};

/// Opaque container id as reported by the container runtime on the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the cluster node a container is scheduled on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeName(pub String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-facing reference to a container, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef {
    pub pod: String,

    /// Container name inside the pod. `None` selects the first container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl ContainerRef {
    pub fn new(pod: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            container: None,
            namespace: default_namespace(),
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod)?;
        if let Some(container) = &self.container {
            write!(f, ":{}", container)?;
        }
        Ok(())
    }
}

/// A fully resolved target container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContainer {
    pub id: ContainerId,
    pub node_name: NodeName,
    pub pod_name: String,
    pub container_name: String,
    pub namespace: String,
}

impl RemoteContainer {
    /// Structured log context for this container.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pod", self.pod_name.clone()),
            ("container", self.container_name.clone()),
            ("node", self.node_name.to_string()),
            ("namespace", self.namespace.clone()),
            ("container_id", self.id.to_string()),
        ]
    }

    /// Tracing span carrying [`RemoteContainer::fields`]; every session task is
    /// instrumented with it so log lines inherit the container context.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "container",
            pod = %self.pod_name,
            container = %self.container_name,
            node = %self.node_name,
            namespace = %self.namespace,
            container_id = %self.id,
        )
    }

    /// Control channel to the Radar agent on this container's node.
    pub async fn radar(
        &self,
        provider: &dyn RadarConnectionProvider,
    ) -> Result<Arc<dyn RadarClient>, RadarError> {
        provider.radar_connection(&self.node_name).await
    }
}

impl fmt::Display for RemoteContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{} on {}",
            self.namespace, self.pod_name, self.container_name, self.node_name
        )
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no container matches {0}")]
    NotFound(String),
    #[error("container reference {0} matches more than one container")]
    Ambiguous(String),
}

#[async_trait]
pub trait RemoteContainerResolver: Send + Sync {
    async fn resolve(&self, reference: &ContainerRef) -> Result<RemoteContainer, ResolveError>;
}

fn default_namespace() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_ref_display() {
        let reference = ContainerRef::new("web-7d9f").with_container("app");
        assert_eq!(reference.to_string(), "default/web-7d9f:app");

        let reference = ContainerRef::new("web-7d9f").with_namespace("staging");
        assert_eq!(reference.to_string(), "staging/web-7d9f");
    }

    #[test]
    fn test_container_ref_namespace_defaults_when_missing() {
        let reference: ContainerRef = serde_yaml::from_str("pod: web-7d9f").unwrap();
        assert_eq!(reference.namespace, "default");
        assert!(reference.container.is_none());
    }

    #[test]
    fn test_fields_carry_node_and_id() {
        let container = RemoteContainer {
            id: ContainerId::new("abc123"),
            node_name: NodeName::new("node-1"),
            pod_name: "web-7d9f".to_string(),
            container_name: "app".to_string(),
            namespace: "default".to_string(),
        };

        let fields = container.fields();
        assert!(fields.contains(&("node", "node-1".to_string())));
        assert!(fields.contains(&("container_id", "abc123".to_string())));
        assert_eq!(container.to_string(), "default/web-7d9f:app on node-1");
    }
}
