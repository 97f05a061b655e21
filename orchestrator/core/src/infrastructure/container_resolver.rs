// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

// Static Container Resolver
//
// Resolves container references against the `spec.containers` table of the
// configuration manifest. Pods with several containers resolve to the first
// listed one unless a container name is given.

use async_trait::async_trait;

use crate::domain::container::{
    ContainerId, ContainerRef, NodeName, RemoteContainer, RemoteContainerResolver, ResolveError,
};
use crate::domain::mirror_config::ContainerEntry;

#[derive(Debug, Clone, Default)]
pub struct StaticContainerResolver {
    entries: Vec<ContainerEntry>,
}

impl StaticContainerResolver {
    pub fn new(entries: Vec<ContainerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }
}

#[async_trait]
impl RemoteContainerResolver for StaticContainerResolver {
    async fn resolve(&self, reference: &ContainerRef) -> Result<RemoteContainer, ResolveError> {
        let mut matches = self.entries.iter().filter(|entry| {
            entry.pod == reference.pod
                && entry.namespace == reference.namespace
                && reference
                    .container
                    .as_ref()
                    .is_none_or(|name| &entry.container == name)
        });

        let entry = matches
            .next()
            .ok_or_else(|| ResolveError::NotFound(reference.to_string()))?;

        // Duplicate rows for an explicitly named container can't be told apart.
        if reference.container.is_some() && matches.next().is_some() {
            return Err(ResolveError::Ambiguous(reference.to_string()));
        }

        tracing::debug!(reference = %reference, id = %entry.id, node = %entry.node, "resolved container");

        Ok(RemoteContainer {
            id: ContainerId::new(entry.id.clone()),
            node_name: NodeName::new(entry.node.clone()),
            pod_name: entry.pod.clone(),
            container_name: entry.container.clone(),
            namespace: entry.namespace.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pod: &str, container: &str, namespace: &str, id: &str) -> ContainerEntry {
        ContainerEntry {
            pod: pod.to_string(),
            container: container.to_string(),
            namespace: namespace.to_string(),
            node: "node-1".to_string(),
            id: id.to_string(),
        }
    }

    fn resolver() -> StaticContainerResolver {
        StaticContainerResolver::new(vec![
            entry("web-7d9f", "app", "default", "c-app"),
            entry("web-7d9f", "sidecar", "default", "c-sidecar"),
            entry("web-7d9f", "app", "staging", "c-staging"),
        ])
    }

    #[tokio::test]
    async fn test_first_container_when_unnamed() {
        let container = resolver()
            .resolve(&ContainerRef::new("web-7d9f"))
            .await
            .unwrap();

        assert_eq!(container.id.as_str(), "c-app");
        assert_eq!(container.node_name.as_str(), "node-1");
    }

    #[tokio::test]
    async fn test_named_container_and_namespace() {
        let resolver = resolver();

        let sidecar = resolver
            .resolve(&ContainerRef::new("web-7d9f").with_container("sidecar"))
            .await
            .unwrap();
        assert_eq!(sidecar.id.as_str(), "c-sidecar");

        let staging = resolver
            .resolve(&ContainerRef::new("web-7d9f").with_namespace("staging"))
            .await
            .unwrap();
        assert_eq!(staging.id.as_str(), "c-staging");
        assert_eq!(staging.namespace, "staging");
    }

    #[test]
    fn test_not_found() {
        let err = tokio_test::assert_err!(tokio_test::block_on(
            resolver().resolve(&ContainerRef::new("web-7d9f").with_container("db"))
        ));
        assert!(matches!(err, ResolveError::NotFound(r) if r == "default/web-7d9f:db"));

        tokio_test::assert_err!(tokio_test::block_on(
            resolver().resolve(&ContainerRef::new("web-7d9f").with_namespace("prod"))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_named_container_is_ambiguous() {
        let resolver = StaticContainerResolver::new(vec![
            entry("api", "app", "default", "one"),
            entry("api", "app", "default", "two"),
        ]);

        let err = resolver
            .resolve(&ContainerRef::new("api").with_container("app"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous(_)));
    }
}
