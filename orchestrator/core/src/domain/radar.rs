// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Radar Contracts
//!
//! Radar is the per-node agent a mirror session talks to. The orchestrator only
//! depends on its RPC surface ([`RadarClient`]) and on the way connections to it
//! are obtained ([`RadarConnectionProvider`]).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Control-channel and data-channel acquisition contracts

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::container::{ContainerId, NodeName};

#[derive(Debug, Error)]
pub enum RadarError {
    #[error("no radar address known for node {0}")]
    UnknownNode(String),
    #[error("radar on node {node} is unreachable: {message}")]
    Unreachable { node: String, message: String },
    #[error("radar request failed: {0}")]
    Rpc(String),
    #[error("failed to open data channel to node {node}: {message}")]
    DataChannel { node: String, message: String },
}

/// Control-channel RPCs exposed by a node's Radar agent.
#[async_trait]
pub trait RadarClient: Send + Sync {
    /// Synchronization root of the container, as an absolute path on the node.
    async fn get_base_path(&self, container: &ContainerId) -> Result<String, RadarError>;

    /// Restart the main process inside the container.
    async fn restart(&self, container: &ContainerId) -> Result<(), RadarError>;
}

/// Hands out connections to Radar agents. Implementations are free to pool or
/// cache connections per node.
#[async_trait]
pub trait RadarConnectionProvider: Send + Sync {
    /// Reusable control channel to the node's Radar.
    async fn radar_connection(&self, node: &NodeName) -> Result<Arc<dyn RadarClient>, RadarError>;

    /// Local port that carries the sync engine's data channel to the node.
    async fn mirror_connection(&self, node: &NodeName) -> Result<u16, RadarError>;
}
