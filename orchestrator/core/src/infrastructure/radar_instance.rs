// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Radar Instance
//!
//! Config-backed [`RadarConnectionProvider`].
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Pool control channels and data-channel forwards per node
//! - **Integration:** Mirror session → Radar gRPC / engine data port
//!
//! Control channels are dialed once per node and shared by every session that
//! targets the node. Data-channel forwards are opened once per node as well and
//! live until the instance is dropped. Errors raised while forwarding engine
//! traffic are reported into the instance's [`TransportErrorHandlers`], which
//! is the registry sessions must be built with.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::container::NodeName;
use crate::domain::mirror_config::RadarConfig;
use crate::domain::radar::{RadarClient, RadarConnectionProvider, RadarError};
use crate::domain::transport::TransportErrorHandlers;
use crate::infrastructure::grpc_radar::GrpcRadarClient;
use crate::infrastructure::port_forward::PortForward;

pub struct RadarInstance {
    config: RadarConfig,
    errors: TransportErrorHandlers,
    channels: DashMap<NodeName, Arc<dyn RadarClient>>,
    forwards: DashMap<NodeName, Arc<PortForward>>,
}

impl RadarInstance {
    pub fn new(config: RadarConfig) -> Self {
        Self::with_transport_errors(config, TransportErrorHandlers::new())
    }

    pub fn with_transport_errors(config: RadarConfig, errors: TransportErrorHandlers) -> Self {
        Self {
            config,
            errors,
            channels: DashMap::new(),
            forwards: DashMap::new(),
        }
    }

    /// Registry that data-channel failures are reported into.
    pub fn transport_errors(&self) -> TransportErrorHandlers {
        self.errors.clone()
    }

    pub fn config(&self) -> &RadarConfig {
        &self.config
    }

    fn address(&self, node: &NodeName) -> Result<String, RadarError> {
        let address = self.config.node_address(node.as_str());
        if address.is_empty() {
            return Err(RadarError::UnknownNode(node.to_string()));
        }
        Ok(address)
    }
}

#[async_trait]
impl RadarConnectionProvider for RadarInstance {
    async fn radar_connection(&self, node: &NodeName) -> Result<Arc<dyn RadarClient>, RadarError> {
        if let Some(client) = self.channels.get(node) {
            return Ok(client.clone());
        }

        let address = self.address(node)?;
        let client: Arc<dyn RadarClient> = Arc::new(
            GrpcRadarClient::connect(node, &address, self.config.port, self.config.connect_timeout)
                .await?,
        );

        // A concurrent caller may have won the race; keep whichever landed first.
        let client = self
            .channels
            .entry(node.clone())
            .or_insert(client)
            .value()
            .clone();
        Ok(client)
    }

    async fn mirror_connection(&self, node: &NodeName) -> Result<u16, RadarError> {
        if let Some(forward) = self.forwards.get(node) {
            return Ok(forward.local_port());
        }

        let address = self.address(node)?;
        let remote = format!("{}:{}", address, self.config.mirror_port);
        let forward = PortForward::open(remote, self.errors.clone())
            .await
            .map_err(|e| RadarError::DataChannel {
                node: node.to_string(),
                message: e.to_string(),
            })?;

        info!(
            node = %node,
            local_port = forward.local_port(),
            remote = forward.remote(),
            "opened data channel"
        );

        let forward = self
            .forwards
            .entry(node.clone())
            .or_insert(Arc::new(forward))
            .value()
            .clone();
        debug!(node = %node, forwards = self.forwards.len(), "data channel ready");
        Ok(forward.local_port())
    }
}
