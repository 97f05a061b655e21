// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Radar gRPC Client
//!
//! [`RadarClient`] implementation over the generated `radar` tonic stubs.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** gRPC communication with the per-node Radar agent
//! - **Integration:** Mirror session → Radar gRPC API
//!
//! Calls carry no deadline: a slow Radar blocks the caller until the transport
//! gives up, the same as every other control-channel operation in a session.

use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use crate::domain::container::{ContainerId, NodeName};
use crate::domain::radar::{RadarClient, RadarError};
use crate::infrastructure::radar_proto::radar_client::RadarClient as RadarServiceClient;
use crate::infrastructure::radar_proto::ContainerPath;

#[derive(Clone)]
pub struct GrpcRadarClient {
    client: RadarServiceClient<Channel>,
    node: NodeName,
}

impl GrpcRadarClient {
    pub async fn connect(
        node: &NodeName,
        address: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, RadarError> {
        let uri = format!("http://{}:{}", address, port);
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| RadarError::Unreachable {
                node: node.to_string(),
                message: format!("invalid radar address {}: {}", uri, e),
            })?
            .connect_timeout(connect_timeout);

        let channel = endpoint.connect().await.map_err(|e| RadarError::Unreachable {
            node: node.to_string(),
            message: format!("{}: {}", uri, e),
        })?;

        tracing::debug!(node = %node, %uri, "connected to radar");
        Ok(Self::from_channel(node.clone(), channel))
    }

    pub fn from_channel(node: NodeName, channel: Channel) -> Self {
        Self {
            client: RadarServiceClient::new(channel),
            node,
        }
    }

    fn map_status(&self, status: Status) -> RadarError {
        match status.code() {
            Code::Unavailable => RadarError::Unreachable {
                node: self.node.to_string(),
                message: status.message().to_string(),
            },
            code => RadarError::Rpc(format!("{:?}: {}", code, status.message())),
        }
    }
}

#[async_trait]
impl RadarClient for GrpcRadarClient {
    async fn get_base_path(&self, container: &ContainerId) -> Result<String, RadarError> {
        // Channels are cheap to clone and multiplex calls.
        let mut client = self.client.clone();
        let response = client
            .get_base_path(ContainerPath {
                container_id: container.to_string(),
            })
            .await
            .map_err(|status| self.map_status(status))?;

        Ok(response.into_inner().full)
    }

    async fn restart(&self, container: &ContainerId) -> Result<(), RadarError> {
        let mut client = self.client.clone();
        client
            .restart(ContainerPath {
                container_id: container.to_string(),
            })
            .await
            .map_err(|status| self.map_status(status))?;

        Ok(())
    }
}
