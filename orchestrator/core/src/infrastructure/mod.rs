// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod container_resolver;
pub mod grpc_radar;
pub mod port_forward;
pub mod radar_instance;
pub mod radar_proto;

pub use container_resolver::StaticContainerResolver;
pub use grpc_radar::GrpcRadarClient;
pub use port_forward::PortForward;
pub use radar_instance::RadarInstance;
