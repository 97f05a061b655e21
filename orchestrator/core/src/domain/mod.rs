// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Types and contracts shared by every layer of the mirror orchestrator.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Container identity, Radar contracts, transport error
//!   registry, engine invocation, session lifecycle and configuration

pub mod container;
pub mod engine;
pub mod mirror_config;
pub mod radar;
pub mod remote_path;
pub mod session;
pub mod transport;
