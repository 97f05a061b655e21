// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Mirror CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers behind the `mirror` binary

pub mod commands;
