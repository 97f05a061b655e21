// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the mirror CLI

pub mod config;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::run::RunArgs;
