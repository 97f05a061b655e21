// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_scanner;
pub mod failure_policy;
pub mod mirror;
pub mod restart_coordinator;

// Re-export the session entry points for convenience
pub use event_scanner::{EventScanner, LinePredicate, LineSink, PatternTrigger, RestartTrigger, TracingSink};
pub use failure_policy::{ConnectionFailurePolicy, FailureDecision};
pub use mirror::{Mirror, MirrorOptions};
pub use restart_coordinator::{RestartCoordinator, RestartStats};
