// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Mirror Session
//!
//! Lifecycle and error taxonomy of a single mirror session.
//!
//! ## State Machine
//! ```text
//! Created → PathResolving → ChannelAcquiring → Launching → Running
//!                                        Running ⇄ RestartingRemote
//!                                        Running → Terminated(Normal | Fatal)
//! ```
//!
//! `RestartingRemote` is only entered with hot reload enabled. Setup failures
//! end the session in `Failed` without the engine ever starting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::radar::RadarError;
use crate::domain::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The engine exited on its own
    Normal,
    /// The session was torn down by a fatal transport error
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "termination", rename_all = "snake_case")]
pub enum SessionState {
    Created,
    PathResolving,
    ChannelAcquiring,
    Launching,
    Running,
    RestartingRemote,
    Terminated(Termination),
    /// Setup failed before the engine was launched
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated(_) | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => f.write_str("created"),
            SessionState::PathResolving => f.write_str("path-resolving"),
            SessionState::ChannelAcquiring => f.write_str("channel-acquiring"),
            SessionState::Launching => f.write_str("launching"),
            SessionState::Running => f.write_str("running"),
            SessionState::RestartingRemote => f.write_str("restarting-remote"),
            SessionState::Terminated(Termination::Normal) => f.write_str("terminated"),
            SessionState::Terminated(Termination::Fatal) => f.write_str("terminated (fatal)"),
            SessionState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("could not resolve remote path: {0}")]
    PathResolution(#[source] RadarError),

    #[error("could not acquire data channel: {0}")]
    ConnectionAcquisition(#[source] RadarError),

    #[error("could not launch sync engine: {0}")]
    SubprocessLaunch(String),

    #[error("lost connection to remote mirror: {0}")]
    FatalTransport(#[source] TransportError),

    #[error("failed waiting on sync engine: {0}")]
    Subprocess(#[source] std::io::Error),
}

impl MirrorError {
    /// Setup errors are returned before the engine is running.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            MirrorError::PathResolution(_)
                | MirrorError::ConnectionAcquisition(_)
                | MirrorError::SubprocessLaunch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Terminated(Termination::Normal).is_terminal());
        assert!(SessionState::Terminated(Termination::Fatal).is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(!SessionState::RestartingRemote.is_terminal());
    }

    #[test]
    fn test_setup_error_classification() {
        let err = MirrorError::PathResolution(RadarError::Rpc("not found".to_string()));
        assert!(err.is_setup());

        let err = MirrorError::FatalTransport(TransportError::new("broken pipe"));
        assert!(!err.is_setup());
        assert_eq!(err.to_string(), "lost connection to remote mirror: broken pipe");
    }

    #[test]
    fn test_state_serializes_with_termination() {
        let json = serde_json::to_value(SessionState::Terminated(Termination::Fatal)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "terminated", "termination": "fatal"}));
    }
}
