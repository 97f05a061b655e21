// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Failure Policy
//!
//! Decides what an asynchronous transport error means for a running session.
//!
//! | Error | Retries used | Decision |
//! |-------|--------------|----------|
//! | "Connection refused" | `< max` | `Retry`, counter incremented |
//! | "Connection refused" | `>= max` | `Fatal` |
//! | anything else | any | `Fatal` |
//!
//! A refused connection usually means the remote engine is restarting and the
//! session should be patient. Anything else (the pod was rescheduled, the node
//! went away) leaves the local engine talking to nothing, so the session is torn
//! down instead of looping.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::domain::transport::{HandlerRegistration, TransportError, TransportErrorHandlers};

pub const DEFAULT_MAX_CONNECTION_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    Retry { attempt: u32 },
    Fatal,
}

#[derive(Debug, Clone)]
pub struct ConnectionFailurePolicy {
    max_retries: u32,
    retries: Arc<Mutex<u32>>,
}

impl ConnectionFailurePolicy {
    /// `retries` is the session's counter; the policy is its only writer.
    pub fn new(max_retries: u32, retries: Arc<Mutex<u32>>) -> Self {
        Self {
            max_retries,
            retries,
        }
    }

    pub fn classify(&self, err: &TransportError) -> FailureDecision {
        let mut retries = self.retries.lock();
        if !err.is_connection_refused() || *retries >= self.max_retries {
            return FailureDecision::Fatal;
        }

        *retries += 1;
        debug!(retries = *retries, "lost connection to remote mirror server");
        FailureDecision::Retry { attempt: *retries }
    }

    pub fn retries(&self) -> u32 {
        *self.retries.lock()
    }

    /// Register into `handlers`; fatal errors are forwarded to `fatal` for the
    /// session owner to act on. The handler lives as long as the returned guard.
    pub fn install(
        self,
        handlers: &TransportErrorHandlers,
        fatal: mpsc::UnboundedSender<TransportError>,
    ) -> HandlerRegistration {
        let span = tracing::Span::current();
        handlers.register(move |err| {
            let _entered = span.enter();
            if self.classify(err) == FailureDecision::Fatal {
                error!(
                    error = %err,
                    retries = self.retries(),
                    "unrecoverable transport error, stopping sync engine"
                );
                // Receiver gone means the session already ended.
                let _ = fatal.send(err.clone());
            }
        })
    }
}
