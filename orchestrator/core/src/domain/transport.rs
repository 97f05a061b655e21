// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Transport Errors
//!
//! Errors raised by the transport runtime (the data-channel port forwarder and
//! friends) that cannot be returned to anyone: they happen on background tasks
//! long after the call that set the transport up has returned. Such errors are
//! reported into a [`TransportErrorHandlers`] registry and whoever owns the
//! session decides what to do with them.
//!
//! Registrations are scoped: [`TransportErrorHandlers::register`] returns a
//! guard and the handler is removed when the guard is dropped, so repeated
//! sessions in one process never accumulate stale handlers.

use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::warn;

/// Marker that identifies a refused connection in a transport error message.
pub const CONNECTION_REFUSED: &str = "Connection refused";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    kind: Option<io::ErrorKind>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> Option<io::ErrorKind> {
        self.kind
    }

    /// True when the remote end actively refused the connection, which is
    /// what a remote sync engine that is restarting looks like.
    pub fn is_connection_refused(&self) -> bool {
        self.kind == Some(io::ErrorKind::ConnectionRefused)
            || self.message.contains(CONNECTION_REFUSED)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self {
            message: err.to_string(),
            kind: Some(err.kind()),
        }
    }
}

pub type TransportErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

type HandlerList = Mutex<Vec<(u64, TransportErrorHandler)>>;

/// Registry of callbacks invoked for asynchronous transport errors.
#[derive(Clone, Default)]
pub struct TransportErrorHandlers {
    handlers: Arc<HandlerList>,
    next_id: Arc<AtomicU64>,
}

impl TransportErrorHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. It stays installed until the returned guard is dropped.
    #[must_use = "the handler is removed as soon as the registration is dropped"]
    pub fn register<F>(&self, handler: F) -> HandlerRegistration
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().push((id, Arc::new(handler)));
        HandlerRegistration {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Report an error to every installed handler.
    pub fn handle(&self, err: &TransportError) {
        // Snapshot so handlers may register/unregister without deadlocking.
        let handlers: Vec<TransportErrorHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        if handlers.is_empty() {
            warn!(error = %err, "transport error with no handler installed");
            return;
        }

        for handler in handlers {
            handler(err);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TransportErrorHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportErrorHandlers")
            .field("handlers", &self.len())
            .finish()
    }
}

/// Guard returned by [`TransportErrorHandlers::register`].
#[derive(Debug)]
pub struct HandlerRegistration {
    id: u64,
    handlers: Weak<HandlerList>,
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_connection_refused_from_io_kind() {
        let err = TransportError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(err.is_connection_refused());
    }

    #[test]
    fn test_connection_refused_from_message() {
        let err = TransportError::new("dial tcp 10.0.0.4:40322: Connection refused");
        assert!(err.is_connection_refused());

        // Case-sensitive, like the marker the engine and forwarder emit.
        let err = TransportError::new("connection refused");
        assert!(!err.is_connection_refused());

        let err = TransportError::new("broken pipe");
        assert!(!err.is_connection_refused());
    }

    #[test]
    fn test_handlers_receive_errors_until_registration_dropped() {
        let handlers = TransportErrorHandlers::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let registration = handlers.register(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handlers.len(), 1);

        handlers.handle(&TransportError::new("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(registration);
        assert!(handlers.is_empty());

        handlers.handle(&TransportError::new("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_sessions_do_not_accumulate_handlers() {
        let handlers = TransportErrorHandlers::new();
        for _ in 0..5 {
            let _registration = handlers.register(|_| {});
            assert_eq!(handlers.len(), 1);
        }
        assert!(handlers.is_empty());
    }

    #[test]
    fn test_handler_may_unregister_itself() {
        let handlers = TransportErrorHandlers::new();
        let slot: Arc<Mutex<Option<HandlerRegistration>>> = Arc::new(Mutex::new(None));

        let inner = slot.clone();
        let registration = handlers.register(move |_| {
            inner.lock().take();
        });
        *slot.lock() = Some(registration);

        handlers.handle(&TransportError::new("boom"));
        assert!(handlers.is_empty());
    }
}
