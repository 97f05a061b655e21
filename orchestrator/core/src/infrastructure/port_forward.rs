// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Data-channel port forwarding.
//!
//! The sync engine always dials `localhost`. A [`PortForward`] listens on an
//! ephemeral loopback port and pipes every accepted connection to the remote
//! engine on the node. Failures happen on background tasks, so they are
//! reported into the [`TransportErrorHandlers`] registry rather than returned.

use std::io;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, Instrument};

use crate::domain::transport::{TransportError, TransportErrorHandlers};

/// A running forward. Dropping it stops the listener and every open connection.
#[derive(Debug)]
pub struct PortForward {
    local_port: u16,
    remote: String,
    _shutdown: DropGuard,
}

impl PortForward {
    pub async fn open(remote: String, errors: TransportErrorHandlers) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_port = listener.local_addr()?.port();
        let shutdown = CancellationToken::new();

        let span = tracing::debug_span!("port_forward", local_port, remote = %remote);
        tokio::spawn(
            accept_loop(listener, remote.clone(), errors, shutdown.clone()).instrument(span),
        );

        debug!(local_port, remote = %remote, "forwarding data channel");
        Ok(Self {
            local_port,
            remote,
            _shutdown: shutdown.drop_guard(),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }
}

async fn accept_loop(
    listener: TcpListener,
    remote: String,
    errors: TransportErrorHandlers,
    shutdown: CancellationToken,
) {
    let mut failures = 0u32;
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let inbound = match accepted {
            Ok((inbound, peer)) => {
                failures = 0;
                debug!(%peer, "accepted data channel connection");
                inbound
            }
            Err(e) => {
                // Errors like EMFILE persist; don't spin on them.
                failures = failures.saturating_add(1);
                errors.handle(&TransportError::from(e));
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(accept_backoff(failures)) => continue,
                }
            }
        };

        let remote = remote.clone();
        let errors = errors.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    result = forward(inbound, &remote) => {
                        if let Err(e) = result {
                            errors.handle(&e);
                        }
                    }
                }
            }
            .in_current_span(),
        );
    }
}

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause after the `failures`-th consecutive accept error.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_MIN
        .saturating_mul(1 << failures.min(10))
        .min(ACCEPT_BACKOFF_MAX)
}

async fn forward(mut inbound: TcpStream, remote: &str) -> Result<(), TransportError> {
    let mut outbound = TcpStream::connect(remote).await.map_err(|e| {
        TransportError::from(io::Error::new(
            e.kind(),
            format!("error forwarding to {}: {}", remote, e),
        ))
    })?;

    let (sent, received) = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await?;
    debug!(sent, received, "data channel connection closed");
    Ok(())
}
