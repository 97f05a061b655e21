// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Mirror Session Orchestrator
//!
//! A [`Mirror`] is one live sync between a local directory and a directory
//! inside a remote container. [`Mirror::run`] drives the whole session:
//!
//! 1. Resolve the remote path through the node's Radar
//! 2. Acquire a local data-channel port to the node
//! 3. Install the connection failure policy
//! 4. Start the restart coordinator (hot reload only)
//! 5. Launch the sync engine and attach scanners to stderr and stdout
//! 6. Wait for the engine to exit, or kill it on a fatal transport error
//!
//! Setup failures are returned before the engine starts. Once it is running the
//! engine's own exit status is returned unchanged; the only other outcome is
//! [`MirrorError::FatalTransport`]. Deciding whether that should terminate the
//! host process is left to the caller.

use parking_lot::Mutex;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::application::event_scanner::{
    EventScanner, LinePredicate, LineSink, PatternTrigger, RestartTrigger, ScanSummary, TracingSink,
};
use crate::application::failure_policy::{ConnectionFailurePolicy, DEFAULT_MAX_CONNECTION_RETRIES};
use crate::application::restart_coordinator::{RestartCoordinator, DEFAULT_DEBOUNCE};
use crate::domain::container::RemoteContainer;
use crate::domain::engine::EngineConfig;
use crate::domain::mirror_config::SessionConfig;
use crate::domain::radar::RadarConnectionProvider;
use crate::domain::remote_path::join_remote_path;
use crate::domain::session::{MirrorError, SessionId, SessionState, Termination};
use crate::domain::transport::{TransportError, TransportErrorHandlers};

/// How long engine output is still forwarded after the engine has exited.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Static parameters of a session.
#[derive(Clone)]
pub struct MirrorOptions {
    pub local_path: String,
    /// Joined onto the container's base path at run time
    pub remote_path: String,
    pub reload: bool,
    pub engine: EngineConfig,
    pub max_connection_retries: u32,
    pub reload_debounce: Duration,
    pub reload_trigger: Arc<dyn LinePredicate>,
    pub stdout_sink: Arc<dyn LineSink>,
    pub stderr_sink: Arc<dyn LineSink>,
}

impl MirrorOptions {
    pub fn new(local_path: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            reload: false,
            engine: EngineConfig::default(),
            max_connection_retries: DEFAULT_MAX_CONNECTION_RETRIES,
            reload_debounce: DEFAULT_DEBOUNCE,
            reload_trigger: Arc::new(PatternTrigger::default()),
            stdout_sink: Arc::new(TracingSink::stdout()),
            stderr_sink: Arc::new(TracingSink::stderr()),
        }
    }

    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Apply retry budget, debounce window and trigger pattern from config.
    pub fn session(mut self, session: &SessionConfig) -> Result<Self, regex::Error> {
        self.max_connection_retries = session.max_connection_retries;
        self.reload_debounce = session.reload_debounce;
        self.reload_trigger = Arc::new(PatternTrigger::new(&session.reload_trigger)?);
        Ok(self)
    }

    pub fn sinks(mut self, stdout: Arc<dyn LineSink>, stderr: Arc<dyn LineSink>) -> Self {
        self.stdout_sink = stdout;
        self.stderr_sink = stderr;
        self
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Fatal(TransportError),
}

pub struct Mirror {
    remote_container: Arc<RemoteContainer>,
    provider: Arc<dyn RadarConnectionProvider>,
    transport_errors: TransportErrorHandlers,
    options: MirrorOptions,
    connection_retries: Arc<Mutex<u32>>,
    state: Arc<watch::Sender<SessionState>>,
}

impl Mirror {
    /// `transport_errors` must be the registry the provider's transport reports
    /// into, otherwise the failure policy never sees anything.
    pub fn new(
        remote_container: Arc<RemoteContainer>,
        provider: Arc<dyn RadarConnectionProvider>,
        transport_errors: TransportErrorHandlers,
        options: MirrorOptions,
    ) -> Self {
        Self {
            remote_container,
            provider,
            transport_errors,
            options,
            connection_retries: Arc::new(Mutex::new(0)),
            state: Arc::new(watch::Sender::new(SessionState::Created)),
        }
    }

    pub fn remote_container(&self) -> &RemoteContainer {
        &self.remote_container
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Observe the session lifecycle.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn connection_retries(&self) -> u32 {
        *self.connection_retries.lock()
    }

    /// Run the session to completion.
    ///
    /// Intended to be called once per instance; calling it again starts a
    /// fresh session with a reset retry counter.
    pub async fn run(&self) -> Result<ExitStatus, MirrorError> {
        let session_id = SessionId::new();
        let container_span = self.remote_container.span();
        let span = tracing::info_span!(parent: &container_span, "mirror", session = %session_id);

        async {
            *self.connection_retries.lock() = 0;
            self.state.send_replace(SessionState::Created);

            let result = self.supervise().await;

            let terminal = match &result {
                Ok(_) => SessionState::Terminated(Termination::Normal),
                Err(MirrorError::FatalTransport(_)) => SessionState::Terminated(Termination::Fatal),
                Err(_) => SessionState::Failed,
            };
            self.state.send_replace(terminal);

            match &result {
                Ok(status) => info!(%status, "sync engine exited"),
                Err(e) => error!(error = %e, "mirror session ended"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Absolute path of the sync root inside the container.
    pub async fn path(&self) -> Result<String, MirrorError> {
        let radar = self
            .remote_container
            .radar(self.provider.as_ref())
            .await
            .map_err(MirrorError::PathResolution)?;

        let base = radar
            .get_base_path(&self.remote_container.id)
            .await
            .map_err(MirrorError::PathResolution)?;

        Ok(join_remote_path(&base, &self.options.remote_path))
    }

    async fn supervise(&self) -> Result<ExitStatus, MirrorError> {
        self.state.send_replace(SessionState::PathResolving);
        let remote_path = self.path().await?;

        self.state.send_replace(SessionState::ChannelAcquiring);
        let port = self
            .provider
            .mirror_connection(&self.remote_container.node_name)
            .await
            .map_err(MirrorError::ConnectionAcquisition)?;

        self.state.send_replace(SessionState::Launching);
        let invocation = self
            .options
            .engine
            .invocation(port, &self.options.local_path, &remote_path);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
        let policy = ConnectionFailurePolicy::new(
            self.options.max_connection_retries,
            self.connection_retries.clone(),
        );
        let _registration = policy.install(&self.transport_errors, fatal_tx);

        // The signal must exist before any scanner is attached.
        let mut restart_signal = None;
        let mut coordinator = None;
        if self.options.reload {
            let radar = self
                .remote_container
                .radar(self.provider.as_ref())
                .await
                .map_err(MirrorError::ConnectionAcquisition)?;
            let (tx, rx) = mpsc::channel(1);
            let handle = RestartCoordinator::new(
                radar,
                self.remote_container.id.clone(),
                self.options.reload_debounce,
            )
            .with_state(self.state.clone())
            .spawn(rx);
            coordinator = Some(AbortOnDropHandle::new(handle));
            restart_signal = Some(tx);
        }

        let mut child = command.spawn().map_err(|e| {
            MirrorError::SubprocessLaunch(format!("{}: {}", invocation.program, e))
        })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MirrorError::SubprocessLaunch("stderr was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MirrorError::SubprocessLaunch("stdout was not captured".to_string()))?;

        let scanners = [
            self.scan(stderr, self.options.stderr_sink.clone(), restart_signal.clone()),
            self.scan(stdout, self.options.stdout_sink.clone(), restart_signal.take()),
        ];

        debug!(cmd = %invocation.program, args = ?invocation.args, "starting mirror");
        self.state.send_replace(SessionState::Running);

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            Some(err) = fatal_rx.recv() => Outcome::Fatal(err),
        };

        match outcome {
            Outcome::Exited(status) => {
                let status = status.map_err(MirrorError::Subprocess)?;
                // Descendants of the engine may still hold its pipes open.
                // Scanners get a grace period to forward what is buffered and
                // are aborted after it; either way their signal senders drop,
                // which lets the coordinator drain.
                let scanners = scanners.map(AbortOnDropHandle::new);
                let drained = tokio::time::timeout(OUTPUT_DRAIN_GRACE, async move {
                    for scanner in scanners {
                        if let Ok(summary) = scanner.await {
                            debug!(lines = summary.lines, triggers = summary.triggers, "scanner finished");
                        }
                    }
                })
                .await;
                if drained.is_err() {
                    warn!(
                        grace = ?OUTPUT_DRAIN_GRACE,
                        "engine output still open after exit, detaching scanners"
                    );
                }
                if let Some(coordinator) = coordinator {
                    let _ = coordinator.await;
                }
                Ok(status)
            }
            Outcome::Fatal(err) => {
                if let Err(e) = child.start_kill() {
                    error!(error = %e, "couldn't kill sync engine");
                }
                let _ = child.wait().await;
                Err(MirrorError::FatalTransport(err))
            }
        }
    }

    fn scan<R>(
        &self,
        reader: R,
        sink: Arc<dyn LineSink>,
        signal: Option<mpsc::Sender<RestartTrigger>>,
    ) -> JoinHandle<ScanSummary>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut scanner = EventScanner::new(reader, sink);
        if let Some(signal) = signal {
            scanner = scanner.with_trigger(self.options.reload_trigger.clone(), signal);
        }
        scanner.spawn()
    }
}
