// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Restart Coordinator
//!
//! Turns restart triggers from the event scanners into remote restart RPCs,
//! with a debounce so one burst of transferred files causes one restart.
//!
//! ## Debounce
//!
//! The coordinator waits on "next trigger" or "debounce window elapsed",
//! re-arming the timer every time it wakes. The first trigger of a burst fires
//! immediately and sets `too_soon`; `too_soon` clears only after a full window
//! passes with no trigger at all. Suppressed triggers therefore extend the quiet
//! period: triggers at 0s, 2s and 4s with a 3s window fire once.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, Instrument};

use crate::application::event_scanner::RestartTrigger;
use crate::domain::container::ContainerId;
use crate::domain::radar::RadarClient;
use crate::domain::session::SessionState;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartStats {
    pub issued: u64,
    pub suppressed: u64,
    pub failed: u64,
}

pub struct RestartCoordinator {
    radar: Arc<dyn RadarClient>,
    container: ContainerId,
    debounce: Duration,
    state: Option<Arc<watch::Sender<SessionState>>>,
}

impl RestartCoordinator {
    pub fn new(radar: Arc<dyn RadarClient>, container: ContainerId, debounce: Duration) -> Self {
        Self {
            radar,
            container,
            debounce,
            state: None,
        }
    }

    /// Publish `RestartingRemote` while a restart RPC is in flight.
    pub fn with_state(mut self, state: Arc<watch::Sender<SessionState>>) -> Self {
        self.state = Some(state);
        self
    }

    /// Run until every trigger sender is dropped.
    pub async fn run(self, mut triggers: mpsc::Receiver<RestartTrigger>) -> RestartStats {
        let mut stats = RestartStats::default();
        let mut too_soon = false;

        loop {
            tokio::select! {
                trigger = triggers.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                    if too_soon {
                        stats.suppressed += 1;
                        continue;
                    }
                    too_soon = true;
                    self.restart(&mut stats).await;
                }
                _ = tokio::time::sleep(self.debounce) => {
                    too_soon = false;
                }
            }
        }

        debug!(
            issued = stats.issued,
            suppressed = stats.suppressed,
            failed = stats.failed,
            "restart coordinator stopped"
        );
        stats
    }

    pub fn spawn(self, triggers: mpsc::Receiver<RestartTrigger>) -> JoinHandle<RestartStats> {
        tokio::spawn(self.run(triggers).in_current_span())
    }

    async fn restart(&self, stats: &mut RestartStats) {
        self.transition(SessionState::Running, SessionState::RestartingRemote);
        debug!("issuing reload");

        match self.radar.restart(&self.container).await {
            Ok(()) => {
                stats.issued += 1;
                debug!("reloaded");
            }
            Err(e) => {
                // The next trigger outside the window gets another chance.
                stats.failed += 1;
                error!(error = %e, "reload failed");
            }
        }

        self.transition(SessionState::RestartingRemote, SessionState::Running);
    }

    fn transition(&self, from: SessionState, to: SessionState) {
        if let Some(state) = &self.state {
            state.send_if_modified(|current| {
                if *current == from {
                    *current = to;
                    true
                } else {
                    false
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::radar::RadarError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    struct MockRadar {
        start: Instant,
        restarts: Mutex<Vec<Duration>>,
        fail_first: Mutex<bool>,
    }

    impl MockRadar {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                restarts: Mutex::new(Vec::new()),
                fail_first: Mutex::new(false),
            }
        }

        fn failing_first() -> Self {
            let radar = Self::new();
            *radar.fail_first.try_lock().unwrap() = true;
            radar
        }

        async fn restart_offsets(&self) -> Vec<u64> {
            self.restarts
                .lock()
                .await
                .iter()
                .map(|offset| offset.as_secs())
                .collect()
        }
    }

    #[async_trait]
    impl RadarClient for MockRadar {
        async fn get_base_path(&self, _container: &ContainerId) -> Result<String, RadarError> {
            Ok("/data".to_string())
        }

        async fn restart(&self, _container: &ContainerId) -> Result<(), RadarError> {
            self.restarts.lock().await.push(self.start.elapsed());
            let mut fail = self.fail_first.lock().await;
            if *fail {
                *fail = false;
                return Err(RadarError::Rpc("container is not running".to_string()));
            }
            Ok(())
        }
    }

    /// Send one trigger at each offset (seconds from start), then close.
    async fn drive(radar: Arc<MockRadar>, offsets: &[u64]) -> RestartStats {
        let (tx, rx) = mpsc::channel(1);
        let coordinator = RestartCoordinator::new(radar, ContainerId::new("abc123"), DEFAULT_DEBOUNCE);
        let handle = coordinator.spawn(rx);

        let start = Instant::now();
        for offset in offsets {
            tokio::time::sleep_until(start + Duration::from_secs(*offset)).await;
            tx.send(RestartTrigger).await.unwrap();
        }
        drop(tx);

        handle.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window_restarts_once() {
        let radar = Arc::new(MockRadar::new());
        let stats = drive(radar.clone(), &[0, 1, 2]).await;

        assert_eq!(radar.restart_offsets().await, vec![0]);
        assert_eq!(stats, RestartStats { issued: 1, suppressed: 2, failed: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_spaced_beyond_window_each_restart() {
        let radar = Arc::new(MockRadar::new());
        let stats = drive(radar.clone(), &[0, 4]).await;

        assert_eq!(radar.restart_offsets().await, vec![0, 4]);
        assert_eq!(stats.issued, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trigger_restarts_once() {
        let radar = Arc::new(MockRadar::new());
        drive(radar.clone(), &[0]).await;
        assert_eq!(radar.restart_offsets().await, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_triggers_extend_quiet_period() {
        // Every gap is shorter than the window, so the window never elapses.
        let radar = Arc::new(MockRadar::new());
        let stats = drive(radar.clone(), &[0, 2, 4, 6]).await;

        assert_eq!(radar.restart_offsets().await, vec![0]);
        assert_eq!(stats.suppressed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearms_after_quiet_period() {
        let radar = Arc::new(MockRadar::new());
        drive(radar.clone(), &[0, 2, 6, 7, 11]).await;

        // 2 → 6 and 7 → 11 are both longer than the window.
        assert_eq!(radar.restart_offsets().await, vec![0, 6, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_is_swallowed() {
        let radar = Arc::new(MockRadar::failing_first());
        let stats = drive(radar.clone(), &[0, 1, 5]).await;

        assert_eq!(radar.restart_offsets().await, vec![0, 5]);
        assert_eq!(stats, RestartStats { issued: 1, suppressed: 1, failed: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_restarting_state() {
        let radar = Arc::new(MockRadar::new());
        let state = Arc::new(watch::Sender::new(SessionState::Running));
        let mut observer = state.subscribe();

        let (tx, rx) = mpsc::channel(1);
        let handle = RestartCoordinator::new(radar, ContainerId::new("abc123"), DEFAULT_DEBOUNCE)
            .with_state(state.clone())
            .spawn(rx);

        tx.send(RestartTrigger).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        // Went through RestartingRemote and back.
        assert!(observer.has_changed().unwrap());
        assert_eq!(*observer.borrow_and_update(), SessionState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_resurrect_terminated_session() {
        let radar = Arc::new(MockRadar::new());
        let state = Arc::new(watch::Sender::new(SessionState::Launching));

        let (tx, rx) = mpsc::channel(1);
        let handle = RestartCoordinator::new(radar.clone(), ContainerId::new("abc123"), DEFAULT_DEBOUNCE)
            .with_state(state.clone())
            .spawn(rx);

        tx.send(RestartTrigger).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*state.borrow(), SessionState::Launching);
        assert_eq!(radar.restart_offsets().await, vec![0]);
    }
}
