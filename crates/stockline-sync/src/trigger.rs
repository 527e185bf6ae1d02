//! # Background Trigger
//!
//! Runs the queue drain outside the lifetime of whoever queued the work.
//!
//! ## Run Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──permit / offline→online──► WaitingForNetwork ──online──►      │
//! │    ▲                                                          │        │
//! │    │                                                          ▼        │
//! │    │◄──────────── Completed ─────────────────────────────  Running     │
//! │    │                                                          │        │
//! │    │                                  Retry                   │        │
//! │    │              BackingOff ◄────────────────────────────────┘        │
//! │    │                 │  30s, 60s, 120s ... capped at 1h                │
//! │    │                 └──────────► WaitingForNetwork ──► Running        │
//! │                                                                         │
//! │   PERMIT: a single slot. Any number of schedule_drain() calls while    │
//! │   idle or running collapse into at most one further run.              │
//! │   A permit taken while BackingOff replaces the waiting retry.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TriggerSettings;
use crate::connectivity::ConnectivityOracle;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Job + Scheduler Traits
// =============================================================================

/// What a run reports back to the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Done. The unit is freed.
    Completed,
    /// Run the whole unit again after a backoff.
    Retry,
}

/// The unit of work the trigger runs.
#[async_trait]
pub trait DrainJob: Send + Sync {
    async fn run(&self) -> WorkOutcome;
}

/// Asks for a drain to happen "soon".
pub trait DrainScheduler: Send + Sync {
    fn schedule_drain(&self);
}

/// Scheduler for hosts without a background trigger.
pub struct NoOpScheduler;

impl DrainScheduler for NoOpScheduler {
    fn schedule_drain(&self) {}
}

/// Where the trigger currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    WaitingForNetwork,
    Running,
    BackingOff,
    Stopped,
}

// =============================================================================
// Trigger Handle
// =============================================================================

/// Cloneable handle for scheduling and stopping the trigger.
#[derive(Clone)]
pub struct TriggerHandle {
    name: Arc<str>,
    permit: Arc<Notify>,
    state_rx: watch::Receiver<TriggerState>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TriggerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current loop state.
    pub fn state(&self) -> TriggerState {
        *self.state_rx.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<TriggerState> {
        self.state_rx.clone()
    }

    /// Stops the trigger. An in-flight run is abandoned.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }
}

impl DrainScheduler for TriggerHandle {
    fn schedule_drain(&self) {
        debug!(trigger = %self.name, "Drain scheduled");
        self.permit.notify_one();
    }
}

// =============================================================================
// Background Trigger
// =============================================================================

/// Single-slot, network-gated, backoff-retrying drain runner.
pub struct BackgroundTrigger {
    name: Arc<str>,
    settings: TriggerSettings,
    connectivity: Arc<dyn ConnectivityOracle>,
    permit: Arc<Notify>,
    state_tx: watch::Sender<TriggerState>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl BackgroundTrigger {
    /// Creates a trigger and its handle.
    ///
    /// ## Arguments
    /// * `name` - Name of the work unit, used in logs
    /// * `settings` - Poll interval, backoff bounds, reconnect behavior
    /// * `connectivity` - Gate for every run
    pub fn new(
        name: impl Into<String>,
        settings: TriggerSettings,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> (Self, TriggerHandle) {
        let name: Arc<str> = Arc::from(name.into());
        let permit = Arc::new(Notify::new());
        let (state_tx, state_rx) = watch::channel(TriggerState::Idle);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let trigger = BackgroundTrigger {
            name: name.clone(),
            settings,
            connectivity,
            permit: permit.clone(),
            state_tx,
            shutdown_rx,
        };

        let handle = TriggerHandle {
            name,
            permit,
            state_rx,
            shutdown_tx,
        };

        (trigger, handle)
    }

    /// Spawns the run loop onto the runtime.
    pub fn spawn(self, job: Arc<dyn DrainJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(job))
    }

    /// Runs until shutdown.
    pub async fn run(mut self, job: Arc<dyn DrainJob>) {
        info!(
            trigger = %self.name,
            poll_secs = self.settings.network_poll_secs,
            "Background trigger started"
        );

        let mut backoff = self.create_backoff();
        let mut last_online = self.connectivity.is_online().await;
        let mut retry_pending = false;

        loop {
            if !retry_pending {
                self.set_state(TriggerState::Idle);
                if !self.wait_for_work(&mut last_online).await {
                    break;
                }
            }

            if !self.wait_for_network().await {
                break;
            }
            last_online = true;

            self.set_state(TriggerState::Running);
            debug!(trigger = %self.name, "Running drain");

            let outcome = tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    warn!(trigger = %self.name, "Shutdown during drain, run abandoned");
                    break;
                }
                outcome = job.run() => outcome,
            };

            match outcome {
                WorkOutcome::Completed => {
                    backoff.reset();
                    retry_pending = false;
                }
                WorkOutcome::Retry => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.settings.max_backoff());
                    warn!(
                        trigger = %self.name,
                        delay_secs = delay.as_secs(),
                        "Drain asked for retry, backing off"
                    );

                    self.set_state(TriggerState::BackingOff);
                    match self.back_off(delay).await {
                        BackoffEnd::Elapsed => {}
                        BackoffEnd::Replaced => {
                            debug!(trigger = %self.name, "New drain scheduled, backoff replaced");
                            backoff.reset();
                        }
                        BackoffEnd::Shutdown => break,
                    }
                    retry_pending = true;
                }
            }
        }

        self.set_state(TriggerState::Stopped);
        info!(trigger = %self.name, "Background trigger stopped");
    }

    /// Waits for a permit or a reconnect.
    ///
    /// ## Returns
    /// `false` when shutdown was requested.
    async fn wait_for_work(&mut self, last_online: &mut bool) -> bool {
        let poll = self.settings.network_poll_interval();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => return false,
                _ = self.permit.notified() => return true,
                _ = tokio::time::sleep(poll), if self.settings.drain_on_reconnect => {
                    let online = self.connectivity.is_online().await;
                    let reconnected = online && !*last_online;
                    *last_online = online;

                    if reconnected {
                        info!(trigger = %self.name, "Connectivity restored, draining");
                        return true;
                    }
                }
            }
        }
    }

    /// Waits until the connectivity oracle reports online.
    async fn wait_for_network(&mut self) -> bool {
        loop {
            if self.connectivity.is_online().await {
                return true;
            }

            self.set_state(TriggerState::WaitingForNetwork);
            let poll = self.settings.network_poll_interval();
            if !self.sleep_or_shutdown(poll).await {
                return false;
            }
        }
    }

    /// Sleeps out a retry delay. A fresh schedule replaces the waiting run.
    async fn back_off(&mut self, delay: Duration) -> BackoffEnd {
        tokio::select! {
            _ = self.shutdown_rx.recv() => BackoffEnd::Shutdown,
            _ = self.permit.notified() => BackoffEnd::Replaced,
            _ = tokio::time::sleep(delay) => BackoffEnd::Elapsed,
        }
    }

    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown_rx.recv() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn set_state(&self, state: TriggerState) {
        self.state_tx.send_replace(state);
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.settings.initial_backoff(),
            max_interval: self.settings.max_backoff(),
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        // current_interval starts at the crate default until reset
        backoff.reset();
        backoff
    }
}

enum BackoffEnd {
    Elapsed,
    Replaced,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::connectivity::StaticConnectivity;

    struct CountingJob {
        runs: AtomicUsize,
        fail_first: usize,
        delay: Duration,
    }

    impl CountingJob {
        fn new(fail_first: usize, delay: Duration) -> Arc<Self> {
            Arc::new(CountingJob {
                runs: AtomicUsize::new(0),
                fail_first,
                delay,
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DrainJob for CountingJob {
        async fn run(&self) -> WorkOutcome {
            tokio::time::sleep(self.delay).await;
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                WorkOutcome::Retry
            } else {
                WorkOutcome::Completed
            }
        }
    }

    fn settings() -> TriggerSettings {
        TriggerSettings {
            network_poll_secs: 5,
            initial_backoff_secs: 30,
            max_backoff_secs: 3_600,
            drain_on_reconnect: true,
            ..TriggerSettings::default()
        }
    }

    /// Lets spawned tasks make progress under paused time.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedules_coalesce_into_one_run() {
        let connectivity = StaticConnectivity::online();
        let (trigger, handle) = BackgroundTrigger::new("test", settings(), Arc::new(connectivity));
        let job = CountingJob::new(0, Duration::from_secs(1));
        let task = trigger.spawn(job.clone());

        handle.schedule_drain();
        handle.schedule_drain();
        handle.schedule_drain();

        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(job.runs(), 1);
        assert_eq!(handle.state(), TriggerState::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.state(), TriggerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_while_running_runs_once_more() {
        let connectivity = StaticConnectivity::online();
        let (trigger, handle) = BackgroundTrigger::new("test", settings(), Arc::new(connectivity));
        let job = CountingJob::new(0, Duration::from_secs(10));
        let task = trigger.spawn(job.clone());

        handle.schedule_drain();
        settle().await;
        assert_eq!(handle.state(), TriggerState::Running);

        handle.schedule_drain();
        handle.schedule_drain();

        tokio::time::sleep(Duration::from_secs(25)).await;
        settle().await;
        assert_eq!(job.runs(), 2);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backs_off_then_completes() {
        let connectivity = StaticConnectivity::online();
        let (trigger, handle) = BackgroundTrigger::new("test", settings(), Arc::new(connectivity));
        let job = CountingJob::new(1, Duration::ZERO);
        let task = trigger.spawn(job.clone());

        handle.schedule_drain();
        settle().await;
        assert_eq!(job.runs(), 1);
        assert_eq!(handle.state(), TriggerState::BackingOff);

        tokio::time::sleep(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(job.runs(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(job.runs(), 2);
        assert_eq!(handle.state(), TriggerState::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_during_backoff_runs_without_waiting() {
        let connectivity = StaticConnectivity::online();
        let (trigger, handle) = BackgroundTrigger::new("test", settings(), Arc::new(connectivity));
        let job = CountingJob::new(1, Duration::ZERO);
        let task = trigger.spawn(job.clone());

        handle.schedule_drain();
        settle().await;
        assert_eq!(job.runs(), 1);
        assert_eq!(handle.state(), TriggerState::BackingOff);

        handle.schedule_drain();
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(job.runs(), 2);
        assert_eq!(handle.state(), TriggerState::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_network() {
        let connectivity = StaticConnectivity::offline();
        let mut settings = settings();
        settings.drain_on_reconnect = false;
        let (trigger, handle) = BackgroundTrigger::new("test", settings, Arc::new(connectivity.clone()));
        let job = CountingJob::new(0, Duration::ZERO);
        let task = trigger.spawn(job.clone());

        handle.schedule_drain();
        settle().await;
        assert_eq!(handle.state(), TriggerState::WaitingForNetwork);

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(job.runs(), 0);

        connectivity.set_online(true);
        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(job.runs(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_schedules_drain() {
        let connectivity = StaticConnectivity::offline();
        let (trigger, handle) = BackgroundTrigger::new("test", settings(), Arc::new(connectivity.clone()));
        let job = CountingJob::new(0, Duration::ZERO);
        let task = trigger.spawn(job.clone());
        settle().await;

        connectivity.set_online(true);
        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(job.runs(), 1);

        // Staying online does not keep draining.
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(job.runs(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_noop_scheduler() {
        NoOpScheduler.schedule_drain();
    }
}
