//! Loop engine with statum state machine for control loop execution
//!
//! Each engine owns one [`ControlLoop`] and runs it in its own tokio task until
//! its cancellation token fires.
//!
//! # State Machine
//!
//! ```text
//! Ready ──► Running ──► Stopped
//!   │                      ▲
//!   └──────────────────────┘
//!     (stopped before start)
//! ```
//!
//! Cancellation is only observed between ticks. A tick that has started always
//! finishes, so a command is never cut in half.

use crate::control::control_loop::{Cadence, ControlLoop, LoopKind, TickOutcome};
use crate::control::error::LoopError;
use statum::{machine, state};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// States for loop engine lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum LoopEngineState {
    Ready,   // Loop built, not yet scheduled
    Running, // Ticking in its task
    Stopped, // Run flag cleared, task finished
}

/// Per-engine counters, returned when the task finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub issued: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[machine]
pub struct LoopEngine<S: LoopEngineState> {
    control: Box<dyn ControlLoop>,
    cadence: Cadence,
    name: String,
    stats: LoopStats,
}

impl<S: LoopEngineState> LoopEngine<S> {
    pub fn kind(&self) -> LoopKind {
        self.control.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }
}

impl LoopEngine<Ready> {
    pub fn create(control: Box<dyn ControlLoop>, cadence: Cadence) -> Self {
        let name = control.name();
        debug!("Creating loop engine: {} ({:?})", name, cadence);
        Self::new(control, cadence, name, LoopStats::default())
    }

    pub fn activate(self) -> LoopEngine<Running> {
        info!("Activating loop engine: {}", self.name);
        self.transition()
    }

    pub fn discard(self) -> LoopEngine<Stopped> {
        info!("Loop engine stopped before start: {}", self.name);
        self.transition()
    }
}

impl LoopEngine<Running> {
    /// Run one tick; output errors are logged and only cost this tick
    pub fn tick_once(&mut self) -> Option<TickOutcome> {
        self.stats.ticks += 1;
        match self.control.tick() {
            Ok(TickOutcome::Issued) => {
                self.stats.issued += 1;
                Some(TickOutcome::Issued)
            }
            Ok(TickOutcome::Skipped) => {
                self.stats.skipped += 1;
                Some(TickOutcome::Skipped)
            }
            Err(e) => {
                self.stats.errors += 1;
                warn!("{} tick failed: {}", self.name, e);
                None
            }
        }
    }

    /// Tick until `cancel` fires
    pub async fn run_until_cancelled(mut self, cancel: CancellationToken) -> LoopEngine<Stopped> {
        info!("Starting tick loop for: {}", self.name);

        let mut ticker = match self.cadence {
            Cadence::Every(period) => {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(ticker)
            }
            Cadence::BusyPoll => None,
        };

        loop {
            if cancel.is_cancelled() {
                info!("Run flag cleared for: {}", self.name);
                break;
            }

            self.tick_once();

            match ticker.as_mut() {
                Some(ticker) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Run flag cleared for: {}", self.name);
                            break;
                        }
                        _ = ticker.tick() => {}
                    }
                }
                None => tokio::task::yield_now().await,
            }
        }

        info!(
            "{} stopped after {} ticks ({} issued, {} skipped, {} errors)",
            self.name, self.stats.ticks, self.stats.issued, self.stats.skipped, self.stats.errors
        );
        self.transition()
    }
}

impl LoopEngine<Stopped> {}

/// Handle for managing a control loop in a tokio task
///
/// `start` and `stop` are both idempotent; stopping a loop that was never
/// started just prevents it from ever running.
pub struct LoopHandle {
    kind: LoopKind,
    name: String,
    engine: Option<LoopEngine<Ready>>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<LoopStats>>,
}

impl LoopHandle {
    pub fn new(control: Box<dyn ControlLoop>, cadence: Cadence) -> Self {
        let engine = LoopEngine::create(control, cadence);
        Self {
            kind: engine.kind(),
            name: engine.name().to_string(),
            engine: Some(engine),
            cancel: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the tick loop. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        let Some(engine) = self.engine.take() else {
            debug!("{} already started", self.name);
            return;
        };
        if self.cancel.is_cancelled() {
            engine.discard();
            return;
        }

        let cancel = self.cancel.clone();
        let name = self.name.clone();
        self.task_handle = Some(tokio::spawn(async move {
            debug!("Spawned task for: {}", name);
            let stopped = engine.activate().run_until_cancelled(cancel).await;
            stopped.stats().clone()
        }));
        info!("{} started", self.name);
    }

    /// Clear the run flag; the loop exits at its next iteration boundary
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            debug!("{} already stopping", self.name);
            return;
        }
        info!("Stopping {}", self.name);
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the task to finish, `None` if it never ran or was joined already
    pub async fn join(&mut self) -> Result<Option<LoopStats>, LoopError> {
        let Some(handle) = self.task_handle.take() else {
            debug!("{} has no task to join", self.name);
            return Ok(None);
        };

        match handle.await {
            Ok(stats) => Ok(Some(stats)),
            Err(e) => {
                error!("{} task panicked: {}", self.name, e);
                Err(LoopError::TaskError(format!("{} task failed: {}", self.name, e)))
            }
        }
    }

    /// Stop and wait
    pub async fn shutdown(&mut self) -> Result<Option<LoopStats>, LoopError> {
        self.stop();
        self.join().await
    }
}
