//! Composition root: wires the event source, cache and control loops
//!
//! ```text
//!  start:    EventSource ──► DriveLoop, IndicatorLoop, SoundLoop, AccessoryLoop
//!  run:      watch terminate button ─┐
//!            interrupt ──────────────┴──► shutdown
//!  shutdown: stop every loop, stop source, join loops, join source (bounded)
//! ```
//!
//! Every stop is idempotent, so an interrupt arriving while shutting down just
//! repeats the stop requests.

use crate::config::Config;
use crate::control::{
    AccessoryLoop, Cadence, DriveLoop, IndicatorLoop, LoopError, LoopHandle, ModeState, SoundLoop,
};
use crate::controller::{Channel, EventCache, EventSource, RawEventStream, SourceError};
use crate::output::{
    AccessoryActuator, CommandLog, DriveActuator, Indicator, SoundPlayer, TracingSink,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Orchestrator errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Control loop error: {0}")]
    Loop(#[from] LoopError),

    #[error("Event source error: {0}")]
    Source(#[from] SourceError),
}

/// What ended [`Orchestrator::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    TerminateButton,
    Interrupt,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::TerminateButton => write!(f, "terminate button pressed"),
            ShutdownReason::Interrupt => write!(f, "interrupted"),
        }
    }
}

/// Output sinks handed to the loops
pub struct Sinks {
    pub drive: Box<dyn DriveActuator>,
    pub accessory: Box<dyn AccessoryActuator>,
    pub indicator: Box<dyn Indicator>,
    pub sound: Box<dyn SoundPlayer>,
}

impl Sinks {
    /// Log every command
    pub fn tracing() -> Self {
        Self {
            drive: Box::new(TracingSink),
            accessory: Box::new(TracingSink),
            indicator: Box::new(TracingSink),
            sound: Box::new(TracingSink),
        }
    }

    /// Record every command into one shared log
    pub fn recording(log: &CommandLog) -> Self {
        Self {
            drive: Box::new(log.clone()),
            accessory: Box::new(log.clone()),
            indicator: Box::new(log.clone()),
            sound: Box::new(log.clone()),
        }
    }
}

pub struct Orchestrator {
    cache: Arc<EventCache>,
    source: EventSource,
    loops: Vec<LoopHandle>,
    terminate_button: Channel,
    watch_cadence: Cadence,
    source_join_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: &Config, stream: Box<dyn RawEventStream>, sinks: Sinks) -> Self {
        let cache = Arc::new(EventCache::new());
        let mode = Arc::new(ModeState::new());
        let source = EventSource::new(stream, Arc::clone(&cache));

        let loops = vec![
            LoopHandle::new(
                Box::new(DriveLoop::new(
                    Arc::clone(&cache),
                    Arc::clone(&mode),
                    sinks.drive,
                    config.drive.clone(),
                )),
                Cadence::from_millis(config.drive.tick_interval_ms),
            ),
            LoopHandle::new(
                Box::new(IndicatorLoop::new(
                    Arc::clone(&cache),
                    Arc::clone(&mode),
                    sinks.indicator,
                    config.indicator.clone(),
                )),
                Cadence::from_millis(config.indicator.tick_interval_ms),
            ),
            LoopHandle::new(
                Box::new(SoundLoop::new(
                    Arc::clone(&cache),
                    sinks.sound,
                    config.sound.clone(),
                )),
                Cadence::from_millis(config.sound.tick_interval_ms),
            ),
            LoopHandle::new(
                Box::new(AccessoryLoop::new(
                    Arc::clone(&cache),
                    sinks.accessory,
                    config.accessory.clone(),
                )),
                Cadence::from_millis(config.accessory.tick_interval_ms),
            ),
        ];
        debug!("Built {} control loops", loops.len());

        Self {
            cache,
            source,
            loops,
            terminate_button: config.orchestrator.terminate_button,
            watch_cadence: Cadence::from_millis(config.orchestrator.watch_interval_ms),
            source_join_timeout: Duration::from_millis(config.orchestrator.source_join_timeout_ms),
        }
    }

    pub fn cache(&self) -> Arc<EventCache> {
        Arc::clone(&self.cache)
    }

    /// Start the source, then every loop. Safe to call more than once.
    pub fn start(&mut self) {
        self.source.start();
        for handle in &mut self.loops {
            handle.start();
        }
        info!("Orchestrator started {} loops", self.loops.len());
    }

    /// Run until the terminate button is pressed or an interrupt arrives,
    /// then stop and join everything
    pub async fn run(
        mut self,
        mut interrupts: mpsc::UnboundedReceiver<()>,
    ) -> Result<ShutdownReason, OrchestratorError> {
        self.start();

        let cache = Arc::clone(&self.cache);
        let reason = tokio::select! {
            _ = watch_terminate(cache, self.terminate_button, self.watch_cadence) => {
                ShutdownReason::TerminateButton
            }
            Some(()) = interrupts.recv() => ShutdownReason::Interrupt,
        };
        info!("Shutting down: {}", reason);

        self.shutdown(&mut interrupts).await?;
        Ok(reason)
    }

    async fn shutdown(
        &mut self,
        interrupts: &mut mpsc::UnboundedReceiver<()>,
    ) -> Result<(), OrchestratorError> {
        let mut tokens: Vec<CancellationToken> = self
            .loops
            .iter()
            .map(LoopHandle::cancellation_token)
            .collect();
        tokens.push(self.source.cancellation_token());

        let sequence = self.stop_and_join();
        tokio::pin!(sequence);

        loop {
            tokio::select! {
                result = &mut sequence => return result,
                Some(()) = interrupts.recv() => {
                    warn!("Interrupt during shutdown, repeating stop requests");
                    for token in &tokens {
                        token.cancel();
                    }
                }
            }
        }
    }

    async fn stop_and_join(&mut self) -> Result<(), OrchestratorError> {
        for handle in &self.loops {
            handle.stop();
        }
        self.source.stop();

        let mut first_error: Option<OrchestratorError> = None;
        for handle in &mut self.loops {
            match handle.join().await {
                Ok(Some(stats)) => debug!("{} joined: {:?}", handle.name(), stats),
                Ok(None) => debug!("{} never ran", handle.name()),
                Err(e) => {
                    error!("Failed to join {}: {}", handle.name(), e);
                    if first_error.is_none() {
                        first_error = Some(e.into());
                    }
                }
            }
        }

        match tokio::time::timeout(self.source_join_timeout, self.source.shutdown()).await {
            Ok(Ok(exit)) => info!("Event source joined: {:?}", exit),
            Ok(Err(e)) => {
                error!("Failed to join event source: {}", e);
                if first_error.is_none() {
                    first_error = Some(e.into());
                }
            }
            Err(_) => warn!(
                "Event source did not finish within {}ms, leaving it behind",
                self.source_join_timeout.as_millis()
            ),
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("All components stopped");
                Ok(())
            }
        }
    }
}

// Resolves on the first press of the terminate button
async fn watch_terminate(cache: Arc<EventCache>, button: Channel, cadence: Cadence) {
    info!("Watching {} for shutdown", button);
    let mut ticker = match cadence {
        Cadence::Every(period) => {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        }
        Cadence::BusyPoll => None,
    };

    loop {
        if let Some(event) = cache.consume(button) {
            if event.is_press() {
                info!("{} pressed", button);
                return;
            }
        }
        match ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
    }
}

/// Forward every Ctrl-C to the returned receiver
///
/// Must be called inside a tokio runtime.
pub fn interrupt_channel() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received");
                    if tx.send(()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Unable to listen for interrupts: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
