//! The control loop trait and its scheduling parameters

use crate::control::error::LoopError;
use std::fmt::{self, Display};
use std::time::Duration;

/// Kinds of control loops the rover runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Drive,
    Indicator,
    Sound,
    Accessory,
}

impl Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::Drive => write!(f, "Drive"),
            LoopKind::Indicator => write!(f, "Indicator"),
            LoopKind::Sound => write!(f, "Sound"),
            LoopKind::Accessory => write!(f, "Accessory"),
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A command went out
    Issued,
    /// Input missing or nothing to react to; no command
    Skipped,
}

/// A repeating unit of work bound to the event cache
///
/// Implementations read channels, decide, and emit at most a handful of
/// commands. A tick must never block; absent input means `Skipped`, never a
/// default value.
pub trait ControlLoop: Send + 'static {
    fn kind(&self) -> LoopKind;

    fn tick(&mut self) -> Result<TickOutcome, LoopError>;

    fn name(&self) -> String {
        format!("{} loop", self.kind())
    }
}

/// How often a loop ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Re-check immediately, only yielding to the scheduler in between
    BusyPoll,
    Every(Duration),
}

impl Cadence {
    /// `0` selects busy polling
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Cadence::BusyPoll
        } else {
            Cadence::Every(Duration::from_millis(ms))
        }
    }
}
