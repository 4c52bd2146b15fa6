//! Shared driving mode
//!
//! ```text
//!            maneuver toggle            stick toggle
//! Default ───────────────► Maneuver   Default ─────────► Stick
//! Maneuver ──────────────► Default    Stick ───────────► Default
//! Stick ─────────────────► Maneuver   Maneuver ────────► Stick
//! ```
//!
//! The indicator loop is the only writer; the drive loop reads it every tick.
//! The whole state is one atomic byte so a reader can never observe two
//! modes at once.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Default,
    /// Shaped steering for slow, precise driving
    Maneuver,
    /// Two-stick driving instead of the triggers
    Stick,
}

/// A toggle button's effect on the mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeToggle {
    Maneuver,
    Stick,
}

impl Mode {
    pub fn toggled(self, toggle: ModeToggle) -> Mode {
        match (self, toggle) {
            (Mode::Maneuver, ModeToggle::Maneuver) => Mode::Default,
            (_, ModeToggle::Maneuver) => Mode::Maneuver,
            (Mode::Stick, ModeToggle::Stick) => Mode::Default,
            (_, ModeToggle::Stick) => Mode::Stick,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Mode::Default => 0,
            Mode::Maneuver => 1,
            Mode::Stick => 2,
        }
    }

    fn from_u8(value: u8) -> Mode {
        match value {
            1 => Mode::Maneuver,
            2 => Mode::Stick,
            _ => Mode::Default,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Default => write!(f, "default"),
            Mode::Maneuver => write!(f, "maneuver"),
            Mode::Stick => write!(f, "stick"),
        }
    }
}

#[derive(Debug)]
pub struct ModeState {
    current: AtomicU8,
}

impl ModeState {
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(Mode::Default.as_u8()),
        }
    }

    pub fn current(&self) -> Mode {
        Mode::from_u8(self.current.load(Ordering::Acquire))
    }

    pub fn is(&self, mode: Mode) -> bool {
        self.current() == mode
    }

    /// Apply a toggle edge and return the new mode
    pub fn toggle(&self, toggle: ModeToggle) -> Mode {
        let previous = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                Some(Mode::from_u8(raw).toggled(toggle).as_u8())
            })
            .unwrap_or_else(|raw| raw);
        let previous = Mode::from_u8(previous);
        let next = previous.toggled(toggle);
        info!("Mode {} -> {}", previous, next);
        next
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}
