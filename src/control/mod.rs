//! Control loops driven by the event cache
//!
//! Every loop implements [`ControlLoop`] and runs in its own [`LoopEngine`]
//! task, owned by a [`LoopHandle`]. Loops only read the cache; the indicator
//! loop is the only writer of the shared [`ModeState`].
//!
//! ```text
//!                 ┌──► DriveLoop      ──► DriveActuator
//!                 ├──► IndicatorLoop  ──► Indicator      (writes ModeState)
//! EventCache ─────┼──► SoundLoop      ──► SoundPlayer
//!                 └──► AccessoryLoop  ──► AccessoryActuator
//! ```

pub mod accessory;
pub mod control_loop;
pub mod drive;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod mode;
pub mod shaping;
pub mod sound;

pub use accessory::AccessoryLoop;
pub use control_loop::{Cadence, ControlLoop, LoopKind, TickOutcome};
pub use drive::DriveLoop;
pub use engine::{LoopEngine, LoopEngineState, LoopHandle, LoopStats};
pub use error::LoopError;
pub use indicator::IndicatorLoop;
pub use mode::{Mode, ModeState, ModeToggle};
pub use sound::SoundLoop;
