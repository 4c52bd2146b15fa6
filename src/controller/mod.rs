//! Controller input subsystem
//!
//! Turns the raw event device into per-channel state:
//!
//! 1. [`device`] - raw frame streams (kernel event device, recorded files)
//! 2. [`frame`] - fixed-layout `input_event` decoding
//! 3. [`channel`] - `(type, code)` to channel registry
//! 4. [`event_source`] - the single producer thread
//! 5. [`event_cache`] - one slot per channel, Peek / Consume reads
//!
//! # Architecture
//!
//! ```text
//! /dev/input/eventN ──► EventSource ──► EventCache ──► control loops
//!                       (decode)        (latest value)  (peek / consume)
//! ```

pub mod channel;
pub mod device;
pub mod event_cache;
pub mod event_source;
pub mod frame;

pub use channel::{Channel, ChannelKind};
pub use device::{DeviceError, EvdevStream, RawEventStream, ReaderStream};
pub use event_cache::{ChannelEvent, EventCache, ReadMode};
pub use event_source::{EventSource, ReaderExit, SourceError, SourceStatus};
pub use frame::{FrameLayout, RawFrame};
