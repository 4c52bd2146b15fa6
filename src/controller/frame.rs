//! Fixed-layout `struct input_event` frames as read from `/dev/input/event*`
//!
//! The kernel writes `timeval` followed by `type: u16`, `code: u16` and
//! `value: i32`, all in native byte order. The width of `timeval` depends on
//! the target: 2 x 64 bit on 64-bit systems, 2 x 32 bit on 32-bit ARM boards
//! such as the EV3 brick.

use serde::{Deserialize, Serialize};

/// One undecoded frame from the device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub seconds: i64,
    pub microseconds: i64,
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawFrame {
    pub fn new(seconds: i64, microseconds: i64, event_type: u16, code: u16, value: i32) -> Self {
        Self {
            seconds,
            microseconds,
            event_type,
            code,
            value,
        }
    }

    /// Encode into the byte layout the kernel would produce
    pub fn encode(&self, layout: FrameLayout) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(layout.frame_size());
        match layout {
            FrameLayout::Wide => {
                bytes.extend_from_slice(&self.seconds.to_ne_bytes());
                bytes.extend_from_slice(&self.microseconds.to_ne_bytes());
            }
            FrameLayout::Narrow => {
                bytes.extend_from_slice(&(self.seconds as i32).to_ne_bytes());
                bytes.extend_from_slice(&(self.microseconds as i32).to_ne_bytes());
            }
        }
        bytes.extend_from_slice(&self.event_type.to_ne_bytes());
        bytes.extend_from_slice(&self.code.to_ne_bytes());
        bytes.extend_from_slice(&self.value.to_ne_bytes());
        bytes
    }
}

/// Width of the `timeval` header in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    /// 64-bit seconds and microseconds, 24 bytes per frame
    Wide,
    /// 32-bit seconds and microseconds, 16 bytes per frame
    Narrow,
}

impl FrameLayout {
    /// Layout used by the kernel of the machine we run on
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            FrameLayout::Wide
        } else {
            FrameLayout::Narrow
        }
    }

    pub fn frame_size(self) -> usize {
        match self {
            FrameLayout::Wide => 24,
            FrameLayout::Narrow => 16,
        }
    }

    /// Decode exactly one frame, `None` if `bytes` is not one frame long
    pub fn decode(self, bytes: &[u8]) -> Option<RawFrame> {
        if bytes.len() != self.frame_size() {
            return None;
        }

        let (seconds, microseconds, rest) = match self {
            FrameLayout::Wide => (
                i64::from_ne_bytes(bytes[0..8].try_into().ok()?),
                i64::from_ne_bytes(bytes[8..16].try_into().ok()?),
                &bytes[16..],
            ),
            FrameLayout::Narrow => (
                i32::from_ne_bytes(bytes[0..4].try_into().ok()?) as i64,
                i32::from_ne_bytes(bytes[4..8].try_into().ok()?) as i64,
                &bytes[8..],
            ),
        };

        Some(RawFrame {
            seconds,
            microseconds,
            event_type: u16::from_ne_bytes(rest[0..2].try_into().ok()?),
            code: u16::from_ne_bytes(rest[2..4].try_into().ok()?),
            value: i32::from_ne_bytes(rest[4..8].try_into().ok()?),
        })
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::native()
    }
}
