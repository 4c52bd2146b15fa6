//! Channel registry for the DualShock 4 event device
//!
//! Maps raw `(type, code)` pairs coming from the kernel input subsystem to the
//! semantic channels the control loops read. Codes follow `evtest` output for
//! the controller:
//!
//! ```text
//! EV_KEY (1): 304 BTN_SOUTH .. 318 BTN_THUMBR   -> 13 buttons
//! EV_ABS (3): 0 ABS_X .. 5 ABS_RZ, 16/17 HAT0   -> 8 axes
//! ```
//!
//! Anything else (EV_SYN, EV_MSC scan codes, force feedback) has no channel.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const EV_KEY: u16 = 1;
pub const EV_ABS: u16 = 3;

pub const BTN_CROSS: u16 = 304;
pub const BTN_CIRCLE: u16 = 305;
pub const BTN_TRIANGLE: u16 = 307;
pub const BTN_SQUARE: u16 = 308;
pub const BTN_L1: u16 = 310;
pub const BTN_R1: u16 = 311;
pub const BTN_L2: u16 = 312;
pub const BTN_R2: u16 = 313;
pub const BTN_SHARE: u16 = 314;
pub const BTN_OPTIONS: u16 = 315;
pub const BTN_PS: u16 = 316;
pub const BTN_L3: u16 = 317;
pub const BTN_R3: u16 = 318;

pub const ABS_X: u16 = 0;
pub const ABS_Y: u16 = 1;
pub const ABS_Z: u16 = 2;
pub const ABS_RX: u16 = 3;
pub const ABS_RY: u16 = 4;
pub const ABS_RZ: u16 = 5;
pub const ABS_HAT0X: u16 = 16;
pub const ABS_HAT0Y: u16 = 17;

/// Whether a channel carries a digital or an analog control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Button,
    Axis,
}

/// One semantic input source on the controller
///
/// Every channel owns exactly one slot in the
/// [`EventCache`](crate::controller::EventCache). Names in configuration files
/// use the snake_case form, e.g. `button_cross` or `axis_left_stick_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    ButtonCross,
    ButtonCircle,
    ButtonTriangle,
    ButtonSquare,
    ButtonL1,
    ButtonR1,
    ButtonL2,
    ButtonR2,
    ButtonShare,
    ButtonOptions,
    ButtonPs,
    ButtonL3,
    ButtonR3,
    AxisLeftStickX,
    AxisLeftStickY,
    AxisL2,
    AxisRightStickX,
    AxisRightStickY,
    AxisR2,
    AxisDPadX,
    AxisDPadY,
}

impl Channel {
    pub const COUNT: usize = 21;

    /// All channels in slot order
    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::ButtonCross,
        Channel::ButtonCircle,
        Channel::ButtonTriangle,
        Channel::ButtonSquare,
        Channel::ButtonL1,
        Channel::ButtonR1,
        Channel::ButtonL2,
        Channel::ButtonR2,
        Channel::ButtonShare,
        Channel::ButtonOptions,
        Channel::ButtonPs,
        Channel::ButtonL3,
        Channel::ButtonR3,
        Channel::AxisLeftStickX,
        Channel::AxisLeftStickY,
        Channel::AxisL2,
        Channel::AxisRightStickX,
        Channel::AxisRightStickY,
        Channel::AxisR2,
        Channel::AxisDPadX,
        Channel::AxisDPadY,
    ];

    /// Dense slot index in `0..Channel::COUNT`
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn kind(self) -> ChannelKind {
        if self.index() < Channel::AxisLeftStickX.index() {
            ChannelKind::Button
        } else {
            ChannelKind::Axis
        }
    }

    /// Decode a raw `(type, code)` pair, `None` for pairs we don't track
    pub fn from_raw(event_type: u16, code: u16) -> Option<Channel> {
        match event_type {
            EV_KEY => map_key(code),
            EV_ABS => map_abs(code),
            _ => None,
        }
    }

    /// Raw `(type, code)` pair that produces this channel
    pub fn raw_code(self) -> (u16, u16) {
        match self {
            Channel::ButtonCross => (EV_KEY, BTN_CROSS),
            Channel::ButtonCircle => (EV_KEY, BTN_CIRCLE),
            Channel::ButtonTriangle => (EV_KEY, BTN_TRIANGLE),
            Channel::ButtonSquare => (EV_KEY, BTN_SQUARE),
            Channel::ButtonL1 => (EV_KEY, BTN_L1),
            Channel::ButtonR1 => (EV_KEY, BTN_R1),
            Channel::ButtonL2 => (EV_KEY, BTN_L2),
            Channel::ButtonR2 => (EV_KEY, BTN_R2),
            Channel::ButtonShare => (EV_KEY, BTN_SHARE),
            Channel::ButtonOptions => (EV_KEY, BTN_OPTIONS),
            Channel::ButtonPs => (EV_KEY, BTN_PS),
            Channel::ButtonL3 => (EV_KEY, BTN_L3),
            Channel::ButtonR3 => (EV_KEY, BTN_R3),
            Channel::AxisLeftStickX => (EV_ABS, ABS_X),
            Channel::AxisLeftStickY => (EV_ABS, ABS_Y),
            Channel::AxisL2 => (EV_ABS, ABS_Z),
            Channel::AxisRightStickX => (EV_ABS, ABS_RX),
            Channel::AxisRightStickY => (EV_ABS, ABS_RY),
            Channel::AxisR2 => (EV_ABS, ABS_RZ),
            Channel::AxisDPadX => (EV_ABS, ABS_HAT0X),
            Channel::AxisDPadY => (EV_ABS, ABS_HAT0Y),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn map_key(code: u16) -> Option<Channel> {
    match code {
        BTN_CROSS => Some(Channel::ButtonCross),
        BTN_CIRCLE => Some(Channel::ButtonCircle),
        BTN_TRIANGLE => Some(Channel::ButtonTriangle),
        BTN_SQUARE => Some(Channel::ButtonSquare),
        BTN_L1 => Some(Channel::ButtonL1),
        BTN_R1 => Some(Channel::ButtonR1),
        BTN_L2 => Some(Channel::ButtonL2),
        BTN_R2 => Some(Channel::ButtonR2),
        BTN_SHARE => Some(Channel::ButtonShare),
        BTN_OPTIONS => Some(Channel::ButtonOptions),
        BTN_PS => Some(Channel::ButtonPs),
        BTN_L3 => Some(Channel::ButtonL3),
        BTN_R3 => Some(Channel::ButtonR3),
        _ => None,
    }
}

fn map_abs(code: u16) -> Option<Channel> {
    match code {
        ABS_X => Some(Channel::AxisLeftStickX),
        ABS_Y => Some(Channel::AxisLeftStickY),
        ABS_Z => Some(Channel::AxisL2),
        ABS_RX => Some(Channel::AxisRightStickX),
        ABS_RY => Some(Channel::AxisRightStickY),
        ABS_RZ => Some(Channel::AxisR2),
        ABS_HAT0X => Some(Channel::AxisDPadX),
        ABS_HAT0Y => Some(Channel::AxisDPadY),
        _ => None,
    }
}
