//! Virtual gamepad exposed through the kernel's input subsystem
//!
//! The bridge presents both sticks as one device with four absolute axes and
//! two thumb buttons:
//!
//! ```text
//! left stick   ABS_X  ABS_Y   BTN_THUMBL
//! right stick  ABS_RX ABS_RY  BTN_THUMBR
//! ```
//!
//! [`VirtualGamepad`] is the seam between the event emitter and the kernel.
//! The device is released when its handle is dropped.

pub mod uinput;

use std::fmt;
use std::io;

use evdev::{AbsoluteAxisCode, EventType, KeyCode, SynchronizationCode};

use crate::controller::scaler::AxisDomain;

pub use uinput::UinputGamepad;

pub const LEFT_X_AXIS: AbsoluteAxisCode = AbsoluteAxisCode::ABS_X;
pub const LEFT_Y_AXIS: AbsoluteAxisCode = AbsoluteAxisCode::ABS_Y;
pub const RIGHT_X_AXIS: AbsoluteAxisCode = AbsoluteAxisCode::ABS_RX;
pub const RIGHT_Y_AXIS: AbsoluteAxisCode = AbsoluteAxisCode::ABS_RY;
pub const LEFT_BUTTON: KeyCode = KeyCode::BTN_THUMBL;
pub const RIGHT_BUTTON: KeyCode = KeyCode::BTN_THUMBR;

/// One input event destined for the virtual gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamepadEvent {
    Axis { axis: AbsoluteAxisCode, value: i32 },
    Button { button: KeyCode, pressed: bool },
    /// `SYN_REPORT`, closes a batch.
    Sync,
}

impl GamepadEvent {
    /// Kernel `(type, code, value)` triple.
    pub fn raw(&self) -> (u16, u16, i32) {
        match *self {
            GamepadEvent::Axis { axis, value } => (EventType::ABSOLUTE.0, axis.0, value),
            GamepadEvent::Button { button, pressed } => {
                (EventType::KEY.0, button.code(), i32::from(pressed))
            }
            GamepadEvent::Sync => (
                EventType::SYNCHRONIZATION.0,
                SynchronizationCode::SYN_REPORT.0,
                0,
            ),
        }
    }
}

/// Identity and axis layout of the created device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadSpec {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    pub axis: AxisDomain,
    pub fuzz: i32,
    pub flat: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to create virtual gamepad: {0}")]
    Create(#[source] io::Error),

    #[error("Failed to write events: {0}")]
    Write(#[source] io::Error),

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Batch of {len} events exceeds the {capacity} event limit")]
    Oversized { len: usize, capacity: usize },
}

/// Sink for event batches.
pub trait VirtualGamepad: fmt::Debug {
    /// Deliver `events` in a single write; either the whole batch reaches the
    /// device or the call fails.
    fn write_batch(&mut self, events: &[GamepadEvent]) -> Result<(), DeviceError>;
}
