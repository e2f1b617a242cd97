//! Sensor subsystem for the I2C joysticks
//!
//! Each stick is an independent peripheral on a shared I2C bus:
//!
//! 1. [`bus`] - SMBus transport ([`I2cBus`]) and its `rppal` implementation
//! 2. [`reader`] - Register map, stick sampling and indicator control
//!
//! # Register Map
//!
//! ```text
//! 0x20  button   1 byte   0 = pressed
//! 0x30  colour   3 bytes  blue, green, red
//! 0x50  X axis   2 bytes  little-endian, signed
//! 0x52  Y axis   2 bytes  little-endian, signed
//! ```

pub mod bus;
pub mod reader;

pub use bus::{BusError, I2cBus, RppalBus};
pub use reader::{
    light_indicators, read_stick, set_indicator, IndicatorColor, RawStickSample, ReadStage,
    SensorError,
};
