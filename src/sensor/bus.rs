//! I2C bus transport
//!
//! The sensor reader only needs four SMBus primitives, so the transport is a
//! small trait. [`RppalBus`] drives a real `/dev/i2c-N` adapter through
//! `rppal`; tests substitute an in-memory bus.

use std::fmt;

use rppal::i2c::I2c;
use tracing::{debug, info};

// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-addressed SMBus access to peripherals sharing one bus.
pub trait I2cBus: fmt::Debug {
    /// Route subsequent transfers to the peripheral at `address`.
    fn select_peripheral(&mut self, address: u16) -> Result<(), BusError>;

    /// Read a little-endian word register.
    fn read_word(&mut self, register: u8) -> Result<u16, BusError>;

    fn read_byte(&mut self, register: u8) -> Result<u8, BusError>;

    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError>;
}

/// Bus backed by the Linux i2c-dev interface.
#[derive(Debug)]
pub struct RppalBus {
    i2c: I2c,
    bus: u8,
}

impl RppalBus {
    /// Open `/dev/i2c-<bus>`.
    pub fn open(bus: u8) -> Result<Self, BusError> {
        debug!("Opening I2C bus {}", bus);
        let i2c = I2c::with_bus(bus)?;
        info!("Connected to I2C bus at /dev/i2c-{}", bus);
        Ok(Self { i2c, bus })
    }
}

impl I2cBus for RppalBus {
    fn select_peripheral(&mut self, address: u16) -> Result<(), BusError> {
        self.i2c.set_slave_address(address)?;
        Ok(())
    }

    fn read_word(&mut self, register: u8) -> Result<u16, BusError> {
        Ok(self.i2c.smbus_read_word(register)?)
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, BusError> {
        Ok(self.i2c.smbus_read_byte(register)?)
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.i2c.smbus_write_byte(register, value)?;
        Ok(())
    }
}

impl Drop for RppalBus {
    fn drop(&mut self) {
        info!("Disconnected from I2C bus /dev/i2c-{}", self.bus);
    }
}
