//! Bridge between two I2C analog joysticks and a virtual Linux gamepad.

pub mod config;
pub mod controller;
pub mod device;
pub mod sensor;

#[cfg(test)]
mod testing;
