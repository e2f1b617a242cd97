use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::bus::{BusError, I2cBus};

// Register map of the joystick peripheral
pub const X_AXIS_REGISTER: u8 = 0x50; // word, little-endian
pub const Y_AXIS_REGISTER: u8 = 0x52; // word, little-endian
pub const BUTTON_REGISTER: u8 = 0x20; // byte, 0 = pressed
pub const INDICATOR_REGISTER: u8 = 0x30; // blue, green, red

/// One reading of a stick, straight from its registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawStickSample {
    pub x: i16,
    pub y: i16,
    pub pressed: bool,
}

/// RGB colour of a stick's indicator LED.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl IndicatorColor {
    pub const OFF: Self = Self::rgb(0, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 0x0f, 0);
    pub const YELLOW: Self = Self::rgb(0x0f, 0x0f, 0);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    // Order in which the indicator block stores the channels
    fn register_bytes(self) -> [u8; 3] {
        [self.blue, self.green, self.red]
    }
}

/// Which step of a transaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    Select,
    XAxis,
    YAxis,
    Button,
    Indicator,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ReadStage::Select => "addressing",
            ReadStage::XAxis => "X axis read",
            ReadStage::YAxis => "Y axis read",
            ReadStage::Button => "button read",
            ReadStage::Indicator => "indicator write",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("joystick at 0x{address:02x} unreachable ({stage}): {source}")]
    Unreachable {
        address: u16,
        stage: ReadStage,
        #[source]
        source: BusError,
    },
}

impl SensorError {
    pub fn address(&self) -> u16 {
        match self {
            SensorError::Unreachable { address, .. } => *address,
        }
    }
}

fn unreachable_at(address: u16, stage: ReadStage) -> impl FnOnce(BusError) -> SensorError {
    move |source| SensorError::Unreachable {
        address,
        stage,
        source,
    }
}

/// Read both axes and the button of the stick at `address`.
///
/// The button register reads 0 while the stick is pushed in; the returned
/// sample reports that as `pressed == true`.
pub fn read_stick(bus: &mut dyn I2cBus, address: u16) -> Result<RawStickSample, SensorError> {
    bus.select_peripheral(address)
        .map_err(unreachable_at(address, ReadStage::Select))?;

    let x = bus
        .read_word(X_AXIS_REGISTER)
        .map_err(unreachable_at(address, ReadStage::XAxis))? as i16;
    let y = bus
        .read_word(Y_AXIS_REGISTER)
        .map_err(unreachable_at(address, ReadStage::YAxis))? as i16;
    let button = bus
        .read_byte(BUTTON_REGISTER)
        .map_err(unreachable_at(address, ReadStage::Button))?;

    let sample = RawStickSample {
        x,
        y,
        pressed: button == 0,
    };
    trace!("Stick 0x{:02x}: {:?}", address, sample);
    Ok(sample)
}

/// Light the indicator of the stick at `address`. [`IndicatorColor::OFF`]
/// switches it off.
pub fn set_indicator(
    bus: &mut dyn I2cBus,
    address: u16,
    color: IndicatorColor,
) -> Result<(), SensorError> {
    bus.select_peripheral(address)
        .map_err(unreachable_at(address, ReadStage::Select))?;

    for (register, value) in (INDICATOR_REGISTER..).zip(color.register_bytes()) {
        bus.write_byte(register, value)
            .map_err(unreachable_at(address, ReadStage::Indicator))?;
    }

    debug!("Set indicator of stick 0x{:02x} to {:?}", address, color);
    Ok(())
}

/// Light each `(address, colour)` pair in order.
///
/// If one of them fails, every indicator touched so far (the failing one
/// included) is switched back off, best effort, before the error is returned.
pub fn light_indicators(
    bus: &mut dyn I2cBus,
    indicators: &[(u16, IndicatorColor)],
) -> Result<(), SensorError> {
    for (lit, &(address, color)) in indicators.iter().enumerate() {
        if let Err(e) = set_indicator(bus, address, color) {
            for &(touched, _) in &indicators[..=lit] {
                if let Err(clear) = set_indicator(bus, touched, IndicatorColor::OFF) {
                    warn!("Failed to clear indicator of stick 0x{:02x}: {}", touched, clear);
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBus;

    const LEFT: u16 = 0x63;
    const RIGHT: u16 = 0x64;

    #[test]
    fn reads_signed_axes_and_inverts_button() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        probe.set_stick(LEFT, -1200, 4095, 0);

        let sample = read_stick(&mut bus, LEFT).unwrap();
        assert_eq!(
            sample,
            RawStickSample {
                x: -1200,
                y: 4095,
                pressed: true
            }
        );
    }

    #[test]
    fn nonzero_button_register_means_released() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        for register_value in [1u8, 0x7f, 0xff] {
            probe.set_stick(LEFT, 0, 0, register_value);
            assert!(!read_stick(&mut bus, LEFT).unwrap().pressed);
        }
    }

    #[test]
    fn word_register_is_reinterpreted_as_twos_complement() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        probe.set_word(LEFT, X_AXIS_REGISTER, 0xf001);
        probe.set_word(LEFT, Y_AXIS_REGISTER, 0x0fff);

        let sample = read_stick(&mut bus, LEFT).unwrap();
        assert_eq!(sample.x, -4095);
        assert_eq!(sample.y, 4095);
    }

    #[test]
    fn missing_peripheral_is_unreachable_at_select() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        probe.set_unreachable(LEFT, true);

        let err = read_stick(&mut bus, LEFT).unwrap_err();
        assert_eq!(err.address(), LEFT);
        assert!(matches!(
            err,
            SensorError::Unreachable {
                stage: ReadStage::Select,
                ..
            }
        ));
    }

    #[test]
    fn failing_register_reports_its_stage() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        probe.remove_byte(LEFT, BUTTON_REGISTER);

        let err = read_stick(&mut bus, LEFT).unwrap_err();
        assert!(matches!(
            err,
            SensorError::Unreachable {
                stage: ReadStage::Button,
                ..
            }
        ));
    }

    #[test]
    fn indicator_is_written_blue_green_red() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        set_indicator(&mut bus, LEFT, IndicatorColor::rgb(0x11, 0x22, 0x33)).unwrap();

        assert_eq!(
            probe.writes(),
            vec![(LEFT, 0x30, 0x33), (LEFT, 0x31, 0x22), (LEFT, 0x32, 0x11)]
        );
    }

    #[test]
    fn indicator_on_unreachable_stick_fails() {
        let (mut bus, probe) = FakeBus::new(&[LEFT]);
        probe.set_unreachable(LEFT, true);

        assert!(set_indicator(&mut bus, LEFT, IndicatorColor::OFF).is_err());
        assert!(probe.writes().is_empty());
    }

    #[test]
    fn lights_every_indicator_in_order() {
        let (mut bus, probe) = FakeBus::new(&[LEFT, RIGHT]);
        light_indicators(
            &mut bus,
            &[(LEFT, IndicatorColor::GREEN), (RIGHT, IndicatorColor::YELLOW)],
        )
        .unwrap();

        assert_eq!(
            probe.writes(),
            vec![
                (LEFT, 0x30, 0x00),
                (LEFT, 0x31, 0x0f),
                (LEFT, 0x32, 0x00),
                (RIGHT, 0x30, 0x00),
                (RIGHT, 0x31, 0x0f),
                (RIGHT, 0x32, 0x0f),
            ]
        );
    }

    #[test]
    fn failed_indicator_switches_earlier_ones_back_off() {
        let (mut bus, probe) = FakeBus::new(&[LEFT, RIGHT]);
        probe.set_unreachable(RIGHT, true);

        let err = light_indicators(
            &mut bus,
            &[(LEFT, IndicatorColor::GREEN), (RIGHT, IndicatorColor::YELLOW)],
        )
        .unwrap_err();

        assert_eq!(err.address(), RIGHT);
        assert_eq!(
            probe.writes(),
            vec![
                (LEFT, 0x30, 0x00),
                (LEFT, 0x31, 0x0f),
                (LEFT, 0x32, 0x00),
                (LEFT, 0x30, 0x00),
                (LEFT, 0x31, 0x00),
                (LEFT, 0x32, 0x00),
            ]
        );
    }
}
