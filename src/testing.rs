//! In-memory bus and gamepad used by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::rc::Rc;

use crate::device::{DeviceError, GamepadEvent, VirtualGamepad};
use crate::sensor::bus::{BusError, I2cBus};
use crate::sensor::reader::{BUTTON_REGISTER, X_AXIS_REGISTER, Y_AXIS_REGISTER};

/// Order in which fakes were dropped
pub type ReleaseLog = Rc<RefCell<Vec<&'static str>>>;

#[derive(Debug, Default)]
struct BusState {
    selected: Option<u16>,
    words: HashMap<(u16, u8), u16>,
    bytes: HashMap<(u16, u8), u8>,
    unreachable: HashSet<u16>,
    writes: Vec<(u16, u8, u8)>,
    released: usize,
}

#[derive(Debug)]
pub struct FakeBus {
    state: Rc<RefCell<BusState>>,
    log: ReleaseLog,
}

/// Test-side view of a [`FakeBus`] that stays valid after the bus is moved.
#[derive(Debug, Clone)]
pub struct BusProbe {
    state: Rc<RefCell<BusState>>,
}

fn nack() -> BusError {
    BusError::Io(io::Error::new(io::ErrorKind::NotFound, "no acknowledge"))
}

impl FakeBus {
    /// Bus with centred, released sticks at `addresses`.
    pub fn new(addresses: &[u16]) -> (Self, BusProbe) {
        Self::with_log(addresses, ReleaseLog::default())
    }

    pub fn with_log(addresses: &[u16], log: ReleaseLog) -> (Self, BusProbe) {
        let state = Rc::new(RefCell::new(BusState::default()));
        let probe = BusProbe {
            state: state.clone(),
        };
        for &address in addresses {
            probe.set_stick(address, 0, 0, 1);
        }
        (Self { state, log }, probe)
    }
}

impl BusProbe {
    pub fn set_stick(&self, address: u16, x: i16, y: i16, button_register: u8) {
        self.set_word(address, X_AXIS_REGISTER, x as u16);
        self.set_word(address, Y_AXIS_REGISTER, y as u16);
        self.state
            .borrow_mut()
            .bytes
            .insert((address, BUTTON_REGISTER), button_register);
    }

    pub fn set_word(&self, address: u16, register: u8, value: u16) {
        self.state
            .borrow_mut()
            .words
            .insert((address, register), value);
    }

    pub fn remove_byte(&self, address: u16, register: u8) {
        self.state.borrow_mut().bytes.remove(&(address, register));
    }

    pub fn set_unreachable(&self, address: u16, unreachable: bool) {
        let mut state = self.state.borrow_mut();
        if unreachable {
            state.unreachable.insert(address);
        } else {
            state.unreachable.remove(&address);
        }
    }

    /// Every `(address, register, value)` written so far.
    pub fn writes(&self) -> Vec<(u16, u8, u8)> {
        self.state.borrow().writes.clone()
    }

    pub fn released(&self) -> usize {
        self.state.borrow().released
    }
}

impl FakeBus {
    fn selected(&self) -> Result<u16, BusError> {
        self.state.borrow().selected.ok_or_else(nack)
    }
}

impl I2cBus for FakeBus {
    fn select_peripheral(&mut self, address: u16) -> Result<(), BusError> {
        let mut state = self.state.borrow_mut();
        if state.unreachable.contains(&address) {
            state.selected = None;
            return Err(nack());
        }
        state.selected = Some(address);
        Ok(())
    }

    fn read_word(&mut self, register: u8) -> Result<u16, BusError> {
        let address = self.selected()?;
        self.state
            .borrow()
            .words
            .get(&(address, register))
            .copied()
            .ok_or_else(nack)
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, BusError> {
        let address = self.selected()?;
        self.state
            .borrow()
            .bytes
            .get(&(address, register))
            .copied()
            .ok_or_else(nack)
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        let address = self.selected()?;
        self.state
            .borrow_mut()
            .writes
            .push((address, register, value));
        Ok(())
    }
}

impl Drop for FakeBus {
    fn drop(&mut self) {
        self.state.borrow_mut().released += 1;
        self.log.borrow_mut().push("bus");
    }
}

#[derive(Debug, Default)]
struct GamepadState {
    batches: Vec<Vec<GamepadEvent>>,
    write_calls: usize,
    fail_writes: bool,
    released: usize,
}

#[derive(Debug)]
pub struct RecordingGamepad {
    state: Rc<RefCell<GamepadState>>,
    log: ReleaseLog,
}

#[derive(Debug, Clone)]
pub struct GamepadProbe {
    state: Rc<RefCell<GamepadState>>,
}

impl RecordingGamepad {
    pub fn new() -> (Self, GamepadProbe) {
        Self::with_log(ReleaseLog::default())
    }

    pub fn with_log(log: ReleaseLog) -> (Self, GamepadProbe) {
        let state = Rc::new(RefCell::new(GamepadState::default()));
        let probe = GamepadProbe {
            state: state.clone(),
        };
        (Self { state, log }, probe)
    }
}

impl GamepadProbe {
    /// Batches the device accepted.
    pub fn batches(&self) -> Vec<Vec<GamepadEvent>> {
        self.state.borrow().batches.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state.borrow().write_calls
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn released(&self) -> usize {
        self.state.borrow().released
    }
}

impl VirtualGamepad for RecordingGamepad {
    fn write_batch(&mut self, events: &[GamepadEvent]) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.write_calls += 1;
        if state.fail_writes {
            return Err(DeviceError::Write(io::Error::new(
                io::ErrorKind::WouldBlock,
                "device busy",
            )));
        }
        state.batches.push(events.to_vec());
        Ok(())
    }
}

impl Drop for RecordingGamepad {
    fn drop(&mut self) {
        self.state.borrow_mut().released += 1;
        self.log.borrow_mut().push("device");
    }
}
