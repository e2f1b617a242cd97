use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use evdev::uinput::VirtualDevice;
use evdev::{AbsInfo, AttributeSet, BusType, InputId, KeyCode, UinputAbsSetup};
use tracing::{debug, info};

use super::{
    DeviceError, GamepadEvent, GamepadSpec, VirtualGamepad, LEFT_BUTTON, LEFT_X_AXIS,
    LEFT_Y_AXIS, RIGHT_BUTTON, RIGHT_X_AXIS, RIGHT_Y_AXIS,
};
use crate::controller::emitter::MAX_BATCH_LEN;

/// Gamepad registered through `/dev/uinput`.
pub struct UinputGamepad {
    device: VirtualDevice,
    name: String,
}

impl std::fmt::Debug for UinputGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputGamepad")
            .field("name", &self.name)
            .field("fd", &self.device.as_raw_fd())
            .finish()
    }
}

impl UinputGamepad {
    /// Register the device with the kernel.
    pub fn create(spec: &GamepadSpec) -> Result<Self, DeviceError> {
        debug!("Creating virtual gamepad with spec: {:?}", spec);

        let info = AbsInfo::new(
            0,
            i32::from(spec.axis.min),
            i32::from(spec.axis.max),
            spec.fuzz,
            spec.flat,
            0,
        );

        let mut buttons = AttributeSet::<KeyCode>::new();
        buttons.insert(LEFT_BUTTON);
        buttons.insert(RIGHT_BUTTON);

        let mut builder = VirtualDevice::builder()
            .map_err(DeviceError::Create)?
            .name(&spec.name)
            .input_id(InputId::new(
                BusType::BUS_USB,
                spec.vendor_id,
                spec.product_id,
                spec.version,
            ))
            .with_keys(&buttons)
            .map_err(DeviceError::Create)?;

        for axis in [LEFT_X_AXIS, LEFT_Y_AXIS, RIGHT_X_AXIS, RIGHT_Y_AXIS] {
            builder = builder
                .with_absolute_axis(&UinputAbsSetup::new(axis, info))
                .map_err(DeviceError::Create)?;
        }

        let device = builder.build().map_err(DeviceError::Create)?;
        info!("Created joystick device \"{}\"", spec.name);

        Ok(Self {
            device,
            name: spec.name.clone(),
        })
    }
}

fn to_input_event(event: &GamepadEvent) -> libc::input_event {
    let (type_, code, value) = event.raw();
    libc::input_event {
        time: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        type_,
        code,
        value,
    }
}

/// Encode `events` and hand them to `fd` in a single `write(2)`.
fn write_events(fd: BorrowedFd<'_>, events: &[GamepadEvent]) -> Result<(), DeviceError> {
    let mut raw = heapless::Vec::<libc::input_event, MAX_BATCH_LEN>::new();
    for event in events {
        raw.push(to_input_event(event))
            .map_err(|_| DeviceError::Oversized {
                len: events.len(),
                capacity: MAX_BATCH_LEN,
            })?;
    }
    let expected = mem::size_of_val(raw.as_slice());

    // SAFETY: `raw` is a live, initialised buffer of `expected` bytes.
    let written = unsafe {
        libc::write(
            fd.as_raw_fd(),
            raw.as_ptr().cast::<libc::c_void>(),
            expected,
        )
    };
    check_written(written, expected)
}

fn check_written(written: isize, expected: usize) -> Result<(), DeviceError> {
    if written < 0 {
        return Err(DeviceError::Write(io::Error::last_os_error()));
    }
    if written as usize != expected {
        return Err(DeviceError::ShortWrite {
            written: written as usize,
            expected,
        });
    }
    Ok(())
}

impl VirtualGamepad for UinputGamepad {
    // evdev's own emit() writes the terminator separately
    fn write_batch(&mut self, events: &[GamepadEvent]) -> Result<(), DeviceError> {
        write_events(self.device.as_fd(), events)
    }
}

impl Drop for UinputGamepad {
    fn drop(&mut self) {
        info!("Closed joystick device \"{}\"", self.name);
    }
}
