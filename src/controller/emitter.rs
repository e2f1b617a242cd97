//! Event emitter
//!
//! Turns a [`ChangeSet`] into one batch of input events and hands it to the
//! virtual gamepad in a single write. Batches are bounded: one event per
//! state field plus the closing `SYN_REPORT`.

use evdev::AbsoluteAxisCode;
use tracing::{debug, trace};

use crate::controller::state::{ChangeSet, ControllerState, StateField};
use crate::device::{
    DeviceError, GamepadEvent, VirtualGamepad, LEFT_BUTTON, LEFT_X_AXIS, LEFT_Y_AXIS,
    RIGHT_BUTTON, RIGHT_X_AXIS, RIGHT_Y_AXIS,
};

/// Largest possible batch: every field changed, plus the terminator.
///
/// [`build_batch`] relies on this bound; a smaller capacity would drop the
/// closing `SYN_REPORT`.
pub const MAX_BATCH_LEN: usize = StateField::ALL.len() + 1;

pub type EventBatch = heapless::Vec<GamepadEvent, MAX_BATCH_LEN>;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("Failed to deliver batch of {events} events: {source}")]
    WriteFailed {
        events: usize,
        #[source]
        source: DeviceError,
    },
}

/// Event carrying `field`'s value in `state`.
pub fn field_event(field: StateField, state: &ControllerState) -> GamepadEvent {
    let axis_event = |axis: AbsoluteAxisCode| GamepadEvent::Axis {
        axis,
        value: state.value(field),
    };
    match field {
        StateField::LeftX => axis_event(LEFT_X_AXIS),
        StateField::LeftY => axis_event(LEFT_Y_AXIS),
        StateField::RightX => axis_event(RIGHT_X_AXIS),
        StateField::RightY => axis_event(RIGHT_Y_AXIS),
        StateField::LeftButton => GamepadEvent::Button {
            button: LEFT_BUTTON,
            pressed: state.left_button,
        },
        StateField::RightButton => GamepadEvent::Button {
            button: RIGHT_BUTTON,
            pressed: state.right_button,
        },
    }
}

/// Events for `changes` in field order, closed by a sync event.
/// Empty when nothing changed.
pub fn build_batch(changes: ChangeSet, incoming: &ControllerState) -> EventBatch {
    let mut batch = EventBatch::new();
    if changes.is_empty() {
        return batch;
    }

    for field in changes.iter() {
        let pushed = batch.push(field_event(field, incoming));
        debug_assert!(pushed.is_ok(), "event batch overflow");
    }
    let pushed = batch.push(GamepadEvent::Sync);
    debug_assert!(pushed.is_ok(), "no room for the sync terminator");
    batch
}

/// Write the events for `changes` to `device`.
///
/// Returns the number of events written; an empty change set performs no
/// write at all.
pub fn emit(
    device: &mut dyn VirtualGamepad,
    changes: ChangeSet,
    incoming: &ControllerState,
) -> Result<usize, EmitError> {
    let batch = build_batch(changes, incoming);
    if batch.is_empty() {
        trace!("No changes, nothing to emit");
        return Ok(0);
    }

    device
        .write_batch(&batch)
        .map_err(|source| EmitError::WriteFailed {
            events: batch.len(),
            source,
        })?;

    debug!("Emitted {} events", batch.len());
    Ok(batch.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::diff;
    use crate::testing::RecordingGamepad;

    fn all_changed() -> ControllerState {
        ControllerState {
            left_x: 1,
            left_y: 2,
            right_x: 3,
            right_y: 4,
            left_button: true,
            right_button: true,
        }
    }

    #[test]
    fn empty_change_set_writes_nothing() {
        let (mut gamepad, probe) = RecordingGamepad::new();
        let written = emit(&mut gamepad, ChangeSet::empty(), &all_changed()).unwrap();

        assert_eq!(written, 0);
        assert_eq!(probe.write_calls(), 0);
    }

    #[test]
    fn left_stick_batch_is_ordered_and_terminated() {
        let incoming = ControllerState {
            left_x: 4096,
            left_y: -4096,
            left_button: true,
            ..Default::default()
        };
        let changes = diff(&ControllerState::default(), &incoming);

        let (mut gamepad, probe) = RecordingGamepad::new();
        assert_eq!(emit(&mut gamepad, changes, &incoming).unwrap(), 4);

        assert_eq!(
            probe.batches(),
            vec![vec![
                GamepadEvent::Axis {
                    axis: LEFT_X_AXIS,
                    value: 4096
                },
                GamepadEvent::Axis {
                    axis: LEFT_Y_AXIS,
                    value: -4096
                },
                GamepadEvent::Button {
                    button: LEFT_BUTTON,
                    pressed: true
                },
                GamepadEvent::Sync,
            ]]
        );
    }

    #[test]
    fn full_batch_fits_capacity() {
        let changes: ChangeSet = StateField::ALL.into_iter().collect();
        let batch = build_batch(changes, &all_changed());

        assert_eq!(batch.len(), MAX_BATCH_LEN);
        assert_eq!(batch.last(), Some(&GamepadEvent::Sync));
        assert_eq!(
            batch[3],
            GamepadEvent::Axis {
                axis: RIGHT_Y_AXIS,
                value: 4
            }
        );
        assert_eq!(
            batch[5],
            GamepadEvent::Button {
                button: RIGHT_BUTTON,
                pressed: true
            }
        );
    }

    #[test]
    fn released_button_carries_zero() {
        let changes: ChangeSet = [StateField::RightButton].into_iter().collect();
        let batch = build_batch(changes, &ControllerState::default());

        assert_eq!(batch[0].raw().2, 0);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn device_failure_is_reported_as_write_failed() {
        let (mut gamepad, probe) = RecordingGamepad::new();
        probe.fail_writes(true);

        let changes: ChangeSet = [StateField::LeftX].into_iter().collect();
        let err = emit(&mut gamepad, changes, &all_changed()).unwrap_err();

        assert!(matches!(err, EmitError::WriteFailed { events: 2, .. }));
        assert_eq!(probe.write_calls(), 1);
        assert!(probe.batches().is_empty());
    }
}
