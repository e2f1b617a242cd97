use std::fmt;

use tracing::debug;

use crate::controller::scaler::AxisScaler;
use crate::sensor::RawStickSample;

/// Fields of [`ControllerState`], in event emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftButton,
    RightButton,
}

impl StateField {
    pub const ALL: [StateField; 6] = [
        StateField::LeftX,
        StateField::LeftY,
        StateField::RightX,
        StateField::RightY,
        StateField::LeftButton,
        StateField::RightButton,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of fields that differ between two states.
///
/// Iteration always follows [`StateField::ALL`], whatever the insertion order.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    bits: u8,
}

impl ChangeSet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn insert(&mut self, field: StateField) {
        self.bits |= field.bit();
    }

    pub fn contains(&self, field: StateField) -> bool {
        self.bits & field.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = StateField> + '_ {
        StateField::ALL
            .into_iter()
            .filter(move |field| self.contains(*field))
    }
}

impl FromIterator<StateField> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = StateField>>(iter: I) -> Self {
        let mut set = ChangeSet::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl fmt::Debug for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Combined state of both sticks in device units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
    pub left_button: bool,
    pub right_button: bool,
}

impl ControllerState {
    /// Scale both sticks' samples into one state.
    pub fn from_samples(scaler: &AxisScaler, left: RawStickSample, right: RawStickSample) -> Self {
        Self {
            left_x: scaler.scale(left.x),
            left_y: scaler.scale(left.y),
            right_x: scaler.scale(right.x),
            right_y: scaler.scale(right.y),
            left_button: left.pressed,
            right_button: right.pressed,
        }
    }

    /// Value of `field` as carried by an input event.
    pub fn value(&self, field: StateField) -> i32 {
        match field {
            StateField::LeftX => i32::from(self.left_x),
            StateField::LeftY => i32::from(self.left_y),
            StateField::RightX => i32::from(self.right_x),
            StateField::RightY => i32::from(self.right_y),
            StateField::LeftButton => i32::from(self.left_button),
            StateField::RightButton => i32::from(self.right_button),
        }
    }
}

/// Fields whose values differ between `current` and `incoming`.
pub fn diff(current: &ControllerState, incoming: &ControllerState) -> ChangeSet {
    StateField::ALL
        .into_iter()
        .filter(|field| current.value(*field) != incoming.value(*field))
        .collect()
}

/// Owner of the last state successfully written to the device.
#[derive(Debug, Default)]
pub struct StateDiffer {
    current: ControllerState,
}

impl StateDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &ControllerState {
        &self.current
    }

    pub fn diff(&self, incoming: &ControllerState) -> ChangeSet {
        let changes = diff(&self.current, incoming);
        if !changes.is_empty() {
            debug!("State changed: {:?}", changes);
        }
        changes
    }

    /// Record `incoming` as emitted. Call only after the device accepted it.
    pub fn commit(&mut self, incoming: ControllerState) {
        self.current = incoming;
    }
}
