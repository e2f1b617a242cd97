//! Controller subsystem: sample-to-event translation
//!
//! Implements the per-tick pipeline that turns raw stick readings into
//! virtual gamepad events:
//!
//! 1. [`scaler`] - Sensor range to device range, saturating
//! 2. [`state`] - Combined stick state, change detection and commit
//! 3. [`emitter`] - Ordered, terminated event batches in one write
//! 4. [`poll_loop`] - Fixed-period orchestration and device lifecycle
//!
//! # Architecture
//!
//! ```text
//! Sticks ──► read ──► scale ──► diff ──► emit ──► commit
//!            (raw)    (device   (Change  (batch   (only on
//!                      units)    Set)     + SYN)   success)
//! ```
//!
//! Everything runs on one task; the tick interval is the only await point.

pub mod emitter;
pub mod error;
pub mod poll_loop;
pub mod scaler;
pub mod state;

pub use emitter::{emit, EmitError};
pub use error::{BridgeError, CleanupFailure};
pub use poll_loop::{
    run_bridge, JoystickType, PollLoop, PollSettings, ShutdownReport, TickOutcome, TickStats,
};
pub use scaler::{scale, AxisDomain, AxisScaler};
pub use state::{diff, ChangeSet, ControllerState, StateDiffer, StateField};
