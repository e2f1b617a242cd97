//! Error taxonomy of the bridge
//!
//! Only setup failures escape the poll loop. Read and write failures are
//! handled per tick ([`crate::sensor::SensorError`],
//! [`crate::controller::emitter::EmitError`]), and teardown failures are
//! collected as [`CleanupFailure`] values instead of being raised.

use std::error::Error;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Bus, device or indicator setup failed; the bridge cannot start.
    #[error("Setup failed while {context}: {source}")]
    FatalSetup {
        context: String,
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
}

impl BridgeError {
    pub fn setup(
        context: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        BridgeError::FatalSetup {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// A teardown step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub step: String,
    pub error: String,
}

impl CleanupFailure {
    pub fn new(step: impl Into<String>, error: &dyn Error) -> Self {
        Self {
            step: step.into(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.error)
    }
}
