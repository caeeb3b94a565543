use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Lifecycle state a process publishes to the registry.
///
/// States are ordered and only ever move forward for a given process.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ProcessState {
    /// Bootstrap has started but no stage marker has been written.
    #[default]
    Joining,
    /// Local module selection finished; waiting at the first barrier.
    AtStage1,
    /// Default communicators are ready; waiting at the second barrier.
    AtStage2,
    /// Bootstrap completed successfully.
    Running,
    /// Shutdown has begun.
    Finalizing,
}

/// Raised when a state transition would move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("process state cannot regress from {from} to {to}")]
pub struct StateRegression {
    /// State held before the rejected transition.
    pub from: ProcessState,
    /// State that was requested.
    pub to: ProcessState,
}

impl ProcessState {
    /// Returns the state reached after moving to `next`.
    ///
    /// Re-entering the current state is accepted so that retried registry
    /// writes stay harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StateRegression`] when `next` precedes `self`.
    pub const fn advance_to(self, next: Self) -> Result<Self, StateRegression> {
        if (next as u8) < (self as u8) {
            return Err(StateRegression {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }

    /// Encodes the state for storage in the registry.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decodes a state previously produced by [`ProcessState::as_byte`].
    #[must_use]
    pub const fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Joining),
            1 => Some(Self::AtStage1),
            2 => Some(Self::AtStage2),
            3 => Some(Self::Running),
            4 => Some(Self::Finalizing),
            _ => None,
        }
    }
}
