//! Out-of-band broadcast contract used as the barrier primitive.

use std::time::Duration;

use cohort_config::WaitPolicy;
use cohort_types::ProcessState;
use strum::Display;
use thiserror::Error;

use crate::progress::ProgressEngine;

/// Rendezvous point released by the registry coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BarrierGate {
    /// Every process has written `AT_STAGE1`.
    Stage1,
    /// Every process has written `AT_STAGE2`.
    Stage2,
}

impl BarrierGate {
    /// State every process must have published before the gate opens.
    #[must_use]
    pub const fn state(self) -> ProcessState {
        match self {
            Self::Stage1 => ProcessState::AtStage1,
            Self::Stage2 => ProcessState::AtStage2,
        }
    }

    /// Gate opened by processes reaching `state`, if any.
    #[must_use]
    pub const fn for_state(state: ProcessState) -> Option<Self> {
        match state {
            ProcessState::AtStage1 => Some(Self::Stage1),
            ProcessState::AtStage2 => Some(Self::Stage2),
            ProcessState::Joining | ProcessState::Running | ProcessState::Finalizing => None,
        }
    }
}

/// Errors reported by the out-of-band layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OobError {
    /// The channel to the coordinator is gone.
    #[error("out-of-band channel disconnected: {message}")]
    Disconnected {
        /// Description of the failure.
        message: String,
    },
    /// No notification arrived within the wait policy's deadline.
    #[error("no {gate} notification after {waited:?}")]
    Timeout {
        /// Gate being waited on.
        gate: BarrierGate,
        /// Time spent waiting.
        waited: Duration,
    },
    /// The broadcast completed without delivering a notification.
    #[error("{gate} broadcast completed without a notification")]
    MissingNotification {
        /// Gate being waited on.
        gate: BarrierGate,
    },
    /// A notification for a different gate was delivered.
    #[error("expected {expected} notification but received {received}")]
    UnexpectedNotification {
        /// Gate being waited on.
        expected: BarrierGate,
        /// Gate that was delivered.
        received: BarrierGate,
    },
}

/// Callback receiving the coordinator's notification.
pub type Delivery<'a> = dyn FnMut(BarrierGate, &[u8]) + 'a;

/// Broadcast/notify channel shared with the registry coordinator.
pub trait OobChannel: Send + Sync {
    /// Joins the broadcast for `gate`, blocking until the coordinator's
    /// notification is delivered to `delivery`.
    ///
    /// Implementations call [`ProgressEngine::poll`] between waits and give
    /// up once `policy` expires.
    ///
    /// # Errors
    ///
    /// Returns an [`OobError`] when the channel fails or the wait expires.
    fn xcast(
        &self,
        gate: BarrierGate,
        payload: &[u8],
        delivery: &mut Delivery<'_>,
        progress: &dyn ProgressEngine,
        policy: WaitPolicy,
    ) -> Result<(), OobError>;
}
