//! Best-effort processor and memory affinity.
//!
//! Pinning never aborts bootstrap. When processor binding is requested but
//! cannot be honoured, a single `startup:paffinity-unavailable` message is
//! shown and the process carries on unbound. Memory binding is only tried
//! after the processor bind succeeded, and its failure is silent.

use cohort_config::AffinityRequest;
use cohort_types::Rank;
use thiserror::Error;
use tracing::{debug, warn};

use crate::help::{HELP_TOPIC, HelpChannel, PAFFINITY_UNAVAILABLE};

const TARGET: &str = "cohort_runtime::affinity";

/// Errors reported by an [`AffinityBinder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AffinityError {
    /// The platform offers no binding of this kind.
    #[error("{what} affinity is not supported on this platform")]
    Unsupported {
        /// Kind of binding requested.
        what: &'static str,
    },
    /// The operating system refused the binding.
    #[error("failed to bind to processor {processor}: {message}")]
    Bind {
        /// Requested processor index.
        processor: u32,
        /// Description of the failure.
        message: String,
    },
}

/// Binds the calling process to hardware resources.
pub trait AffinityBinder: Send + Sync {
    /// Pins the process to processor `index`.
    ///
    /// # Errors
    ///
    /// Returns an [`AffinityError`] when the binding cannot be applied.
    fn bind_processor(&self, index: u32) -> Result<(), AffinityError>;

    /// Binds memory allocation to the locality of the pinned processor.
    ///
    /// # Errors
    ///
    /// Returns an [`AffinityError`] when the binding cannot be applied.
    fn bind_memory(&self) -> Result<(), AffinityError>;
}

/// Binder backed by `sched_setaffinity`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchedAffinity;

impl AffinityBinder for SchedAffinity {
    #[cfg(target_os = "linux")]
    fn bind_processor(&self, index: u32) -> Result<(), AffinityError> {
        use nix::sched::{CpuSet, sched_setaffinity};
        use nix::unistd::Pid;

        let bind_error = |error: nix::Error| AffinityError::Bind {
            processor: index,
            message: error.to_string(),
        };
        let slot = usize::try_from(index).map_err(|error| AffinityError::Bind {
            processor: index,
            message: error.to_string(),
        })?;
        let mut set = CpuSet::new();
        set.set(slot).map_err(bind_error)?;
        sched_setaffinity(Pid::from_raw(0), &set).map_err(bind_error)
    }

    #[cfg(not(target_os = "linux"))]
    fn bind_processor(&self, _index: u32) -> Result<(), AffinityError> {
        Err(AffinityError::Unsupported { what: "processor" })
    }

    fn bind_memory(&self) -> Result<(), AffinityError> {
        Err(AffinityError::Unsupported { what: "memory" })
    }
}

/// Result of applying an affinity request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityOutcome {
    /// No pinning was requested.
    NotRequested,
    /// The process is pinned.
    Bound {
        /// Processor the process is pinned to.
        processor: u32,
        /// Whether memory binding also succeeded.
        memory: bool,
    },
    /// Pinning was requested but not applied.
    Degraded {
        /// Why pinning was skipped.
        reason: String,
    },
}

/// Applies `request` for the process at `rank`.
pub fn apply(
    request: AffinityRequest,
    rank: Rank,
    binder: &dyn AffinityBinder,
    help: &dyn HelpChannel,
) -> AffinityOutcome {
    let outcome = match request {
        AffinityRequest::Disabled => return AffinityOutcome::NotRequested,
        AffinityRequest::Unspecified => AffinityOutcome::Degraded {
            reason: String::from("no processor index was supplied"),
        },
        AffinityRequest::Processor { index } => match binder.bind_processor(index) {
            Ok(()) => {
                let memory = binder.bind_memory().is_ok();
                debug!(target: TARGET, processor = index, memory, "process pinned");
                AffinityOutcome::Bound {
                    processor: index,
                    memory,
                }
            }
            Err(error) => AffinityOutcome::Degraded {
                reason: error.to_string(),
            },
        },
    };
    if let AffinityOutcome::Degraded { reason } = &outcome {
        warn!(target: TARGET, %rank, reason, "processor affinity unavailable");
        help.show_help(HELP_TOPIC, PAFFINITY_UNAVAILABLE, &[rank.to_string()]);
    }
    outcome
}
