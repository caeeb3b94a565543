//! Cooperative progress engine contract.
//!
//! Bootstrap suspends in exactly two places (the barriers and the exchange
//! fetch). While suspended it keeps calling [`ProgressEngine::poll`] so that
//! network activity the registry depends on continues to move.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use strum::Display;

/// Polling regime of the progress engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ProgressMode {
    /// Latency-tolerant polling used while the runtime starts up.
    Startup,
    /// Throughput-oriented polling used once communication is possible.
    Steady,
}

/// Drives outstanding network events.
pub trait ProgressEngine: Send + Sync {
    /// Performs one non-blocking pass and returns the number of events
    /// serviced.
    fn poll(&self) -> usize;

    /// Switches the polling regime.
    fn set_mode(&self, mode: ProgressMode);

    /// Current polling regime.
    fn mode(&self) -> ProgressMode;
}

/// In-process engine that only counts passes.
#[derive(Debug, Default)]
pub struct CooperativeProgress {
    steady: AtomicBool,
    passes: AtomicUsize,
}

impl CooperativeProgress {
    /// Builds an engine in startup mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of passes performed so far.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::Acquire)
    }
}

impl ProgressEngine for CooperativeProgress {
    fn poll(&self) -> usize {
        self.passes.fetch_add(1, Ordering::AcqRel);
        0
    }

    fn set_mode(&self, mode: ProgressMode) {
        self.steady
            .store(mode == ProgressMode::Steady, Ordering::Release);
        tracing::debug!(target: "cohort_runtime::progress", %mode, "progress mode changed");
    }

    fn mode(&self) -> ProgressMode {
        if self.steady.load(Ordering::Acquire) {
            ProgressMode::Steady
        } else {
            ProgressMode::Startup
        }
    }
}
