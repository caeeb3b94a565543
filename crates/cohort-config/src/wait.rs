use std::time::{Duration, Instant};

/// Bounds applied while polling for peers.
///
/// The bootstrap core assumes every wait eventually succeeds or fails with a
/// terminal error. Whether that wait is bounded is an external decision, so
/// the policy is carried here rather than hard-coded in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    poll_interval: Duration,
    deadline: Option<Duration>,
}

impl WaitPolicy {
    /// Builds an unbounded policy polling at `poll_interval`.
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            deadline: None,
        }
    }

    /// Bounds every wait governed by this policy.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay between consecutive polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Upper bound on a single wait, when one is configured.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Returns `true` once a wait that began at `started` has run out of time.
    #[must_use]
    pub fn expired(&self, started: Instant) -> bool {
        self.deadline
            .is_some_and(|deadline| started.elapsed() >= deadline)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::DEFAULT_POLL_INTERVAL_MS))
    }
}
