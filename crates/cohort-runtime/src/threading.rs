//! Thread-level negotiation.
//!
//! The provided level is a pure function of the requested level and the
//! build-time capability. It is committed once into a [`ThreadLevelCell`]
//! and never revisited.

use std::thread::{self, ThreadId};

use cohort_types::ThreadLevel;
use once_cell::sync::OnceCell;
use strum::Display;
use thiserror::Error;

/// Thread support compiled into the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ThreadSupport {
    /// No thread support at all.
    None,
    /// Threads are supported but the API serialises concurrent callers.
    Partial,
    /// Fully concurrent API calls are supported.
    Full,
}

/// Build-time concurrency ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadCapability {
    support: ThreadSupport,
    progress_threads: bool,
}

impl ThreadCapability {
    /// Describes an explicit capability.
    #[must_use]
    pub const fn new(support: ThreadSupport, progress_threads: bool) -> Self {
        Self {
            support,
            progress_threads,
        }
    }

    /// Capability selected by the crate's cargo features.
    #[must_use]
    pub const fn compiled() -> Self {
        let support = if cfg!(feature = "full-thread-support") {
            ThreadSupport::Full
        } else if cfg!(feature = "thread-support") {
            ThreadSupport::Partial
        } else {
            ThreadSupport::None
        };
        Self::new(support, cfg!(feature = "progress-threads"))
    }

    /// Compiled thread support.
    #[must_use]
    pub const fn support(self) -> ThreadSupport {
        self.support
    }

    /// Whether dedicated progress threads are compiled in.
    #[must_use]
    pub const fn progress_threads(self) -> bool {
        self.progress_threads
    }
}

impl Default for ThreadCapability {
    fn default() -> Self {
        Self::compiled()
    }
}

/// Result of negotiating the thread level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiation {
    /// Level the caller asked for.
    pub requested: ThreadLevel,
    /// Level the runtime provides.
    pub provided: ThreadLevel,
    /// Thread designated as the main thread, absent without thread support.
    pub main_thread: Option<ThreadId>,
    /// Whether fully concurrent use was granted.
    pub multiple: bool,
    /// Whether internal locking must assume multiple threads.
    pub using_threads: bool,
}

/// Computes the provided level for `requested` under `capability`.
///
/// # Example
///
/// ```
/// use cohort_runtime::{ThreadCapability, ThreadSupport, provided_level};
/// use cohort_types::ThreadLevel;
///
/// let partial = ThreadCapability::new(ThreadSupport::Partial, false);
/// assert_eq!(
///     provided_level(ThreadLevel::Multiple, partial),
///     ThreadLevel::Serialized
/// );
/// ```
#[must_use]
pub fn provided_level(requested: ThreadLevel, capability: ThreadCapability) -> ThreadLevel {
    match capability.support {
        ThreadSupport::None => ThreadLevel::Single,
        ThreadSupport::Full => requested,
        ThreadSupport::Partial if requested == ThreadLevel::Multiple => ThreadLevel::Serialized,
        ThreadSupport::Partial => requested,
    }
}

/// Negotiates the thread level on behalf of the calling thread.
#[must_use]
pub fn negotiate(requested: ThreadLevel, capability: ThreadCapability) -> Negotiation {
    let provided = provided_level(requested, capability);
    let main_thread = match capability.support {
        ThreadSupport::None => None,
        ThreadSupport::Partial | ThreadSupport::Full => Some(thread::current().id()),
    };
    Negotiation {
        requested,
        provided,
        main_thread,
        multiple: provided == ThreadLevel::Multiple,
        using_threads: capability.progress_threads || capability.support == ThreadSupport::Full,
    }
}

/// Errors raised by the thread-level guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadLevelError {
    /// A level was already committed for this process.
    #[error("thread level already negotiated as {provided}")]
    AlreadyNegotiated {
        /// Level committed by the first negotiation.
        provided: ThreadLevel,
    },
}

/// Write-once holder of the negotiated thread level.
#[derive(Debug, Default)]
pub struct ThreadLevelCell {
    negotiation: OnceCell<Negotiation>,
}

impl ThreadLevelCell {
    /// Builds an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits `negotiation`.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadLevelError::AlreadyNegotiated`] when a negotiation was
    /// already committed; the stored value is left untouched.
    pub fn commit(&self, negotiation: Negotiation) -> Result<Negotiation, ThreadLevelError> {
        self.negotiation
            .set(negotiation)
            .map_err(|_| ThreadLevelError::AlreadyNegotiated {
                provided: self
                    .negotiation
                    .get()
                    .map_or(negotiation.provided, |existing| existing.provided),
            })?;
        Ok(negotiation)
    }

    /// Committed negotiation, if any.
    #[must_use]
    pub fn get(&self) -> Option<&Negotiation> {
        self.negotiation.get()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ThreadSupport::None, false, ThreadLevel::Single, ThreadLevel::Single)]
    #[case(ThreadSupport::None, true, ThreadLevel::Funneled, ThreadLevel::Single)]
    #[case(ThreadSupport::None, false, ThreadLevel::Serialized, ThreadLevel::Single)]
    #[case(ThreadSupport::None, true, ThreadLevel::Multiple, ThreadLevel::Single)]
    #[case(ThreadSupport::Full, false, ThreadLevel::Single, ThreadLevel::Single)]
    #[case(ThreadSupport::Full, true, ThreadLevel::Funneled, ThreadLevel::Funneled)]
    #[case(ThreadSupport::Full, false, ThreadLevel::Serialized, ThreadLevel::Serialized)]
    #[case(ThreadSupport::Full, true, ThreadLevel::Multiple, ThreadLevel::Multiple)]
    #[case(ThreadSupport::Partial, false, ThreadLevel::Single, ThreadLevel::Single)]
    #[case(ThreadSupport::Partial, true, ThreadLevel::Funneled, ThreadLevel::Funneled)]
    #[case(ThreadSupport::Partial, false, ThreadLevel::Serialized, ThreadLevel::Serialized)]
    #[case(ThreadSupport::Partial, true, ThreadLevel::Multiple, ThreadLevel::Serialized)]
    fn provided_level_follows_policy_table(
        #[case] support: ThreadSupport,
        #[case] progress_threads: bool,
        #[case] requested: ThreadLevel,
        #[case] expected: ThreadLevel,
    ) {
        let capability = ThreadCapability::new(support, progress_threads);
        let first = negotiate(requested, capability);
        let second = negotiate(requested, capability);
        assert_eq!(first.provided, expected);
        assert_eq!(first, second);
        assert_eq!(first.multiple, expected == ThreadLevel::Multiple);
    }

    #[rstest]
    #[case(ThreadSupport::None, false)]
    #[case(ThreadSupport::Partial, true)]
    #[case(ThreadSupport::Full, true)]
    fn main_thread_requires_thread_support(#[case] support: ThreadSupport, #[case] expected: bool) {
        let negotiation = negotiate(ThreadLevel::Single, ThreadCapability::new(support, false));
        assert_eq!(negotiation.main_thread.is_some(), expected);
        if expected {
            assert_eq!(negotiation.main_thread, Some(std::thread::current().id()));
        }
    }

    #[rstest]
    #[case(ThreadSupport::Partial, false, false)]
    #[case(ThreadSupport::Partial, true, true)]
    #[case(ThreadSupport::Full, false, true)]
    fn using_threads_tracks_capability(
        #[case] support: ThreadSupport,
        #[case] progress_threads: bool,
        #[case] expected: bool,
    ) {
        let negotiation = negotiate(
            ThreadLevel::Funneled,
            ThreadCapability::new(support, progress_threads),
        );
        assert_eq!(negotiation.using_threads, expected);
    }

    #[test]
    fn cell_commits_exactly_once() {
        let cell = ThreadLevelCell::new();
        let full = ThreadCapability::new(ThreadSupport::Full, false);
        cell.commit(negotiate(ThreadLevel::Funneled, full))
            .expect("first commit");
        let error = cell
            .commit(negotiate(ThreadLevel::Multiple, full))
            .expect_err("second commit must fail");
        assert_eq!(
            error,
            ThreadLevelError::AlreadyNegotiated {
                provided: ThreadLevel::Funneled
            }
        );
        assert_eq!(
            cell.get().map(|negotiation| negotiation.provided),
            Some(ThreadLevel::Funneled)
        );
    }
}
