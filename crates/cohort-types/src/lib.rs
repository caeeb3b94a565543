//! Shared value types for the Cohort bootstrap runtime.
//!
//! These types cross crate boundaries: the component framework hands
//! [`ProcessIdentity`] lists to transports, the runtime writes
//! [`ProcessState`] markers to the registry, and the configuration layer
//! parses [`ThreadLevel`] values supplied by callers.

mod identity;
mod state;
mod thread_level;

pub use identity::{JobId, ProcessIdentity, Rank};
pub use state::{ProcessState, StateRegression};
pub use thread_level::{ThreadLevel, ThreadLevelParseError};
