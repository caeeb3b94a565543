//! Named local subsystem initialisers.
//!
//! The bootstrap sequence calls these at fixed points. The runtime itself
//! does not implement datatypes, request tables or the other handle
//! subsystems; embedders install hooks for the ones they provide and the
//! rest succeed as no-ops.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use strum::{Display, EnumString};
use thiserror::Error;

use crate::environment::ProcessInfo;
use crate::error::ErrorCode;

/// Local subsystem initialised during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum LocalSubsystem {
    /// Datatype engine.
    DatatypeEngine,
    /// Process table.
    ProcessTable,
    /// Progress engine start-up.
    ProgressInit,
    /// Reduction operations.
    ReductionOps,
    /// Request handles.
    Requests,
    /// Info objects.
    Info,
    /// Error handlers.
    ErrorHandlers,
    /// Error codes.
    ErrorCodes,
    /// Error classes.
    ErrorClasses,
    /// Internal error codes.
    InternalErrorCodes,
    /// Groups.
    Groups,
    /// Communicators.
    Communicators,
    /// File handles.
    Files,
    /// Attribute keys.
    Attributes,
    /// Dynamic process management.
    DynamicProcesses,
}

/// Failure reported by a subsystem hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{subsystem} initialisation failed: {message}")]
pub struct SubsystemError {
    subsystem: LocalSubsystem,
    code: ErrorCode,
    message: String,
}

impl SubsystemError {
    /// Describes a failure of `subsystem`.
    #[must_use]
    pub fn new(subsystem: LocalSubsystem, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            subsystem,
            code,
            message: message.into(),
        }
    }

    /// Failing subsystem.
    #[must_use]
    pub const fn subsystem(&self) -> LocalSubsystem {
        self.subsystem
    }

    /// Numeric code reported by the hook.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }
}

/// Initialiser for one subsystem.
pub type SubsystemHook = Arc<dyn Fn(&ProcessInfo) -> Result<(), SubsystemError> + Send + Sync>;

/// Hook table consulted by the sequencer.
#[derive(Clone, Default)]
pub struct SubsystemHooks {
    hooks: BTreeMap<LocalSubsystem, SubsystemHook>,
}

impl fmt::Debug for SubsystemHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

impl SubsystemHooks {
    /// Installs `hook` for `subsystem`, replacing any previous one.
    #[must_use]
    pub fn with<F>(mut self, subsystem: LocalSubsystem, hook: F) -> Self
    where
        F: Fn(&ProcessInfo) -> Result<(), SubsystemError> + Send + Sync + 'static,
    {
        self.hooks.insert(subsystem, Arc::new(hook));
        self
    }

    /// Runs the hook for `subsystem`, if one is installed.
    ///
    /// # Errors
    ///
    /// Returns the hook's [`SubsystemError`].
    pub fn run(&self, subsystem: LocalSubsystem, info: &ProcessInfo) -> Result<(), SubsystemError> {
        match self.hooks.get(&subsystem) {
            Some(hook) => hook(info),
            None => Ok(()),
        }
    }
}
