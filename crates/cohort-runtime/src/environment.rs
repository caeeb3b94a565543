//! Runtime environment join.
//!
//! Joining the environment happens before any registry contact and yields
//! the facts the rest of bootstrap depends on: who this process is, how
//! large its job is, and which role it plays.

use cohort_types::{JobId, ProcessIdentity};
use serde::Serialize;
use thiserror::Error;

/// Distinguished roles that exempt a process from command batching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessRole {
    seed: bool,
    singleton: bool,
}

impl ProcessRole {
    /// Describes a role.
    #[must_use]
    pub const fn new(seed: bool, singleton: bool) -> Self {
        Self { seed, singleton }
    }

    /// Whether this process hosts the registry seed.
    #[must_use]
    pub const fn seed(self) -> bool {
        self.seed
    }

    /// Whether this process runs without a launcher.
    #[must_use]
    pub const fn singleton(self) -> bool {
        self.singleton
    }
}

/// Facts established by joining the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    identity: ProcessIdentity,
    world_size: u32,
    role: ProcessRole,
    nodename: String,
    parent: Option<JobId>,
}

impl ProcessInfo {
    /// Builds a record for a process without a spawning parent.
    #[must_use]
    pub fn new(
        identity: ProcessIdentity,
        world_size: u32,
        role: ProcessRole,
        nodename: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            world_size,
            role,
            nodename: nodename.into(),
            parent: None,
        }
    }

    /// Records the job that spawned this one.
    #[must_use]
    pub const fn with_parent(mut self, parent: JobId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// This process.
    #[must_use]
    pub const fn identity(&self) -> ProcessIdentity {
        self.identity
    }

    /// Number of processes in the job.
    #[must_use]
    pub const fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Role flags.
    #[must_use]
    pub const fn role(&self) -> ProcessRole {
        self.role
    }

    /// Host name of the node.
    #[must_use]
    pub fn nodename(&self) -> &str {
        &self.nodename
    }

    /// Job that spawned this one, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<JobId> {
        self.parent
    }

    /// Every member of this process's job, in rank order.
    #[must_use]
    pub fn world(&self) -> Vec<ProcessIdentity> {
        ProcessIdentity::job_members(self.identity.job(), self.world_size)
    }
}

/// Errors raised while joining the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    /// A required local service is missing.
    #[error("environment service '{service}' unavailable: {message}")]
    Unavailable {
        /// Service that failed.
        service: String,
        /// Description of the failure.
        message: String,
    },
    /// The environment described an impossible job.
    #[error("invalid job description: {message}")]
    InvalidJob {
        /// Description of the inconsistency.
        message: String,
    },
}

/// Source of the process's identity and role.
pub trait Environment: Send + Sync {
    /// Joins the environment without contacting the registry.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvironmentError`] when the environment is unusable.
    fn join(&self) -> Result<ProcessInfo, EnvironmentError>;
}

/// Checks a joined record for internal consistency.
///
/// # Errors
///
/// Returns [`EnvironmentError::InvalidJob`] when the job is empty or the
/// rank lies outside it.
pub fn validate(info: &ProcessInfo) -> Result<(), EnvironmentError> {
    if info.world_size == 0 {
        return Err(EnvironmentError::InvalidJob {
            message: String::from("job has no members"),
        });
    }
    if info.identity.rank().get() >= info.world_size {
        return Err(EnvironmentError::InvalidJob {
            message: format!(
                "rank {} is outside a job of {} processes",
                info.identity.rank(),
                info.world_size
            ),
        });
    }
    Ok(())
}
