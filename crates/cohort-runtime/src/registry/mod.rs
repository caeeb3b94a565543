//! Registry contracts and the compound-command session.
//!
//! Every registry write issued during bootstrap goes through a
//! [`RegistrySession`]. The session is created once with a
//! [`CommandStrategy`]: `Direct` sends each operation immediately while
//! `Compound` opens the single command window of the bootstrap and buffers
//! operations until [`RegistrySession::flush`] sends them as one batch.

use std::time::Duration;

use cohort_types::ProcessIdentity;
use strum::Display;
use thiserror::Error;
use tracing::debug;

use crate::environment::ProcessRole;
use crate::oob::BarrierGate;

const TARGET: &str = "cohort_runtime::registry";

/// Registry key holding a process's lifecycle state.
pub const STATE_KEY: &str = "state";
/// Registry key holding the node a process runs on.
pub const NODE_KEY: &str = "node";
/// Registry key holding the serialised process-info record.
pub const PROCESS_INFO_KEY: &str = "process-info";

/// Errors reported by registry clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry service could not be reached.
    #[error("registry unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
    /// The registry rejected an operation.
    #[error("registry rejected write to '{key}' for {identity}: {message}")]
    Rejected {
        /// Process the write targeted.
        identity: ProcessIdentity,
        /// Key that was rejected.
        key: String,
        /// Reason given by the registry.
        message: String,
    },
    /// Flushing the compound command failed; remote state is ambiguous.
    #[error("compound command with {operations} operations failed to flush: {source}")]
    Flush {
        /// Number of buffered operations.
        operations: usize,
        /// Underlying failure.
        #[source]
        source: Box<RegistryError>,
    },
    /// A value read back from the registry could not be decoded.
    #[error("registry value '{key}' for {identity} is malformed: {message}")]
    Malformed {
        /// Process the value belongs to.
        identity: ProcessIdentity,
        /// Offending key.
        key: String,
        /// Decoding failure.
        message: String,
    },
    /// The registry did not answer within the configured bound.
    #[error("registry did not respond within {waited:?}")]
    Timeout {
        /// Time spent waiting.
        waited: Duration,
    },
}

/// A single buffered registry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOp {
    identity: ProcessIdentity,
    key: String,
    value: Vec<u8>,
}

impl RegistryOp {
    /// Describes a write of `value` under `key` for `identity`.
    #[must_use]
    pub fn put(identity: ProcessIdentity, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            identity,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Target process.
    #[must_use]
    pub const fn identity(&self) -> ProcessIdentity {
        self.identity
    }

    /// Target key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value written.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// Client of the distributed registry service.
pub trait RegistryClient: Send + Sync {
    /// Writes one value in its own round trip.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the write fails.
    fn write(&self, identity: ProcessIdentity, key: &str, value: &[u8]) -> Result<(), RegistryError>;

    /// Reads a value, returning `None` when it has not been written yet.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the read fails.
    fn read(&self, identity: ProcessIdentity, key: &str) -> Result<Option<Vec<u8>>, RegistryError>;

    /// Applies `ops` in order as a single round trip.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the batch fails.
    fn batch(&self, ops: &[RegistryOp]) -> Result<(), RegistryError>;

    /// Broadcasts the release notification for `gate` to every process.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the broadcast fails.
    fn notify_all(&self, gate: BarrierGate) -> Result<(), RegistryError>;
}

/// How registry operations are delivered during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CommandStrategy {
    /// Each operation is its own round trip.
    Direct,
    /// Operations are buffered and flushed once before the first barrier.
    Compound,
}

impl CommandStrategy {
    /// Chooses the strategy for a process.
    ///
    /// Seed and singleton processes talk to a local registry, and debug
    /// tracing needs every write to land immediately, so those cases send
    /// directly. Everyone else batches.
    #[must_use]
    pub const fn choose(role: ProcessRole, debug_trace: bool) -> Self {
        if role.seed() || role.singleton() || debug_trace {
            Self::Direct
        } else {
            Self::Compound
        }
    }
}

/// Ordered buffer of registry operations sent as one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundCommand {
    ops: Vec<RegistryOp>,
}

impl CompoundCommand {
    /// Appends an operation.
    pub fn push(&mut self, op: RegistryOp) {
        self.ops.push(op);
    }

    /// Buffered operations in issue order.
    #[must_use]
    pub fn ops(&self) -> &[RegistryOp] {
        &self.ops
    }

    /// Number of buffered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug)]
enum Window {
    Closed,
    Open(CompoundCommand),
    Flushed,
}

/// Registry access for one bootstrap, owning the optional command window.
pub struct RegistrySession {
    registry: std::sync::Arc<dyn RegistryClient>,
    strategy: CommandStrategy,
    window: Window,
}

impl std::fmt::Debug for RegistrySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySession")
            .field("strategy", &self.strategy)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RegistrySession {
    /// Starts a session, opening the command window for the compound
    /// strategy.
    #[must_use]
    pub fn open(registry: std::sync::Arc<dyn RegistryClient>, strategy: CommandStrategy) -> Self {
        let window = match strategy {
            CommandStrategy::Direct => Window::Closed,
            CommandStrategy::Compound => {
                debug!(target: TARGET, "compound command window opened");
                Window::Open(CompoundCommand::default())
            }
        };
        Self {
            registry,
            strategy,
            window,
        }
    }

    /// Strategy chosen for this session.
    #[must_use]
    pub const fn strategy(&self) -> CommandStrategy {
        self.strategy
    }

    /// Returns `true` while writes are being buffered.
    #[must_use]
    pub const fn is_buffering(&self) -> bool {
        matches!(self.window, Window::Open(_))
    }

    /// Number of operations waiting in the window.
    #[must_use]
    pub fn buffered(&self) -> usize {
        match &self.window {
            Window::Open(command) => command.len(),
            Window::Closed | Window::Flushed => 0,
        }
    }

    /// Underlying registry client.
    #[must_use]
    pub fn registry(&self) -> &dyn RegistryClient {
        self.registry.as_ref()
    }

    /// Issues `op`, buffering it while the window is open.
    ///
    /// # Errors
    ///
    /// Returns the client's error when a direct write fails.
    pub fn put(&mut self, op: RegistryOp) -> Result<(), RegistryError> {
        match &mut self.window {
            Window::Open(command) => {
                command.push(op);
                Ok(())
            }
            Window::Closed | Window::Flushed => {
                self.registry.write(op.identity(), op.key(), op.value())
            }
        }
    }

    /// Closes the window and sends its contents as one batch.
    ///
    /// Returns the number of operations sent. Without an open window this is
    /// a no-op returning zero, and a window is never reopened.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Flush`] when the batch fails.
    pub fn flush(&mut self) -> Result<usize, RegistryError> {
        let command = match std::mem::replace(&mut self.window, Window::Flushed) {
            Window::Open(command) => command,
            other => {
                self.window = other;
                return Ok(0);
            }
        };
        let operations = command.len();
        self.registry
            .batch(command.ops())
            .map_err(|source| RegistryError::Flush {
                operations,
                source: Box::new(source),
            })?;
        debug!(target: TARGET, operations, "compound command flushed");
        Ok(operations)
    }
}
