//! Error model shared by every bootstrap stage.
//!
//! Collaborator errors are folded into a [`StepError`], which records the
//! [`ErrorClass`] the caller is told about and the numeric [`ErrorCode`]
//! echoed on the help channel. The sequencer wraps the first failing step in
//! [`BootstrapError::Stage`] together with the stage label.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use cohort_components::ComponentError;
use ortho_config::OrthoError;
use strum::Display;
use thiserror::Error;

use crate::environment::EnvironmentError;
use crate::exchange::ExchangeError;
use crate::join::JoinError;
use crate::oob::OobError;
use crate::registry::RegistryError;
use crate::subsystems::SubsystemError;
use crate::telemetry::TelemetryError;
use crate::threading::ThreadLevelError;

/// Category of a bootstrap failure reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorClass {
    /// The process could not join its runtime environment.
    EnvironmentJoin,
    /// The registry or out-of-band layer failed.
    Registry,
    /// A mandatory category had no viable component.
    ModuleSelection,
    /// A local subsystem failed to initialise.
    LocalSubsystem,
    /// The caller or configuration asked for something invalid.
    Usage,
}

/// Numeric code reported alongside a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    /// Unclassified failure.
    pub const ERROR: Self = Self(-1);
    /// A resource could not be allocated.
    pub const OUT_OF_RESOURCE: Self = Self(-2);
    /// A parameter was rejected.
    pub const BAD_PARAM: Self = Self(-5);
    /// The operation is not supported here.
    pub const NOT_SUPPORTED: Self = Self(-8);
    /// A peer or service could not be reached.
    pub const UNREACHABLE: Self = Self(-12);
    /// Something that was looked up does not exist.
    pub const NOT_FOUND: Self = Self(-13);
    /// Something that must be unique already exists.
    pub const EXISTS: Self = Self(-14);
    /// A wait ran out of time.
    pub const TIMEOUT: Self = Self(-15);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Short human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self.0 {
            -1 => "error",
            -2 => "out of resource",
            -5 => "bad parameter",
            -8 => "not supported",
            -12 => "unreachable",
            -13 => "not found",
            -14 => "exists",
            -15 => "timeout",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.0)
    }
}

/// Overall outcome of `initialize`, as a stable numeric status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum InitStatus {
    /// Bootstrap completed.
    Success,
    /// See [`ErrorClass::EnvironmentJoin`].
    EnvironmentJoin,
    /// See [`ErrorClass::Registry`].
    Registry,
    /// See [`ErrorClass::ModuleSelection`].
    ModuleSelection,
    /// See [`ErrorClass::LocalSubsystem`].
    LocalSubsystem,
    /// See [`ErrorClass::Usage`].
    Usage,
    /// `initialize` was invoked more than once.
    AlreadyInitialized,
}

impl InitStatus {
    /// Stable numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::EnvironmentJoin => 1,
            Self::Registry => 2,
            Self::ModuleSelection => 3,
            Self::LocalSubsystem => 4,
            Self::Usage => 5,
            Self::AlreadyInitialized => 6,
        }
    }
}

impl From<ErrorClass> for InitStatus {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::EnvironmentJoin => Self::EnvironmentJoin,
            ErrorClass::Registry => Self::Registry,
            ErrorClass::ModuleSelection => Self::ModuleSelection,
            ErrorClass::LocalSubsystem => Self::LocalSubsystem,
            ErrorClass::Usage => Self::Usage,
        }
    }
}

type Source = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a single bootstrap step.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StepError {
    class: ErrorClass,
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<Source>,
}

impl StepError {
    /// Builds an error without an underlying cause.
    #[must_use]
    pub fn new(class: ErrorClass, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            class,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that keeps `source` as its cause and reuses its
    /// message.
    #[must_use]
    pub fn wrap<E>(class: ErrorClass, code: ErrorCode, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            class,
            code,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Failure class.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.class
    }

    /// Numeric code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Low-level error string.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ComponentError> for StepError {
    fn from(error: ComponentError) -> Self {
        let (class, code) = match &error {
            ComponentError::NoViableComponent { .. } => {
                (ErrorClass::ModuleSelection, ErrorCode::NOT_FOUND)
            }
            ComponentError::Operation { .. } => (ErrorClass::LocalSubsystem, ErrorCode::ERROR),
            ComponentError::Unavailable { .. } => {
                (ErrorClass::ModuleSelection, ErrorCode::NOT_SUPPORTED)
            }
            ComponentError::Descriptor { .. } => (ErrorClass::ModuleSelection, ErrorCode::BAD_PARAM),
            ComponentError::Construction { .. }
            | ComponentError::AlreadyOpened { .. }
            | ComponentError::NotOpened { .. }
            | ComponentError::AlreadySelected { .. }
            | ComponentError::NotSelected { .. } => (ErrorClass::ModuleSelection, ErrorCode::ERROR),
        };
        Self::wrap(class, code, error)
    }
}

impl From<RegistryError> for StepError {
    fn from(error: RegistryError) -> Self {
        let code = registry_code(&error);
        Self::wrap(ErrorClass::Registry, code, error)
    }
}

fn registry_code(error: &RegistryError) -> ErrorCode {
    match error {
        RegistryError::Unavailable { .. } => ErrorCode::UNREACHABLE,
        RegistryError::Timeout { .. } => ErrorCode::TIMEOUT,
        RegistryError::Flush { source, .. } => registry_code(source),
        RegistryError::Rejected { .. } | RegistryError::Malformed { .. } => ErrorCode::ERROR,
    }
}

impl From<OobError> for StepError {
    fn from(error: OobError) -> Self {
        let code = match &error {
            OobError::Disconnected { .. } => ErrorCode::UNREACHABLE,
            OobError::Timeout { .. } => ErrorCode::TIMEOUT,
            OobError::MissingNotification { .. } | OobError::UnexpectedNotification { .. } => {
                ErrorCode::ERROR
            }
        };
        Self::wrap(ErrorClass::Registry, code, error)
    }
}

impl From<ExchangeError> for StepError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::Registry(inner) => inner.into(),
            ExchangeError::DuplicateKey { .. } => {
                Self::wrap(ErrorClass::Usage, ErrorCode::EXISTS, error)
            }
            ExchangeError::InvalidKey { .. } => {
                Self::wrap(ErrorClass::Usage, ErrorCode::BAD_PARAM, error)
            }
            ExchangeError::Incomplete { .. } => {
                Self::wrap(ErrorClass::Registry, ErrorCode::TIMEOUT, error)
            }
            ExchangeError::Index(_) => Self::wrap(ErrorClass::Registry, ErrorCode::ERROR, error),
        }
    }
}

impl From<JoinError> for StepError {
    fn from(error: JoinError) -> Self {
        match error {
            JoinError::Registry(inner) => inner.into(),
            JoinError::Regression(_) => Self::wrap(ErrorClass::Usage, ErrorCode::BAD_PARAM, error),
        }
    }
}

impl From<ThreadLevelError> for StepError {
    fn from(error: ThreadLevelError) -> Self {
        Self::wrap(ErrorClass::Usage, ErrorCode::EXISTS, error)
    }
}

impl From<EnvironmentError> for StepError {
    fn from(error: EnvironmentError) -> Self {
        let code = match &error {
            EnvironmentError::Unavailable { .. } => ErrorCode::NOT_FOUND,
            EnvironmentError::InvalidJob { .. } => ErrorCode::BAD_PARAM,
        };
        Self::wrap(ErrorClass::EnvironmentJoin, code, error)
    }
}

impl From<SubsystemError> for StepError {
    fn from(error: SubsystemError) -> Self {
        let code = error.code();
        Self::wrap(ErrorClass::LocalSubsystem, code, error)
    }
}

impl From<TelemetryError> for StepError {
    fn from(error: TelemetryError) -> Self {
        Self::wrap(ErrorClass::EnvironmentJoin, ErrorCode::BAD_PARAM, error)
    }
}

impl From<Arc<OrthoError>> for StepError {
    fn from(error: Arc<OrthoError>) -> Self {
        Self::new(ErrorClass::EnvironmentJoin, ErrorCode::BAD_PARAM, error.to_string())
    }
}

/// Error returned by `initialize`.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// `initialize` already ran (or is running) in this process.
    #[error("the runtime has already been initialised")]
    AlreadyInitialized,
    /// A bootstrap stage failed; later stages did not run.
    #[error("bootstrap stage '{stage}' failed: {source}")]
    Stage {
        /// Label of the failing stage.
        stage: String,
        /// Underlying failure.
        #[source]
        source: StepError,
    },
}

impl BootstrapError {
    /// Stable numeric status for this failure.
    #[must_use]
    pub fn status(&self) -> InitStatus {
        match self {
            Self::AlreadyInitialized => InitStatus::AlreadyInitialized,
            Self::Stage { source, .. } => source.class().into(),
        }
    }

    /// Label of the failing stage, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::AlreadyInitialized => None,
            Self::Stage { stage, .. } => Some(stage),
        }
    }

    /// Step failure behind a stage error.
    #[must_use]
    pub fn step(&self) -> Option<&StepError> {
        match self {
            Self::AlreadyInitialized => None,
            Self::Stage { source, .. } => Some(source),
        }
    }
}
