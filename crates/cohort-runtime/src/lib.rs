//! Bootstrap core of the Cohort runtime.
//!
//! A process becomes a usable member of its job by running a fixed sequence
//! of stages: it joins the runtime environment, registers with the
//! distributed registry, selects its components, exchanges contact
//! attributes with its peers, and meets them at two barriers before it
//! reports itself `RUNNING`. [`Runtime::initialize`] drives that sequence
//! exactly once per process.
//!
//! All external services are reached through traits ([`RegistryClient`],
//! [`OobChannel`], [`Environment`], [`AffinityBinder`], [`ProgressEngine`],
//! [`HelpChannel`], [`ConfigLoader`]) so the sequence can run against the
//! in-process [`sim`] cluster as readily as against real services.
//!
//! Registry traffic is batched: ordinary processes buffer every write issued
//! before the first barrier into one compound command and flush it in a
//! single round trip. Seed and singleton processes, and any process with
//! debug tracing enabled, write directly instead.

mod affinity;
mod barrier;
mod bootstrap;
mod communicator;
mod environment;
mod error;
mod exchange;
mod health;
mod help;
mod join;
mod oob;
mod progress;
mod registry;
mod runtime;
mod sequencer;
pub mod sim;
mod subsystems;
mod telemetry;
mod threading;

#[cfg(test)]
mod tests;

pub use affinity::{AffinityBinder, AffinityError, AffinityOutcome, SchedAffinity};
pub use barrier::synchronise;
pub use bootstrap::{ArgsConfigLoader, ConfigLoader, StaticConfigLoader};
pub use communicator::{Communicator, CommunicatorKind};
pub use environment::{Environment, EnvironmentError, ProcessInfo, ProcessRole};
pub use error::{BootstrapError, ErrorClass, ErrorCode, InitStatus, StepError};
pub use exchange::{ExchangeError, ExchangeKey, ExchangeRecord, ExchangeStore};
pub use health::{BootstrapReporter, StructuredBootstrapReporter};
pub use help::{
    HELP_TOPIC, HelpChannel, INTERNAL_FAILURE, PAFFINITY_UNAVAILABLE, SHOW_PARAMS,
    StderrHelpChannel, render,
};
pub use join::{JoinError, JoinProtocol};
pub use oob::{BarrierGate, Delivery, OobChannel, OobError};
pub use progress::{CooperativeProgress, ProgressEngine, ProgressMode};
pub use registry::{
    CommandStrategy, CompoundCommand, NODE_KEY, PROCESS_INFO_KEY, RegistryClient, RegistryError,
    RegistryOp, RegistrySession, STATE_KEY,
};
pub use runtime::{Runtime, RuntimeError};
pub use sequencer::{Collaborators, Initialized, StateCell, bootstrap_with};
pub use subsystems::{LocalSubsystem, SubsystemError, SubsystemHook, SubsystemHooks};
pub use telemetry::{Telemetry, TelemetryError, initialise as initialise_telemetry};
pub use threading::{
    Negotiation, ThreadCapability, ThreadLevelCell, ThreadLevelError, ThreadSupport, negotiate,
    provided_level,
};
