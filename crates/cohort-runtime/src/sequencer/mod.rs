//! Bootstrap sequencer.
//!
//! Runs the fixed, totally ordered stage list that takes a process from
//! "not started" to `RUNNING`. Every stage goes through the [`Railway`]
//! helper, which reports progress to the [`BootstrapReporter`] and turns the
//! first failure into [`BootstrapError::Stage`]. Later stages never run after
//! a failure, and exactly one `startup:internal-failure` message is shown.
//!
//! Values produced by one stage and consumed by a later one travel as plain
//! locals; there is no shared mutable context.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cohort_components::{
    Category, ComponentCatalog, ComponentFramework, FrameworkPolicy, SelectionHints, WinnerSet,
};
use cohort_config::{Config, WaitPolicy};
use cohort_types::{ProcessIdentity, ProcessState, ThreadLevel};
use tracing::debug;

use crate::affinity::{self, AffinityBinder, AffinityOutcome};
use crate::barrier;
use crate::bootstrap::ConfigLoader;
use crate::communicator::{Communicator, CommunicatorKind};
use crate::environment::{self, Environment, EnvironmentError, ProcessInfo};
use crate::error::{BootstrapError, ErrorClass, ErrorCode, StepError};
use crate::exchange::{ExchangeRecord, ExchangeStore};
use crate::health::BootstrapReporter;
use crate::help::{HELP_TOPIC, HelpChannel, INTERNAL_FAILURE, SHOW_PARAMS};
use crate::join::{JoinError, JoinProtocol};
use crate::oob::{BarrierGate, OobChannel};
use crate::progress::{ProgressEngine, ProgressMode};
use crate::registry::{
    CommandStrategy, PROCESS_INFO_KEY, RegistryClient, RegistryOp, RegistrySession,
};
use crate::subsystems::{LocalSubsystem, SubsystemHooks};
use crate::telemetry;
use crate::threading::{Negotiation, ThreadCapability, ThreadLevelCell, negotiate};

const TARGET: &str = "cohort_runtime::sequencer";

const EARLY_SUBSYSTEMS: [LocalSubsystem; 4] = [
    LocalSubsystem::DatatypeEngine,
    LocalSubsystem::ProcessTable,
    LocalSubsystem::ProgressInit,
    LocalSubsystem::ReductionOps,
];

const HANDLE_SUBSYSTEMS: [LocalSubsystem; 7] = [
    LocalSubsystem::Requests,
    LocalSubsystem::Info,
    LocalSubsystem::ErrorHandlers,
    LocalSubsystem::ErrorCodes,
    LocalSubsystem::ErrorClasses,
    LocalSubsystem::InternalErrorCodes,
    LocalSubsystem::Groups,
];

const LATE_SUBSYSTEMS: [LocalSubsystem; 2] = [LocalSubsystem::Files, LocalSubsystem::Attributes];

/// Everything bootstrap talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Resolves the configuration from start-up arguments.
    pub config_loader: Arc<dyn ConfigLoader>,
    /// Supplies identity and role.
    pub environment: Arc<dyn Environment>,
    /// Distributed registry client.
    pub registry: Arc<dyn RegistryClient>,
    /// Broadcast channel used for barriers.
    pub oob: Arc<dyn OobChannel>,
    /// Processor and memory binder.
    pub affinity: Arc<dyn AffinityBinder>,
    /// Progress engine driven while waiting.
    pub progress: Arc<dyn ProgressEngine>,
    /// User-facing diagnostics sink.
    pub help: Arc<dyn HelpChannel>,
    /// Lifecycle observer.
    pub reporter: Arc<dyn BootstrapReporter>,
    /// Components available to this process.
    pub catalog: ComponentCatalog,
    /// Per-category selection policy.
    pub policy: FrameworkPolicy,
    /// Local subsystem initialisers.
    pub subsystems: SubsystemHooks,
    /// Build-time thread capability.
    pub capability: ThreadCapability,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("catalog", &self.catalog)
            .field("policy", &self.policy)
            .field("subsystems", &self.subsystems)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Lock-free view of the process's lifecycle state while bootstrap runs.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in the `Joining` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> ProcessState {
        ProcessState::from_byte(self.0.load(Ordering::Acquire)).unwrap_or_default()
    }

    fn set(&self, state: ProcessState) {
        self.0.store(state.as_byte(), Ordering::Release);
    }
}

/// Result of a successful bootstrap.
#[derive(Debug)]
pub struct Initialized {
    config: Config,
    info: ProcessInfo,
    negotiation: Negotiation,
    strategy: CommandStrategy,
    affinity: AffinityOutcome,
    world: Communicator,
    self_only: Communicator,
    exchange: BTreeMap<ProcessIdentity, ExchangeRecord>,
    framework: Mutex<ComponentFramework>,
}

impl Initialized {
    /// Thread level the runtime provides.
    #[must_use]
    pub const fn provided(&self) -> ThreadLevel {
        self.negotiation.provided
    }

    /// This process.
    #[must_use]
    pub const fn identity(&self) -> ProcessIdentity {
        self.info.identity()
    }

    /// Full thread-level negotiation.
    #[must_use]
    pub const fn negotiation(&self) -> &Negotiation {
        &self.negotiation
    }

    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Facts established by the environment join.
    #[must_use]
    pub const fn info(&self) -> &ProcessInfo {
        &self.info
    }

    /// Registry command strategy used during bootstrap.
    #[must_use]
    pub const fn strategy(&self) -> CommandStrategy {
        self.strategy
    }

    /// Outcome of the affinity request.
    #[must_use]
    pub const fn affinity(&self) -> &AffinityOutcome {
        &self.affinity
    }

    /// Communicator spanning the whole job.
    #[must_use]
    pub const fn world(&self) -> &Communicator {
        &self.world
    }

    /// Communicator holding only this process.
    #[must_use]
    pub const fn self_only(&self) -> &Communicator {
        &self.self_only
    }

    /// Attributes fetched from every peer.
    #[must_use]
    pub const fn exchange(&self) -> &BTreeMap<ProcessIdentity, ExchangeRecord> {
        &self.exchange
    }

    /// Component framework holding the committed selections.
    #[must_use]
    pub const fn framework(&self) -> &Mutex<ComponentFramework> {
        &self.framework
    }

    /// Winner sets of every category selected so far, in category order.
    #[must_use]
    pub fn selections(&self) -> Vec<WinnerSet> {
        self.framework
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .selections()
    }
}

/// Runs bootstrap once against `collaborators`.
///
/// `threads` receives the negotiated thread level and `state` mirrors the
/// lifecycle state as markers are issued. On failure the reporter and the
/// help channel are told exactly once and the error is returned.
///
/// # Errors
///
/// Returns [`BootstrapError::Stage`] naming the first stage that failed.
pub fn bootstrap_with(
    collaborators: &Collaborators,
    args: &[OsString],
    requested: ThreadLevel,
    threads: &ThreadLevelCell,
    state: &StateCell,
) -> Result<Initialized, BootstrapError> {
    let reporter = collaborators.reporter.as_ref();
    reporter.bootstrap_starting(requested);
    match run(collaborators, args, requested, threads, state) {
        Ok(initialized) => {
            reporter.bootstrap_succeeded(&initialized);
            Ok(initialized)
        }
        Err(error) => {
            report_failure(collaborators.help.as_ref(), &error);
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn report_failure(help: &dyn HelpChannel, error: &BootstrapError) {
    if let BootstrapError::Stage { stage, source } = error {
        let code = source.code();
        help.show_help(
            HELP_TOPIC,
            INTERNAL_FAILURE,
            &[
                String::from("initialize"),
                stage.clone(),
                source.message().to_owned(),
                code.description().to_owned(),
                code.get().to_string(),
            ],
        );
    }
}

struct Railway<'a> {
    reporter: &'a dyn BootstrapReporter,
}

impl Railway<'_> {
    fn step<T, E>(&self, stage: &str, run: impl FnOnce() -> Result<T, E>) -> Result<T, BootstrapError>
    where
        StepError: From<E>,
    {
        self.reporter.stage_starting(stage);
        match run() {
            Ok(value) => {
                self.reporter.stage_completed(stage);
                Ok(value)
            }
            Err(error) => Err(BootstrapError::Stage {
                stage: stage.to_owned(),
                source: StepError::from(error),
            }),
        }
    }

    fn perform<T>(&self, stage: &str, run: impl FnOnce() -> T) -> T {
        self.reporter.stage_starting(stage);
        let value = run();
        self.reporter.stage_completed(stage);
        value
    }

    fn subsystems(
        &self,
        hooks: &SubsystemHooks,
        subsystems: &[LocalSubsystem],
        info: &ProcessInfo,
    ) -> Result<(), BootstrapError> {
        for subsystem in subsystems {
            self.step(&subsystem.to_string(), || hooks.run(*subsystem, info))?;
        }
        Ok(())
    }
}

fn run(
    collaborators: &Collaborators,
    args: &[OsString],
    requested: ThreadLevel,
    threads: &ThreadLevelCell,
    state: &StateCell,
) -> Result<Initialized, BootstrapError> {
    let railway = Railway {
        reporter: collaborators.reporter.as_ref(),
    };
    let hooks = &collaborators.subsystems;
    let progress = collaborators.progress.as_ref();
    let oob = collaborators.oob.as_ref();

    let config = railway.step("configuration", || collaborators.config_loader.load(args))?;
    railway.step("telemetry", || telemetry::initialise(&config))?;
    let info = railway.step("environment-join", || join_environment(collaborators.environment.as_ref()))?;
    let identity = info.identity();

    let strategy = railway.perform("command-window", || {
        CommandStrategy::choose(info.role(), config.debug_trace())
    });
    let session = RegistrySession::open(Arc::clone(&collaborators.registry), strategy);
    let mut join = JoinProtocol::new(identity, session);
    railway.step("registry-join", || join.register(info.nodename()))?;
    let policy = railway.step("register-params", || resolve_wait_policy(&config))?;
    let affinity = railway.perform("processor-affinity", || {
        affinity::apply(
            config.affinity(),
            identity.rank(),
            collaborators.affinity.as_ref(),
            collaborators.help.as_ref(),
        )
    });
    railway.subsystems(hooks, &EARLY_SUBSYSTEMS, &info)?;

    let mut framework =
        ComponentFramework::new(collaborators.catalog.clone(), collaborators.policy.clone());
    let eager = framework.policy().eager_categories();
    for category in &eager {
        railway.step(&format!("open:{category}"), || framework.open(*category))?;
    }
    let deferred = framework.policy().deferred_categories();
    for category in deferred {
        railway.step(&format!("defer:{category}"), || framework.defer(category))?;
    }

    let mut exchange = railway.perform("exchange-init", || ExchangeStore::new(identity));
    let negotiation = railway.step("thread-level", || {
        threads.commit(negotiate(requested, collaborators.capability))
    })?;
    let hints = SelectionHints::default()
        .with_progress_threads(collaborators.capability.progress_threads())
        .with_concurrent_callers(negotiation.multiple);
    for category in &eager {
        railway.step(&format!("select:{category}"), || framework.select(*category, &hints))?;
    }

    railway.subsystems(hooks, &HANDLE_SUBSYSTEMS, &info)?;
    let (mut world, mut self_only) = railway.step("communicators", || {
        hooks.run(LocalSubsystem::Communicators, &info)?;
        Ok::<_, StepError>((
            Communicator::new(CommunicatorKind::World, info.world()),
            Communicator::new(CommunicatorKind::SelfOnly, vec![identity]),
        ))
    })?;
    railway.subsystems(hooks, &LATE_SUBSYSTEMS, &info)?;

    railway.step("exchange-publish", || {
        publish_contacts(&framework, &mut exchange, join.session_mut())
    })?;
    railway.step("store-process-info", || {
        store_process_info(&info, join.session_mut())
    })?;
    railway.step("stage1-marker", || advance(&mut join, state, ProcessState::AtStage1))?;
    railway.step("command-flush", || join.flush())?;
    railway.step("stage1-barrier", || {
        barrier::synchronise(oob, BarrierGate::Stage1, progress, policy)
    })?;

    let transport = railway.step("transport-enable", || {
        framework
            .with_winner_mut(Category::Transport, |transport| {
                transport
                    .enable(true)
                    .map(|()| transport.metadata().name().to_owned())
            })
            .and_then(std::convert::identity)
    })?;
    world.set_transport(transport.clone());
    self_only.set_transport(transport);
    let peers = world.members().to_vec();
    let records = railway.step("exchange-fetch", || {
        exchange.fetch_all(collaborators.registry.as_ref(), &peers, &[], policy, progress)
    })?;
    railway.step("transport-add-procs", || {
        framework
            .with_winner_mut(Category::Transport, |transport| transport.add_procs(&peers))
            .and_then(std::convert::identity)
    })?;
    railway.step("collective-select:world", || {
        select_collectives(&framework, &hints, &mut world)
    })?;
    railway.step("collective-select:self", || {
        select_collectives(&framework, &hints, &mut self_only)
    })?;

    railway.step("show-params", || show_params(&config, &info, collaborators.help.as_ref()))?;
    railway.step("stage2-marker", || advance(&mut join, state, ProcessState::AtStage2))?;
    railway.perform("progress-poll", || {
        if !collaborators.capability.progress_threads() {
            progress.poll();
        }
    });
    railway.step("stage2-barrier", || {
        barrier::synchronise(oob, BarrierGate::Stage2, progress, policy)
    })?;
    railway.step("dynamic-processes", || {
        if let Some(parent) = info.parent() {
            debug!(target: TARGET, %parent, "connecting to spawning job");
        }
        hooks.run(LocalSubsystem::DynamicProcesses, &info)
    })?;
    railway.perform("progress-steady", || progress.set_mode(ProgressMode::Steady));
    railway.step("running-marker", || advance(&mut join, state, ProcessState::Running))?;

    if config.debug_trace() {
        debug!(target: TARGET, %identity, provided = %negotiation.provided, "bootstrap completed");
    }

    Ok(Initialized {
        config,
        info,
        negotiation,
        strategy,
        affinity,
        world,
        self_only,
        exchange: records,
        framework: Mutex::new(framework),
    })
}

fn join_environment(environment: &dyn Environment) -> Result<ProcessInfo, EnvironmentError> {
    let info = environment.join()?;
    environment::validate(&info)?;
    Ok(info)
}

fn resolve_wait_policy(config: &Config) -> Result<WaitPolicy, StepError> {
    if config.poll_interval_ms == 0 {
        return Err(StepError::new(
            ErrorClass::Usage,
            ErrorCode::BAD_PARAM,
            "poll_interval_ms must be greater than zero",
        ));
    }
    Ok(config.wait_policy())
}

fn advance(join: &mut JoinProtocol, state: &StateCell, next: ProcessState) -> Result<(), JoinError> {
    join.mark(next)?;
    state.set(next);
    Ok(())
}

fn publish_contacts(
    framework: &ComponentFramework,
    exchange: &mut ExchangeStore,
    session: &mut RegistrySession,
) -> Result<usize, StepError> {
    let attributes = framework.with_winner(Category::Transport, |transport| {
        transport.contact_attributes()
    })?;
    for (key, value) in attributes {
        exchange.publish(key.as_str(), value)?;
    }
    Ok(exchange.distribute(session)?)
}

fn store_process_info(info: &ProcessInfo, session: &mut RegistrySession) -> Result<(), StepError> {
    let encoded = serde_json::to_vec(info)
        .map_err(|error| StepError::wrap(ErrorClass::LocalSubsystem, ErrorCode::ERROR, error))?;
    session
        .put(RegistryOp::put(info.identity(), PROCESS_INFO_KEY, encoded))
        .map_err(StepError::from)
}

fn select_collectives(
    framework: &ComponentFramework,
    hints: &SelectionHints,
    communicator: &mut Communicator,
) -> Result<(), StepError> {
    let scoped = hints.clone().with_communicator(communicator.scope());
    let winners = framework.select_for_communicator(Category::Collective, &scoped)?;
    communicator.set_collectives(winners.names().into_iter().map(str::to_owned).collect());
    Ok(())
}

fn show_params(config: &Config, info: &ProcessInfo, help: &dyn HelpChannel) -> Result<(), StepError> {
    if !config.show_all_params() {
        return Ok(());
    }
    let rendered = serde_json::to_string_pretty(config)
        .map_err(|error| StepError::wrap(ErrorClass::LocalSubsystem, ErrorCode::ERROR, error))?;
    help.show_help(
        HELP_TOPIC,
        SHOW_PARAMS,
        &[info.identity().rank().to_string(), rendered],
    );
    Ok(())
}
