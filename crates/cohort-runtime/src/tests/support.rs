//! Test harness utilities shared by the runtime suites.

use std::sync::{Arc, Mutex};
use std::thread;

use cohort_components::{Category, ComponentError, WinnerSet};
use cohort_config::Config;
use cohort_types::{JobId, ThreadLevel};

use crate::bootstrap::StaticConfigLoader;
use crate::error::{BootstrapError, InitStatus};
use crate::health::BootstrapReporter;
use crate::help::HelpChannel;
use crate::runtime::Runtime;
use crate::sequencer::{Collaborators, Initialized};
use crate::sim::SimCluster;
use crate::threading::{ThreadCapability, ThreadSupport};

/// Configuration with a short poll interval and a generous deadline so a
/// broken test fails instead of hanging.
pub fn test_config() -> Config {
    Config {
        poll_interval_ms: 1,
        wait_deadline_ms: Some(10_000),
        ..Config::default()
    }
}

/// Bootstrap events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedEvent {
    /// Bootstrap started.
    Starting(ThreadLevel),
    /// A stage began.
    StageStarting(String),
    /// A stage finished.
    StageCompleted(String),
    /// Bootstrap completed.
    Succeeded,
    /// Bootstrap failed.
    Failed {
        /// Failing stage, when one ran.
        stage: Option<String>,
        /// Reported status.
        status: InitStatus,
    },
    /// A deferred category came up.
    Activated(Category),
    /// A deferred category failed to come up.
    ActivationFailed(Category),
}

/// Records bootstrap events for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportedEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<ReportedEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    /// Labels of every stage that started, in order.
    pub fn stages_started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportedEvent::StageStarting(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ReportedEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl BootstrapReporter for RecordingReporter {
    fn bootstrap_starting(&self, requested: ThreadLevel) {
        self.record(ReportedEvent::Starting(requested));
    }

    fn stage_starting(&self, stage: &str) {
        self.record(ReportedEvent::StageStarting(stage.to_owned()));
    }

    fn stage_completed(&self, stage: &str) {
        self.record(ReportedEvent::StageCompleted(stage.to_owned()));
    }

    fn bootstrap_succeeded(&self, _initialized: &Initialized) {
        self.record(ReportedEvent::Succeeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(ReportedEvent::Failed {
            stage: error.stage().map(str::to_owned),
            status: error.status(),
        });
    }

    fn category_activated(&self, winners: &WinnerSet) {
        self.record(ReportedEvent::Activated(winners.category()));
    }

    fn category_failed(&self, category: Category, _error: &ComponentError) {
        self.record(ReportedEvent::ActivationFailed(category));
    }
}

/// Help message captured by [`RecordingHelp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownHelp {
    /// Message key.
    pub key: String,
    /// Message arguments.
    pub args: Vec<String>,
}

/// Records help messages instead of printing them.
#[derive(Debug, Default)]
pub struct RecordingHelp {
    shown: Mutex<Vec<ShownHelp>>,
}

impl RecordingHelp {
    /// Captures a copy of the shown messages.
    pub fn shown(&self) -> Vec<ShownHelp> {
        self.shown.lock().expect("help mutex poisoned").clone()
    }

    /// Messages shown under `key`.
    pub fn with_key(&self, key: &str) -> Vec<ShownHelp> {
        self.shown()
            .into_iter()
            .filter(|message| message.key == key)
            .collect()
    }
}

impl HelpChannel for RecordingHelp {
    fn show_help(&self, _topic: &str, key: &str, args: &[String]) {
        self.shown
            .lock()
            .expect("help mutex poisoned")
            .push(ShownHelp {
                key: key.to_owned(),
                args: args.to_vec(),
            });
    }
}

/// One simulated process with recording collaborators.
pub struct Process {
    /// Runtime under test.
    pub runtime: Runtime,
    /// Reporter wired into the runtime.
    pub reporter: Arc<RecordingReporter>,
    /// Help channel wired into the runtime.
    pub help: Arc<RecordingHelp>,
}

impl Process {
    /// Builds member `rank` of `cluster`, letting `customise` adjust the
    /// collaborators before the runtime is created.
    pub fn new<F>(cluster: &SimCluster, rank: u32, config: Config, customise: F) -> Self
    where
        F: FnOnce(&mut Collaborators),
    {
        let reporter = Arc::new(RecordingReporter::default());
        let help = Arc::new(RecordingHelp::default());
        let mut collaborators = cluster
            .collaborators(rank, Arc::new(StaticConfigLoader::new(config)))
            .expect("standard catalog builds");
        collaborators.reporter = reporter.clone();
        collaborators.help = help.clone();
        collaborators.capability = ThreadCapability::new(ThreadSupport::Full, false);
        customise(&mut collaborators);
        Self {
            runtime: Runtime::new(collaborators),
            reporter,
            help,
        }
    }

    /// Initialises the process without start-up arguments.
    pub fn initialize(&self, requested: ThreadLevel) -> Result<ThreadLevel, BootstrapError> {
        self.runtime.initialize(&[], requested)
    }
}

/// Outcome of one process in a simulated job.
pub struct Outcome {
    /// The process after bootstrap.
    pub process: Process,
    /// Result of `initialize`.
    pub result: Result<ThreadLevel, BootstrapError>,
}

/// Bootstraps every member of a `size`-process job on its own thread.
pub fn run_job(size: u32, config: &Config) -> (SimCluster, Vec<Outcome>) {
    let cluster = SimCluster::new(JobId::new(7), size);
    let handles: Vec<_> = (0..size)
        .map(|rank| {
            let process = Process::new(&cluster, rank, config.clone(), |_| {});
            thread::spawn(move || {
                let result = process.initialize(ThreadLevel::Single);
                Outcome { process, result }
            })
        })
        .collect();
    let outcomes = handles
        .into_iter()
        .map(|handle| handle.join().expect("process thread panicked"))
        .collect();
    (cluster, outcomes)
}
