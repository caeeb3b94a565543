//! In-process simulation of the registry and out-of-band layer.
//!
//! A [`SimCluster`] stands in for the distributed registry service of one
//! job. Its coordinator watches `state` writes and releases a barrier gate
//! once every member has published the matching stage marker. The
//! [`LoopbackOob`] channel blocks callers until that release is observed.
//! Threads playing the role of processes share one cluster.

mod components;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use cohort_components::{ComponentError, FrameworkPolicy};
use cohort_config::WaitPolicy;
use cohort_types::{JobId, ProcessIdentity, ProcessState, Rank};
use tracing::debug;

use crate::affinity::SchedAffinity;
use crate::bootstrap::ConfigLoader;
use crate::environment::{Environment, EnvironmentError, ProcessInfo, ProcessRole};
use crate::health::StructuredBootstrapReporter;
use crate::help::StderrHelpChannel;
use crate::oob::{BarrierGate, Delivery, OobChannel, OobError};
use crate::progress::{CooperativeProgress, ProgressEngine};
use crate::registry::{RegistryClient, RegistryError, RegistryOp, STATE_KEY};
use crate::sequencer::Collaborators;
use crate::subsystems::SubsystemHooks;
use crate::threading::ThreadCapability;

pub use components::{SimComponent, standard_catalog, unavailable};

const TARGET: &str = "cohort_runtime::sim";

/// Observable registry activity, in the order the coordinator saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A process published a lifecycle state.
    StateWritten {
        /// Publishing process.
        identity: ProcessIdentity,
        /// State written.
        state: ProcessState,
    },
    /// A compound command arrived.
    Batch {
        /// Processes whose operations the batch carried.
        identities: Vec<ProcessIdentity>,
        /// Number of operations.
        operations: usize,
    },
    /// The coordinator released a barrier gate.
    Released {
        /// Gate released.
        gate: BarrierGate,
    },
}

#[derive(Debug, Default)]
struct Ledger {
    values: BTreeMap<(ProcessIdentity, String), Vec<u8>>,
    arrivals: BTreeMap<BarrierGate, BTreeSet<ProcessIdentity>>,
    released: BTreeSet<BarrierGate>,
    events: Vec<RegistryEvent>,
    batches: BTreeMap<ProcessIdentity, usize>,
    fail_batches: Option<String>,
}

impl Ledger {
    fn apply(&mut self, op: &RegistryOp, size: usize) {
        self.values
            .insert((op.identity(), op.key().to_owned()), op.value().to_vec());
        if op.key() != STATE_KEY {
            return;
        }
        let Some(state) = op.value().first().copied().and_then(ProcessState::from_byte) else {
            return;
        };
        self.events.push(RegistryEvent::StateWritten {
            identity: op.identity(),
            state,
        });
        if let Some(gate) = BarrierGate::for_state(state) {
            let arrived = self.arrivals.entry(gate).or_default();
            arrived.insert(op.identity());
            if arrived.len() == size {
                self.release(gate);
            }
        }
    }

    fn release(&mut self, gate: BarrierGate) {
        if self.released.insert(gate) {
            debug!(target: TARGET, %gate, "coordinator released gate");
            self.events.push(RegistryEvent::Released { gate });
        }
    }
}

#[derive(Debug)]
struct Shared {
    job: JobId,
    size: u32,
    ledger: Mutex<Ledger>,
    changed: Condvar,
}

impl Shared {
    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>, RegistryError> {
        self.ledger.lock().map_err(|_| RegistryError::Unavailable {
            message: String::from("simulated registry lock poisoned"),
        })
    }

    fn member_count(&self) -> usize {
        usize::try_from(self.size).unwrap_or(usize::MAX)
    }

    fn wait_released(&self, gate: BarrierGate, slice: Duration) -> Result<bool, OobError> {
        let poisoned = |_| OobError::Disconnected {
            message: String::from("simulated registry lock poisoned"),
        };
        let guard = self.ledger.lock().map_err(poisoned)?;
        if guard.released.contains(&gate) {
            return Ok(true);
        }
        let (guard, _) = self
            .changed
            .wait_timeout(guard, slice)
            .map_err(|_| OobError::Disconnected {
                message: String::from("simulated registry lock poisoned"),
            })?;
        Ok(guard.released.contains(&gate))
    }
}

/// Simulated registry service for one job.
///
/// # Example
///
/// ```
/// use cohort_runtime::sim::SimCluster;
/// use cohort_types::JobId;
///
/// let cluster = SimCluster::new(JobId::new(1), 4);
/// assert_eq!(cluster.members().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SimCluster {
    shared: Arc<Shared>,
}

impl SimCluster {
    /// Creates a cluster expecting `size` processes.
    #[must_use]
    pub fn new(job: JobId, size: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                job,
                size,
                ledger: Mutex::new(Ledger::default()),
                changed: Condvar::new(),
            }),
        }
    }

    /// Job simulated by the cluster.
    #[must_use]
    pub fn job(&self) -> JobId {
        self.shared.job
    }

    /// Every member identity in rank order.
    #[must_use]
    pub fn members(&self) -> Vec<ProcessIdentity> {
        ProcessIdentity::job_members(self.shared.job, self.shared.size)
    }

    /// Registry client bound to this cluster.
    #[must_use]
    pub fn registry(&self) -> Arc<InMemoryRegistry> {
        Arc::new(InMemoryRegistry {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Out-of-band channel bound to this cluster.
    #[must_use]
    pub fn oob(&self) -> Arc<LoopbackOob> {
        Arc::new(LoopbackOob {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Environment describing member `rank`.
    #[must_use]
    pub fn environment(&self, rank: u32) -> SimEnvironment {
        let identity = ProcessIdentity::new(self.shared.job, Rank::new(rank));
        let role = ProcessRole::new(false, self.shared.size == 1);
        SimEnvironment::new(ProcessInfo::new(identity, self.shared.size, role, "localhost"))
    }

    /// Collaborators for member `rank`, wired to this cluster with the
    /// standard catalog and default policies.
    ///
    /// # Errors
    ///
    /// Returns a [`ComponentError`] when the standard catalog cannot be
    /// built.
    pub fn collaborators(
        &self,
        rank: u32,
        config_loader: Arc<dyn ConfigLoader>,
    ) -> Result<Collaborators, ComponentError> {
        let environment = self.environment(rank);
        let identity = ProcessIdentity::new(self.shared.job, Rank::new(rank));
        Ok(Collaborators {
            config_loader,
            environment: Arc::new(environment),
            registry: self.registry(),
            oob: self.oob(),
            affinity: Arc::new(SchedAffinity),
            progress: Arc::new(CooperativeProgress::new()),
            help: Arc::new(StderrHelpChannel),
            reporter: Arc::new(StructuredBootstrapReporter::new()),
            catalog: standard_catalog(identity)?,
            policy: FrameworkPolicy::default(),
            subsystems: SubsystemHooks::default(),
            capability: ThreadCapability::compiled(),
        })
    }

    /// Makes every subsequent batch fail with `message`.
    pub fn fail_batches(&self, message: impl Into<String>) {
        if let Ok(mut ledger) = self.shared.ledger() {
            ledger.fail_batches = Some(message.into());
        }
    }

    /// Registry activity observed so far.
    #[must_use]
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.shared
            .ledger()
            .map(|ledger| ledger.events.clone())
            .unwrap_or_default()
    }

    /// Number of batches that carried operations for `identity`.
    #[must_use]
    pub fn batches_for(&self, identity: ProcessIdentity) -> usize {
        self.shared
            .ledger()
            .ok()
            .and_then(|ledger| ledger.batches.get(&identity).copied())
            .unwrap_or(0)
    }

    /// Latest state published by `identity`.
    #[must_use]
    pub fn state_of(&self, identity: ProcessIdentity) -> Option<ProcessState> {
        self.value(identity, STATE_KEY)
            .and_then(|value| value.first().copied())
            .and_then(ProcessState::from_byte)
    }

    /// Raw value stored for `identity` under `key`.
    #[must_use]
    pub fn value(&self, identity: ProcessIdentity, key: &str) -> Option<Vec<u8>> {
        self.shared
            .ledger()
            .ok()
            .and_then(|ledger| ledger.values.get(&(identity, key.to_owned())).cloned())
    }
}

/// Registry client backed by a [`SimCluster`].
#[derive(Debug)]
pub struct InMemoryRegistry {
    shared: Arc<Shared>,
}

impl RegistryClient for InMemoryRegistry {
    fn write(&self, identity: ProcessIdentity, key: &str, value: &[u8]) -> Result<(), RegistryError> {
        let size = self.shared.member_count();
        let mut ledger = self.shared.ledger()?;
        ledger.apply(&RegistryOp::put(identity, key, value), size);
        drop(ledger);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn read(&self, identity: ProcessIdentity, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        let ledger = self.shared.ledger()?;
        Ok(ledger.values.get(&(identity, key.to_owned())).cloned())
    }

    fn batch(&self, ops: &[RegistryOp]) -> Result<(), RegistryError> {
        let size = self.shared.member_count();
        let mut ledger = self.shared.ledger()?;
        if let Some(message) = ledger.fail_batches.clone() {
            return Err(RegistryError::Unavailable { message });
        }
        let identities: Vec<ProcessIdentity> = ops
            .iter()
            .map(RegistryOp::identity)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for identity in &identities {
            *ledger.batches.entry(*identity).or_default() += 1;
        }
        ledger.events.push(RegistryEvent::Batch {
            identities,
            operations: ops.len(),
        });
        for op in ops {
            ledger.apply(op, size);
        }
        drop(ledger);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn notify_all(&self, gate: BarrierGate) -> Result<(), RegistryError> {
        self.shared.ledger()?.release(gate);
        self.shared.changed.notify_all();
        Ok(())
    }
}

/// Out-of-band channel that waits for the cluster coordinator.
#[derive(Debug)]
pub struct LoopbackOob {
    shared: Arc<Shared>,
}

impl OobChannel for LoopbackOob {
    fn xcast(
        &self,
        gate: BarrierGate,
        payload: &[u8],
        delivery: &mut Delivery<'_>,
        progress: &dyn ProgressEngine,
        policy: WaitPolicy,
    ) -> Result<(), OobError> {
        debug!(target: TARGET, %gate, payload = payload.len(), "joined broadcast");
        let started = Instant::now();
        loop {
            if self.shared.wait_released(gate, policy.poll_interval())? {
                delivery(gate, &[]);
                return Ok(());
            }
            if policy.expired(started) {
                return Err(OobError::Timeout {
                    gate,
                    waited: started.elapsed(),
                });
            }
            progress.poll();
        }
    }
}

/// Environment returning a fixed process description.
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    info: ProcessInfo,
}

impl SimEnvironment {
    /// Wraps `info`.
    #[must_use]
    pub const fn new(info: ProcessInfo) -> Self {
        Self { info }
    }
}

impl Environment for SimEnvironment {
    fn join(&self) -> Result<ProcessInfo, EnvironmentError> {
        Ok(self.info.clone())
    }
}

#[cfg(test)]
mod tests;
