//! Runtime join protocol.
//!
//! Owns the registry session for one bootstrap and the process's local
//! lifecycle state. Every state marker is issued through the session, so it
//! lands in the compound command while the window is open and goes straight
//! to the registry afterwards.

use cohort_types::{ProcessIdentity, ProcessState, StateRegression};
use thiserror::Error;
use tracing::debug;

use crate::registry::{NODE_KEY, RegistryError, RegistryOp, RegistrySession, STATE_KEY};

const TARGET: &str = "cohort_runtime::join";

/// Errors raised by the join protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The registry rejected a write or a flush.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A state marker would move the process backwards.
    #[error(transparent)]
    Regression(#[from] StateRegression),
}

/// Join state for one process.
#[derive(Debug)]
pub struct JoinProtocol {
    identity: ProcessIdentity,
    session: RegistrySession,
    state: ProcessState,
}

impl JoinProtocol {
    /// Starts the protocol for `identity` over `session`.
    #[must_use]
    pub const fn new(identity: ProcessIdentity, session: RegistrySession) -> Self {
        Self {
            identity,
            session,
            state: ProcessState::Joining,
        }
    }

    /// Registers the process and the node it runs on.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Registry`] when a direct write fails.
    pub fn register(&mut self, nodename: &str) -> Result<(), JoinError> {
        self.session
            .put(RegistryOp::put(self.identity, NODE_KEY, nodename.as_bytes()))?;
        self.session.put(RegistryOp::put(
            self.identity,
            STATE_KEY,
            vec![self.state.as_byte()],
        ))?;
        debug!(target: TARGET, identity = %self.identity, nodename, "process registered");
        Ok(())
    }

    /// Advances the local state and publishes the marker.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Regression`] when `state` precedes the current
    /// state, or [`JoinError::Registry`] when a direct write fails. The local
    /// state is left unchanged on error.
    pub fn mark(&mut self, state: ProcessState) -> Result<(), JoinError> {
        let next = self.state.advance_to(state)?;
        self.session
            .put(RegistryOp::put(self.identity, STATE_KEY, vec![next.as_byte()]))?;
        self.state = next;
        debug!(target: TARGET, identity = %self.identity, state = %next, "state marker issued");
        Ok(())
    }

    /// Flushes the compound command, if one is open.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Registry`] carrying [`RegistryError::Flush`] when
    /// the batch fails.
    pub fn flush(&mut self) -> Result<usize, JoinError> {
        Ok(self.session.flush()?)
    }

    /// Mutable access to the session, for other writers such as the
    /// exchange store.
    pub fn session_mut(&mut self) -> &mut RegistrySession {
        &mut self.session
    }

    /// Current local state.
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Identity of the joining process.
    #[must_use]
    pub const fn identity(&self) -> ProcessIdentity {
        self.identity
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cohort_types::{JobId, Rank};
    use rstest::rstest;

    use super::*;
    use crate::registry::CommandStrategy;
    use crate::sim::{RegistryEvent, SimCluster};

    fn protocol(cluster: &SimCluster, strategy: CommandStrategy) -> JoinProtocol {
        let identity = ProcessIdentity::new(cluster.job(), Rank::new(0));
        JoinProtocol::new(identity, RegistrySession::open(cluster.registry(), strategy))
    }

    #[rstest]
    fn markers_stay_buffered_until_flush() {
        let cluster = SimCluster::new(JobId::new(2), 2);
        let mut join = protocol(&cluster, CommandStrategy::Compound);
        join.register("node-a").expect("register");
        join.mark(ProcessState::AtStage1).expect("mark");
        assert_eq!(cluster.state_of(join.identity()), None);

        assert_eq!(join.flush().expect("flush"), 3);
        assert_eq!(cluster.state_of(join.identity()), Some(ProcessState::AtStage1));
        assert_eq!(
            cluster.value(join.identity(), NODE_KEY),
            Some(b"node-a".to_vec())
        );
    }

    #[rstest]
    fn direct_markers_land_immediately() {
        let cluster = SimCluster::new(JobId::new(2), 1);
        let mut join = protocol(&cluster, CommandStrategy::Direct);
        join.mark(ProcessState::AtStage1).expect("mark");
        assert_eq!(cluster.state_of(join.identity()), Some(ProcessState::AtStage1));
        assert!(cluster
            .events()
            .iter()
            .all(|event| !matches!(event, RegistryEvent::Batch { .. })));
    }

    #[rstest]
    fn regressions_are_rejected_without_writing() {
        let cluster = SimCluster::new(JobId::new(2), 1);
        let mut join = protocol(&cluster, CommandStrategy::Direct);
        join.mark(ProcessState::AtStage2).expect("mark");
        let error = join
            .mark(ProcessState::AtStage1)
            .expect_err("regression must fail");
        assert!(matches!(error, JoinError::Regression(_)));
        assert_eq!(join.state(), ProcessState::AtStage2);
        assert_eq!(cluster.state_of(join.identity()), Some(ProcessState::AtStage2));
    }

    #[rstest]
    fn flush_failure_is_a_registry_error() {
        let cluster = SimCluster::new(JobId::new(2), 2);
        cluster.fail_batches("link reset");
        let registry: Arc<dyn crate::registry::RegistryClient> = cluster.registry();
        let identity = ProcessIdentity::new(cluster.job(), Rank::new(1));
        let mut join =
            JoinProtocol::new(identity, RegistrySession::open(registry, CommandStrategy::Compound));
        join.mark(ProcessState::AtStage1).expect("buffered mark");
        let error = join.flush().expect_err("flush must fail");
        assert!(matches!(
            error,
            JoinError::Registry(RegistryError::Flush { operations: 1, .. })
        ));
    }
}
