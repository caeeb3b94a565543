//! Default communicators built during bootstrap.

use cohort_components::CommunicatorScope;
use cohort_types::ProcessIdentity;
use strum::Display;

/// The two communicators every process starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CommunicatorKind {
    /// Every process of the job.
    World,
    /// Only the calling process.
    #[strum(serialize = "self")]
    SelfOnly,
}

/// A communicator with its resolved transport and collectives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Communicator {
    kind: CommunicatorKind,
    members: Vec<ProcessIdentity>,
    transport: Option<String>,
    collectives: Vec<String>,
}

impl Communicator {
    /// Creates a communicator with no modules resolved yet.
    #[must_use]
    pub const fn new(kind: CommunicatorKind, members: Vec<ProcessIdentity>) -> Self {
        Self {
            kind,
            members,
            transport: None,
            collectives: Vec::new(),
        }
    }

    /// Which default communicator this is.
    #[must_use]
    pub const fn kind(&self) -> CommunicatorKind {
        self.kind
    }

    /// Members in rank order.
    #[must_use]
    pub fn members(&self) -> &[ProcessIdentity] {
        &self.members
    }

    /// Transport used for point-to-point traffic, once enabled.
    #[must_use]
    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    /// Collective modules in ranked order.
    #[must_use]
    pub fn collectives(&self) -> &[String] {
        &self.collectives
    }

    /// Selection scope describing this communicator.
    #[must_use]
    pub fn scope(&self) -> CommunicatorScope {
        CommunicatorScope::new(self.kind.to_string(), self.members.len())
    }

    pub(crate) fn set_transport(&mut self, name: impl Into<String>) {
        self.transport = Some(name.into());
    }

    pub(crate) fn set_collectives(&mut self, names: Vec<String>) {
        self.collectives = names;
    }
}

#[cfg(test)]
mod tests {
    use cohort_types::{JobId, Rank};

    use super::*;

    #[test]
    fn scope_reflects_label_and_size() {
        let members = ProcessIdentity::job_members(JobId::new(4), 3);
        let world = Communicator::new(CommunicatorKind::World, members);
        assert_eq!(world.scope(), CommunicatorScope::new("world", 3));

        let me = Communicator::new(
            CommunicatorKind::SelfOnly,
            vec![ProcessIdentity::new(JobId::new(4), Rank::new(1))],
        );
        assert_eq!(me.scope().label(), "self");
        assert_eq!(me.transport(), None);
    }
}
