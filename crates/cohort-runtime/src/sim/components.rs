//! Simulated components populating every category.

use cohort_components::{
    Category, Component, ComponentCatalog, ComponentDescriptor, ComponentError, ComponentMetadata,
    ContactAttribute, Priority, SelectionHints,
};
use cohort_types::ProcessIdentity;

const VERSION: &str = "1.0.0";

/// Configurable stand-in for a real component.
#[derive(Debug, Clone)]
pub struct SimComponent {
    metadata: ComponentMetadata,
    priority: Option<u32>,
    min_members: usize,
    max_members: Option<usize>,
    contact: Option<ContactAttribute>,
    enabled: bool,
    enable_failure: Option<String>,
    peers: usize,
}

impl SimComponent {
    /// Creates a component that declines selection until given a priority.
    #[must_use]
    pub fn new(name: &str, category: Category) -> Self {
        Self {
            metadata: ComponentMetadata::new(name, VERSION, category),
            priority: None,
            min_members: 0,
            max_members: None,
            contact: None,
            enabled: false,
            enable_failure: None,
            peers: 0,
        }
    }

    /// Sets the priority reported during selection.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restricts per-communicator selection to communicators whose size is
    /// within the given bounds.
    #[must_use]
    pub const fn with_member_range(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_members = min;
        self.max_members = max;
        self
    }

    /// Publishes `value` under `key` to peers.
    #[must_use]
    pub fn with_contact(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.contact = Some((key.into(), value.into()));
        self
    }

    /// Makes `enable` fail with `reason`.
    #[must_use]
    pub fn failing_enable(mut self, reason: impl Into<String>) -> Self {
        self.enable_failure = Some(reason.into());
        self
    }

    /// Wraps the component in a descriptor whose factory clones it.
    #[must_use]
    pub fn descriptor(self) -> ComponentDescriptor {
        let metadata = self.metadata.clone();
        ComponentDescriptor::new(metadata, move || Ok(Box::new(self.clone())))
    }
}

impl Component for SimComponent {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn query(&self, hints: &SelectionHints) -> Option<Priority> {
        if let Some(scope) = hints.communicator() {
            let size = scope.size();
            if size < self.min_members || self.max_members.is_some_and(|max| size > max) {
                return None;
            }
        }
        self.priority.map(Priority::new)
    }

    fn enable(&mut self, enabled: bool) -> Result<(), ComponentError> {
        if let Some(reason) = &self.enable_failure {
            return Err(ComponentError::operation(self.metadata.name(), "enable", reason));
        }
        self.enabled = enabled;
        Ok(())
    }

    fn add_procs(&mut self, peers: &[ProcessIdentity]) -> Result<(), ComponentError> {
        if !self.enabled {
            return Err(ComponentError::operation(
                self.metadata.name(),
                "add_procs",
                "component has not been enabled",
            ));
        }
        self.peers += peers.len();
        Ok(())
    }

    fn contact_attributes(&self) -> Vec<ContactAttribute> {
        self.contact.iter().cloned().collect()
    }
}

/// Descriptor whose factory always reports the component as unavailable.
#[must_use]
pub fn unavailable(name: &str, category: Category, reason: &str) -> ComponentDescriptor {
    let label = name.to_owned();
    let reason = reason.to_owned();
    ComponentDescriptor::new(ComponentMetadata::new(name, VERSION, category), move || {
        Err(ComponentError::unavailable(label.clone(), reason.clone()))
    })
}

/// Catalog covering every category for the process `identity`.
///
/// # Errors
///
/// Returns a [`ComponentError`] if a descriptor fails registration.
pub fn standard_catalog(identity: ProcessIdentity) -> Result<ComponentCatalog, ComponentError> {
    let mut catalog = ComponentCatalog::new();
    let descriptors = [
        SimComponent::new("basic", Category::Allocator)
            .with_priority(10)
            .descriptor(),
        SimComponent::new("bucket", Category::Allocator)
            .with_priority(20)
            .descriptor(),
        SimComponent::new("vma", Category::RegistrationCache)
            .with_priority(10)
            .descriptor(),
        SimComponent::new("sm", Category::MemoryPool)
            .with_priority(20)
            .descriptor(),
        SimComponent::new("basic", Category::MemoryPool)
            .with_priority(10)
            .descriptor(),
        unavailable("ib", Category::Transport, "no InfiniBand adapters found"),
        SimComponent::new("tcp", Category::Transport)
            .with_priority(10)
            .with_contact("transport.tcp.address", format!("tcp://localhost/{identity}"))
            .descriptor(),
        SimComponent::new("loopback", Category::Transport)
            .with_priority(30)
            .with_contact(
                "transport.loopback.address",
                format!("loopback://{identity}"),
            )
            .descriptor(),
        SimComponent::new("basic", Category::Collective)
            .with_priority(10)
            .descriptor(),
        SimComponent::new("tuned", Category::Collective)
            .with_priority(30)
            .with_member_range(2, None)
            .descriptor(),
        SimComponent::new("self", Category::Collective)
            .with_priority(75)
            .with_member_range(1, Some(1))
            .descriptor(),
        SimComponent::new("romio", Category::Io)
            .with_priority(10)
            .descriptor(),
        SimComponent::new("unity", Category::Topology)
            .with_priority(10)
            .descriptor(),
    ];
    for descriptor in descriptors {
        catalog.register(descriptor)?;
    }
    Ok(catalog)
}
