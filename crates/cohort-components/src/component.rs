//! Component contract, identity metadata, and selection inputs.

use cohort_types::ProcessIdentity;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::ComponentError;

/// Identity fields shared by every component.
///
/// # Example
///
/// ```
/// use cohort_components::{Category, ComponentMetadata};
///
/// let meta = ComponentMetadata::new("shared-memory", "2.1.0", Category::Transport);
/// assert_eq!(meta.name(), "shared-memory");
/// assert_eq!(meta.category(), Category::Transport);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentMetadata {
    name: String,
    version: String,
    category: Category,
}

impl ComponentMetadata {
    /// Creates a new metadata bundle.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            category,
        }
    }

    /// Returns the component name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the component version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the category the component belongs to.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Validates the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Descriptor`] when the name or version is blank.
    pub fn validate(&self) -> Result<(), ComponentError> {
        if self.name.trim().is_empty() {
            return Err(ComponentError::Descriptor {
                message: format!("{} component name must not be empty", self.category),
            });
        }
        if self.version.trim().is_empty() {
            return Err(ComponentError::Descriptor {
                message: format!("component '{}' must declare a version", self.name),
            });
        }
        Ok(())
    }
}

/// Self-reported selection priority. Higher wins.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(u32);

impl Priority {
    /// Wraps a raw priority value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw priority value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Communicator a per-communicator selection is made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicatorScope {
    label: String,
    size: usize,
}

impl CommunicatorScope {
    /// Describes a communicator by label and member count.
    #[must_use]
    pub fn new(label: impl Into<String>, size: usize) -> Self {
        Self {
            label: label.into(),
            size,
        }
    }

    /// Communicator label, such as `world` or `self`.
    #[must_use]
    pub const fn label(&self) -> &str {
        self.label.as_str()
    }

    /// Number of member processes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

/// Inputs a component may consult when reporting its priority.
///
/// # Example
///
/// ```
/// use cohort_components::{CommunicatorScope, SelectionHints};
///
/// let hints = SelectionHints::default()
///     .with_progress_threads(true)
///     .with_communicator(CommunicatorScope::new("self", 1));
/// assert!(hints.progress_threads());
/// assert_eq!(hints.communicator().map(|c| c.size()), Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionHints {
    progress_threads: bool,
    concurrent_callers: bool,
    communicator: Option<CommunicatorScope>,
}

impl SelectionHints {
    /// Records whether dedicated progress threads are available.
    #[must_use]
    pub const fn with_progress_threads(mut self, enabled: bool) -> Self {
        self.progress_threads = enabled;
        self
    }

    /// Records whether concurrent API callers are expected.
    #[must_use]
    pub const fn with_concurrent_callers(mut self, enabled: bool) -> Self {
        self.concurrent_callers = enabled;
        self
    }

    /// Scopes the hints to a particular communicator.
    #[must_use]
    pub fn with_communicator(mut self, scope: CommunicatorScope) -> Self {
        self.communicator = Some(scope);
        self
    }

    /// Whether dedicated progress threads are available.
    #[must_use]
    pub const fn progress_threads(&self) -> bool {
        self.progress_threads
    }

    /// Whether concurrent API callers are expected.
    #[must_use]
    pub const fn concurrent_callers(&self) -> bool {
        self.concurrent_callers
    }

    /// Communicator the selection is scoped to, if any.
    #[must_use]
    pub const fn communicator(&self) -> Option<&CommunicatorScope> {
        self.communicator.as_ref()
    }
}

/// Named attribute a component publishes for its peers, such as a transport
/// contact address.
pub type ContactAttribute = (String, Vec<u8>);

/// Lifecycle contract implemented by every pluggable component.
///
/// Construction (the *open* operation) is performed by the descriptor's
/// factory. The remaining hooks default to no-ops so simple components only
/// implement [`Component::metadata`] and [`Component::query`].
pub trait Component: Send {
    /// Identity of this component.
    fn metadata(&self) -> &ComponentMetadata;

    /// Reports a priority for the given hints, or `None` to decline.
    fn query(&self, hints: &SelectionHints) -> Option<Priority>;

    /// Switches the component into (or out of) its operational mode.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Operation`] when the component cannot
    /// change mode.
    fn enable(&mut self, enabled: bool) -> Result<(), ComponentError> {
        let _ = enabled;
        Ok(())
    }

    /// Makes the given peers reachable through this component.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Operation`] when a peer cannot be added.
    fn add_procs(&mut self, peers: &[ProcessIdentity]) -> Result<(), ComponentError> {
        let _ = peers;
        Ok(())
    }

    /// Attributes this component publishes to its peers during bootstrap.
    fn contact_attributes(&self) -> Vec<ContactAttribute> {
        Vec::new()
    }

    /// Releases resources held by the component.
    fn close(&mut self) {}
}
