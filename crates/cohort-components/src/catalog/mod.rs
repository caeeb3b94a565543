//! Catalog of component descriptors.
//!
//! The [`ComponentCatalog`] is the explicit replacement for build-time
//! component discovery: every candidate is registered up front as a
//! [`ComponentDescriptor`] pairing metadata with a factory. Registration
//! order is preserved per category because it breaks selection ties.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::category::Category;
use crate::component::{Component, ComponentMetadata};
use crate::error::ComponentError;

/// Constructs a component instance. This is the component's *open* hook.
pub type ComponentFactory =
    Arc<dyn Fn() -> Result<Box<dyn Component>, ComponentError> + Send + Sync>;

/// Metadata plus factory for a single candidate component.
#[derive(Clone)]
pub struct ComponentDescriptor {
    metadata: ComponentMetadata,
    factory: ComponentFactory,
}

impl ComponentDescriptor {
    /// Creates a descriptor from metadata and a factory closure.
    #[must_use]
    pub fn new<F>(metadata: ComponentMetadata, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Component>, ComponentError> + Send + Sync + 'static,
    {
        Self {
            metadata,
            factory: Arc::new(factory),
        }
    }

    /// Returns the descriptor metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    /// Returns the component name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Returns the component category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.metadata.category()
    }

    /// Invokes the factory.
    ///
    /// # Errors
    ///
    /// Propagates whatever the factory returns.
    pub fn instantiate(&self) -> Result<Box<dyn Component>, ComponentError> {
        (self.factory)()
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Registry of candidate components grouped by category.
///
/// # Example
///
/// ```
/// use cohort_components::{
///     Category, Component, ComponentCatalog, ComponentDescriptor, ComponentError,
///     ComponentMetadata,
/// };
///
/// let mut catalog = ComponentCatalog::new();
/// let meta = ComponentMetadata::new("romio", "1.0.0", Category::Io);
/// catalog
///     .register(ComponentDescriptor::new(meta, || {
///         Err(ComponentError::unavailable("romio", "no parallel filesystem"))
///     }))
///     .expect("registration succeeds");
/// assert!(catalog.get(Category::Io, "romio").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    descriptors: BTreeMap<Category, Vec<ComponentDescriptor>>,
}

impl ComponentCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor after validation.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Descriptor`] if validation fails or if a
    /// component with the same name is already registered in the category.
    pub fn register(&mut self, descriptor: ComponentDescriptor) -> Result<(), ComponentError> {
        descriptor.metadata().validate()?;
        let category = descriptor.category();
        if self.get(category, descriptor.name()).is_some() {
            return Err(ComponentError::Descriptor {
                message: format!(
                    "{category} component '{}' is already registered",
                    descriptor.name()
                ),
            });
        }
        self.descriptors
            .entry(category)
            .or_default()
            .push(descriptor);
        Ok(())
    }

    /// Looks up a descriptor by category and name.
    #[must_use]
    pub fn get(&self, category: Category, name: &str) -> Option<&ComponentDescriptor> {
        self.descriptors
            .get(&category)?
            .iter()
            .find(|descriptor| descriptor.name() == name)
    }

    /// Returns every descriptor in `category`, in registration order.
    #[must_use]
    pub fn for_category(&self, category: Category) -> &[ComponentDescriptor] {
        self.descriptors
            .get(&category)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.values().map(Vec::len).sum()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;
