//! Component framework for the Cohort bootstrap runtime.
//!
//! Every pluggable subsystem the bootstrap sequence touches (memory pools,
//! transports, collectives, I/O) is modelled as a [`Component`] belonging to
//! a [`Category`]. Components are declared in a [`ComponentCatalog`] through
//! [`ComponentDescriptor`] values and brought to life by the
//! [`ComponentFramework`] in two distinct phases:
//!
//! 1. **Open** constructs every registered candidate for a category.
//!    Candidates reporting themselves unavailable are dropped with a warning;
//!    any other construction failure aborts the open.
//! 2. **Select** asks each surviving candidate for a self-reported
//!    [`Priority`] and commits the winner(s) according to the category's
//!    [`SelectionPolicy`]. The highest priority wins; ties go to the
//!    candidate registered first.
//!
//! Categories whose [`Activation`] is deferred skip both phases during
//! bootstrap and are opened on first domain use through
//! [`ComponentFramework::ensure_available`].
//!
//! # Example
//!
//! ```
//! use cohort_components::{
//!     Category, Component, ComponentCatalog, ComponentDescriptor, ComponentFramework,
//!     ComponentMetadata, FrameworkPolicy, Priority, SelectionHints,
//! };
//!
//! struct Loopback(ComponentMetadata);
//!
//! impl Component for Loopback {
//!     fn metadata(&self) -> &ComponentMetadata {
//!         &self.0
//!     }
//!
//!     fn query(&self, _hints: &SelectionHints) -> Option<Priority> {
//!         Some(Priority::new(10))
//!     }
//! }
//!
//! let mut catalog = ComponentCatalog::new();
//! let metadata = ComponentMetadata::new("loopback", "1.0.0", Category::Transport);
//! catalog
//!     .register(ComponentDescriptor::new(metadata.clone(), move || {
//!         Ok(Box::new(Loopback(metadata.clone())))
//!     }))
//!     .expect("registration succeeds");
//!
//! let mut framework = ComponentFramework::new(catalog, FrameworkPolicy::default());
//! framework.open(Category::Transport).expect("open succeeds");
//! let winners = framework
//!     .select(Category::Transport, &SelectionHints::default())
//!     .expect("select succeeds");
//! assert_eq!(winners.primary().map(|w| w.name()), Some("loopback"));
//! ```

pub mod catalog;
mod category;
mod component;
pub mod error;
pub mod framework;

#[cfg(test)]
mod tests;

pub use self::catalog::{ComponentCatalog, ComponentDescriptor, ComponentFactory};
pub use self::category::{Activation, Category, CategoryPolicy, FrameworkPolicy, SelectionPolicy};
pub use self::component::{
    CommunicatorScope, Component, ComponentMetadata, ContactAttribute, Priority, SelectionHints,
};
pub use self::error::ComponentError;
pub use self::framework::{ComponentFramework, Winner, WinnerSet};
