//! Functional categories and the policy table governing them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Functional grouping of pluggable components.
///
/// The declaration order is the order in which eager categories are opened
/// during bootstrap.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Category {
    /// Low-level memory allocators.
    Allocator,
    /// Registration caches for pinned memory.
    RegistrationCache,
    /// Memory pools built on allocators and caches.
    MemoryPool,
    /// Point-to-point transport engines.
    Transport,
    /// Collective-operation modules.
    Collective,
    /// Parallel I/O modules.
    Io,
    /// Process topology modules.
    Topology,
}

impl Category {
    /// Every category in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Allocator,
        Self::RegistrationCache,
        Self::MemoryPool,
        Self::Transport,
        Self::Collective,
        Self::Io,
        Self::Topology,
    ];
}

/// How many winners a category keeps after selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Exactly one component is installed as the process-wide default.
    SingleWinner,
    /// Every accepting component is kept, ranked by priority.
    RankedMulti,
}

/// When a category is initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Opened and selected during bootstrap.
    Eager,
    /// Opened and selected on first domain use.
    Deferred,
}

/// Policy applied to a single category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// Winner policy.
    pub selection: SelectionPolicy,
    /// Whether an empty selection is fatal.
    pub mandatory: bool,
    /// Eager or deferred initialisation.
    pub activation: Activation,
}

impl CategoryPolicy {
    /// Builds a policy.
    #[must_use]
    pub const fn new(selection: SelectionPolicy, mandatory: bool, activation: Activation) -> Self {
        Self {
            selection,
            mandatory,
            activation,
        }
    }
}

/// Explicit policy table covering every category.
///
/// # Example
///
/// ```
/// use cohort_components::{Activation, Category, FrameworkPolicy};
///
/// let policy = FrameworkPolicy::default();
/// assert_eq!(policy.get(Category::Io).activation, Activation::Deferred);
/// assert!(policy.get(Category::Transport).mandatory);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkPolicy {
    categories: BTreeMap<Category, CategoryPolicy>,
}

impl FrameworkPolicy {
    /// Returns the policy for `category`.
    #[must_use]
    pub fn get(&self, category: Category) -> CategoryPolicy {
        self.categories
            .get(&category)
            .copied()
            .unwrap_or_else(|| default_policy(category))
    }

    /// Replaces the policy for `category`.
    #[must_use]
    pub fn with(mut self, category: Category, policy: CategoryPolicy) -> Self {
        self.categories.insert(category, policy);
        self
    }

    /// Categories opened during bootstrap, in opening order.
    #[must_use]
    pub fn eager_categories(&self) -> Vec<Category> {
        self.with_activation(Activation::Eager)
    }

    /// Categories initialised on first use.
    #[must_use]
    pub fn deferred_categories(&self) -> Vec<Category> {
        self.with_activation(Activation::Deferred)
    }

    fn with_activation(&self, activation: Activation) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| self.get(*category).activation == activation)
            .collect()
    }
}

impl Default for FrameworkPolicy {
    fn default() -> Self {
        let categories = Category::ALL
            .into_iter()
            .map(|category| (category, default_policy(category)))
            .collect();
        Self { categories }
    }
}

const fn default_policy(category: Category) -> CategoryPolicy {
    use Activation::{Deferred, Eager};
    use SelectionPolicy::{RankedMulti, SingleWinner};

    match category {
        Category::Allocator | Category::RegistrationCache => {
            CategoryPolicy::new(RankedMulti, false, Eager)
        }
        Category::MemoryPool | Category::Transport => CategoryPolicy::new(SingleWinner, true, Eager),
        Category::Collective => CategoryPolicy::new(RankedMulti, true, Eager),
        Category::Io | Category::Topology => CategoryPolicy::new(RankedMulti, false, Deferred),
    }
}
