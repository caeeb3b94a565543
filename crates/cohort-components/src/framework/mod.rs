//! Two-phase open/select orchestration of component categories.
//!
//! Each category moves through `open` (construct every candidate) and
//! `select` (rank candidates and commit winners). Deferred categories stay
//! dormant until [`ComponentFramework::ensure_available`] is called, which
//! performs both phases on first use. A failed deferred activation leaves
//! the category dormant so a later call retries it.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::catalog::ComponentCatalog;
use crate::category::{Activation, Category, FrameworkPolicy, SelectionPolicy};
use crate::component::{Component, Priority, SelectionHints};
use crate::error::ComponentError;

const TARGET: &str = "cohort_components::framework";

/// A committed selection winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    name: String,
    priority: Priority,
}

impl Winner {
    /// Component name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Priority reported when the component won.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }
}

/// Ranked winners of a category, best first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerSet {
    category: Category,
    winners: Vec<Winner>,
}

impl WinnerSet {
    /// Category the winners belong to.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Highest-ranked winner, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&Winner> {
        self.winners.first()
    }

    /// Iterates winners from best to worst.
    pub fn iter(&self) -> impl Iterator<Item = &Winner> {
        self.winners.iter()
    }

    /// Winner names from best to worst.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.winners.iter().map(Winner::name).collect()
    }

    /// Number of winners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.winners.len()
    }

    /// Returns `true` when no component won.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}

struct Candidate {
    order: usize,
    component: Box<dyn Component>,
}

struct Ranked {
    order: usize,
    priority: Priority,
    component: Box<dyn Component>,
}

impl Ranked {
    fn winner(&self) -> Winner {
        Winner {
            name: self.component.metadata().name().to_owned(),
            priority: self.priority,
        }
    }
}

enum Stage {
    Dormant,
    Opened(Vec<Candidate>),
    Selected(Vec<Ranked>),
}

/// Owns every opened component and the winners of each category.
pub struct ComponentFramework {
    catalog: ComponentCatalog,
    policy: FrameworkPolicy,
    stages: BTreeMap<Category, Stage>,
}

impl std::fmt::Debug for ComponentFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: BTreeMap<_, _> = self
            .stages
            .iter()
            .map(|(category, stage)| {
                let label = match stage {
                    Stage::Dormant => "dormant",
                    Stage::Opened(_) => "opened",
                    Stage::Selected(_) => "selected",
                };
                (*category, label)
            })
            .collect();
        f.debug_struct("ComponentFramework")
            .field("catalog", &self.catalog)
            .field("stages", &stages)
            .finish_non_exhaustive()
    }
}

impl ComponentFramework {
    /// Builds a framework over the given catalog and policy table.
    #[must_use]
    pub fn new(catalog: ComponentCatalog, policy: FrameworkPolicy) -> Self {
        Self {
            catalog,
            policy,
            stages: BTreeMap::new(),
        }
    }

    /// Returns the policy table.
    #[must_use]
    pub const fn policy(&self) -> &FrameworkPolicy {
        &self.policy
    }

    /// Returns the catalog.
    #[must_use]
    pub const fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    /// Constructs every registered candidate in `category`.
    ///
    /// Candidates whose factory reports [`ComponentError::Unavailable`] are
    /// skipped. Any other factory error aborts the open and closes the
    /// candidates constructed so far.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::AlreadyOpened`] when the category has
    /// already been opened, or [`ComponentError::Construction`] when a
    /// factory fails fatally.
    pub fn open(&mut self, category: Category) -> Result<usize, ComponentError> {
        match self.stages.get(&category) {
            None | Some(Stage::Dormant) => {}
            Some(_) => return Err(ComponentError::AlreadyOpened { category }),
        }

        let mut candidates = Vec::new();
        for (order, descriptor) in self.catalog.for_category(category).iter().enumerate() {
            match descriptor.instantiate() {
                Ok(component) => candidates.push(Candidate { order, component }),
                Err(error) if error.is_ignorable() => {
                    warn!(
                        target: TARGET,
                        %category,
                        component = descriptor.name(),
                        %error,
                        "component unavailable; skipping"
                    );
                }
                Err(error) => {
                    close_candidates(&mut candidates);
                    return Err(ComponentError::Construction {
                        category,
                        name: descriptor.name().to_owned(),
                        message: error.to_string(),
                    });
                }
            }
        }

        let opened = candidates.len();
        debug!(target: TARGET, %category, opened, "category opened");
        self.stages.insert(category, Stage::Opened(candidates));
        Ok(opened)
    }

    /// Ranks the opened candidates of `category` and commits the winners.
    ///
    /// The highest priority wins and ties go to the candidate registered
    /// first. Single-winner categories keep one component; ranked categories
    /// keep every component that accepted. Losers are closed.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotOpened`] or
    /// [`ComponentError::AlreadySelected`] on lifecycle misuse, and
    /// [`ComponentError::NoViableComponent`] when a mandatory category ends
    /// up empty.
    pub fn select(
        &mut self,
        category: Category,
        hints: &SelectionHints,
    ) -> Result<WinnerSet, ComponentError> {
        let candidates = match self.stages.remove(&category) {
            Some(Stage::Opened(candidates)) => candidates,
            Some(stage @ Stage::Selected(_)) => {
                self.stages.insert(category, stage);
                return Err(ComponentError::AlreadySelected { category });
            }
            Some(stage @ Stage::Dormant) => {
                self.stages.insert(category, stage);
                return Err(ComponentError::NotOpened { category });
            }
            None => return Err(ComponentError::NotOpened { category }),
        };

        let policy = self.policy.get(category);
        let mut ranked = Vec::new();
        for mut candidate in candidates {
            match candidate.component.query(hints) {
                Some(priority) => ranked.push(Ranked {
                    order: candidate.order,
                    priority,
                    component: candidate.component,
                }),
                None => {
                    debug!(
                        target: TARGET,
                        %category,
                        component = candidate.component.metadata().name(),
                        "component declined selection"
                    );
                    candidate.component.close();
                }
            }
        }
        sort_ranked(&mut ranked);

        if policy.selection == SelectionPolicy::SingleWinner && ranked.len() > 1 {
            for mut loser in ranked.split_off(1) {
                loser.component.close();
            }
        }

        if ranked.is_empty() && policy.mandatory {
            self.stages.insert(category, Stage::Selected(Vec::new()));
            return Err(ComponentError::NoViableComponent { category });
        }

        let set = winner_set(category, &ranked);
        debug!(
            target: TARGET,
            %category,
            winners = ?set.names(),
            "category selected"
        );
        self.stages.insert(category, Stage::Selected(ranked));
        Ok(set)
    }

    /// Re-ranks the committed winners of `category` for a specific
    /// communicator without altering the process-wide selection.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotSelected`] before selection, or
    /// [`ComponentError::NoViableComponent`] when no winner accepts the
    /// communicator and the category is mandatory.
    pub fn select_for_communicator(
        &self,
        category: Category,
        hints: &SelectionHints,
    ) -> Result<WinnerSet, ComponentError> {
        let winners = self.selected(category)?;
        let mut ranked: Vec<(usize, Priority, &dyn Component)> = winners
            .iter()
            .filter_map(|entry| {
                entry
                    .component
                    .query(hints)
                    .map(|priority| (entry.order, priority, entry.component.as_ref()))
            })
            .collect();
        ranked.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));

        if ranked.is_empty() && self.policy.get(category).mandatory {
            return Err(ComponentError::NoViableComponent { category });
        }

        Ok(WinnerSet {
            category,
            winners: ranked
                .into_iter()
                .map(|(_, priority, component)| Winner {
                    name: component.metadata().name().to_owned(),
                    priority,
                })
                .collect(),
        })
    }

    /// Marks `category` for activation on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::AlreadyOpened`] when the category is already
    /// active.
    pub fn defer(&mut self, category: Category) -> Result<(), ComponentError> {
        match self.stages.get(&category) {
            None | Some(Stage::Dormant) => {
                debug!(target: TARGET, %category, "category deferred");
                self.stages.insert(category, Stage::Dormant);
                Ok(())
            }
            Some(_) => Err(ComponentError::AlreadyOpened { category }),
        }
    }

    /// Returns `true` when the category is registered for lazy activation
    /// and has not been activated yet.
    #[must_use]
    pub fn is_dormant(&self, category: Category) -> bool {
        matches!(self.stages.get(&category), Some(Stage::Dormant))
    }

    /// Ensures `category` has been opened and selected, activating a
    /// deferred category on first use.
    ///
    /// Successful calls are idempotent. When activation fails the category
    /// returns to its dormant state so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns any error raised by [`Self::open`] or [`Self::select`], or
    /// [`ComponentError::NotOpened`] for an eager category that bootstrap
    /// has not reached yet.
    pub fn ensure_available(
        &mut self,
        category: Category,
        hints: &SelectionHints,
    ) -> Result<WinnerSet, ComponentError> {
        match self.stages.get(&category) {
            Some(Stage::Selected(ranked)) => return Ok(winner_set(category, ranked)),
            Some(Stage::Opened(_)) => return Err(ComponentError::NotSelected { category }),
            Some(Stage::Dormant) => {}
            None if self.policy.get(category).activation == Activation::Deferred => {}
            None => return Err(ComponentError::NotOpened { category }),
        }

        debug!(target: TARGET, %category, "activating deferred category");
        let activated = self
            .open(category)
            .and_then(|_| self.select(category, hints));
        if activated.is_err() {
            match self.stages.remove(&category) {
                Some(Stage::Selected(mut ranked)) => close_ranked(&mut ranked),
                Some(Stage::Opened(candidates)) => {
                    for mut candidate in candidates {
                        candidate.component.close();
                    }
                }
                Some(Stage::Dormant) | None => {}
            }
            self.stages.insert(category, Stage::Dormant);
        }
        activated
    }

    /// Returns the committed winners of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotSelected`] before selection.
    pub fn winners(&self, category: Category) -> Result<WinnerSet, ComponentError> {
        self.selected(category)
            .map(|ranked| winner_set(category, ranked))
    }

    /// Runs `operation` against the primary winner of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotSelected`] before selection or
    /// [`ComponentError::NoViableComponent`] when the category has no
    /// winner.
    pub fn with_winner_mut<R, F>(&mut self, category: Category, operation: F) -> Result<R, ComponentError>
    where
        F: FnOnce(&mut dyn Component) -> R,
    {
        match self.stages.get_mut(&category) {
            Some(Stage::Selected(ranked)) => ranked
                .first_mut()
                .map(|entry| operation(entry.component.as_mut()))
                .ok_or(ComponentError::NoViableComponent { category }),
            _ => Err(ComponentError::NotSelected { category }),
        }
    }

    /// Runs `operation` against the primary winner of `category` for read
    /// access.
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_winner_mut`].
    pub fn with_winner<R, F>(&self, category: Category, operation: F) -> Result<R, ComponentError>
    where
        F: FnOnce(&dyn Component) -> R,
    {
        self.selected(category)?
            .first()
            .map(|entry| operation(entry.component.as_ref()))
            .ok_or(ComponentError::NoViableComponent { category })
    }

    /// Winner sets of every selected category in category order.
    #[must_use]
    pub fn selections(&self) -> Vec<WinnerSet> {
        self.stages
            .iter()
            .filter_map(|(category, stage)| match stage {
                Stage::Selected(ranked) => Some(winner_set(*category, ranked)),
                _ => None,
            })
            .collect()
    }

    fn selected(&self, category: Category) -> Result<&[Ranked], ComponentError> {
        match self.stages.get(&category) {
            Some(Stage::Selected(ranked)) => Ok(ranked.as_slice()),
            _ => Err(ComponentError::NotSelected { category }),
        }
    }
}

fn sort_ranked(ranked: &mut [Ranked]) {
    ranked.sort_by(|left, right| {
        right
            .priority
            .cmp(&left.priority)
            .then(left.order.cmp(&right.order))
    });
}

fn winner_set(category: Category, ranked: &[Ranked]) -> WinnerSet {
    WinnerSet {
        category,
        winners: ranked.iter().map(Ranked::winner).collect(),
    }
}

fn close_candidates(candidates: &mut [Candidate]) {
    for candidate in candidates {
        candidate.component.close();
    }
}

fn close_ranked(ranked: &mut [Ranked]) {
    for entry in ranked {
        entry.component.close();
    }
}

#[cfg(test)]
mod tests;
