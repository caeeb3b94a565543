//! Structured health reporting for bootstrap lifecycle events.

use std::sync::Arc;

use cohort_components::{Category, ComponentError, WinnerSet};
use cohort_types::ThreadLevel;

use crate::error::BootstrapError;
use crate::sequencer::Initialized;

/// Observer trait used to surface bootstrap events to telemetry sinks.
pub trait BootstrapReporter: Send + Sync {
    /// Invoked before the first stage runs.
    fn bootstrap_starting(&self, requested: ThreadLevel);

    /// Invoked before a stage runs.
    fn stage_starting(&self, stage: &str);

    /// Invoked after a stage completes.
    fn stage_completed(&self, stage: &str);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, initialized: &Initialized);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when a deferred category is brought up on first use.
    fn category_activated(&self, winners: &WinnerSet);

    /// Invoked when a deferred category fails to come up.
    fn category_failed(&self, category: Category, error: &ComponentError);
}

impl<T> BootstrapReporter for Arc<T>
where
    T: BootstrapReporter + ?Sized,
{
    fn bootstrap_starting(&self, requested: ThreadLevel) {
        (**self).bootstrap_starting(requested);
    }

    fn stage_starting(&self, stage: &str) {
        (**self).stage_starting(stage);
    }

    fn stage_completed(&self, stage: &str) {
        (**self).stage_completed(stage);
    }

    fn bootstrap_succeeded(&self, initialized: &Initialized) {
        (**self).bootstrap_succeeded(initialized);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn category_activated(&self, winners: &WinnerSet) {
        (**self).category_activated(winners);
    }

    fn category_failed(&self, category: Category, error: &ComponentError) {
        (**self).category_failed(category, error);
    }
}

/// Default reporter that records bootstrap events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredBootstrapReporter;

impl StructuredBootstrapReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BootstrapReporter for StructuredBootstrapReporter {
    fn bootstrap_starting(&self, requested: ThreadLevel) {
        tracing::info!(
            target: "cohort_runtime::health",
            event = "bootstrap_starting",
            requested = %requested,
            "starting runtime bootstrap"
        );
    }

    fn stage_starting(&self, stage: &str) {
        tracing::debug!(
            target: "cohort_runtime::health",
            event = "stage_starting",
            stage,
            "entering bootstrap stage"
        );
    }

    fn stage_completed(&self, stage: &str) {
        tracing::debug!(
            target: "cohort_runtime::health",
            event = "stage_completed",
            stage,
            "bootstrap stage completed"
        );
    }

    fn bootstrap_succeeded(&self, initialized: &Initialized) {
        let selected = initialized
            .selections()
            .iter()
            .filter_map(|set| {
                set.primary()
                    .map(|winner| format!("{}={}", set.category(), winner.name()))
            })
            .collect::<Vec<_>>()
            .join(",");
        tracing::info!(
            target: "cohort_runtime::health",
            event = "bootstrap_succeeded",
            identity = %initialized.identity(),
            provided = %initialized.provided(),
            world_size = initialized.world().members().len(),
            selected = %selected,
            "runtime bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "cohort_runtime::health",
            event = "bootstrap_failed",
            stage = error.stage().unwrap_or("initialize"),
            status = error.status().code(),
            error = %error,
            "runtime bootstrap failed"
        );
    }

    fn category_activated(&self, winners: &WinnerSet) {
        tracing::info!(
            target: "cohort_runtime::health",
            event = "category_activated",
            category = %winners.category(),
            winners = ?winners.names(),
            "deferred category activated"
        );
    }

    fn category_failed(&self, category: Category, error: &ComponentError) {
        tracing::error!(
            target: "cohort_runtime::health",
            event = "category_failed",
            category = %category,
            error = %error,
            "deferred category failed to activate"
        );
    }
}
