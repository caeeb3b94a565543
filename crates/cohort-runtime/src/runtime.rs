//! Process-wide runtime context.
//!
//! A [`Runtime`] owns the once-only lifecycle of one process: it runs the
//! bootstrap sequence at most once, keeps the negotiated thread level and
//! the default communicators, and activates deferred component categories
//! on first domain use.

use std::ffi::OsString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use cohort_components::{Category, ComponentError, SelectionHints, WinnerSet};
use cohort_types::{ProcessState, ThreadLevel};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::communicator::{Communicator, CommunicatorKind};
use crate::error::BootstrapError;
use crate::sequencer::{self, Collaborators, Initialized, StateCell};
use crate::threading::ThreadLevelCell;

/// Errors raised by runtime operations after bootstrap.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The operation needs a completed bootstrap.
    #[error("the runtime has not been initialised")]
    NotInitialized,
    /// Another thread panicked while holding the component framework.
    #[error("component framework lock poisoned")]
    Poisoned,
    /// Component activation failed.
    #[error(transparent)]
    Component(#[from] ComponentError),
}

/// Runtime context for one process.
#[derive(Debug)]
pub struct Runtime {
    collaborators: Collaborators,
    attempted: AtomicBool,
    threads: ThreadLevelCell,
    state: StateCell,
    initialized: OnceCell<Initialized>,
}

impl Runtime {
    /// Creates an uninitialised runtime.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            attempted: AtomicBool::new(false),
            threads: ThreadLevelCell::new(),
            state: StateCell::new(),
            initialized: OnceCell::new(),
        }
    }

    /// Bootstraps the process and returns the provided thread level.
    ///
    /// Only the first call does anything. Any later call, whether the first
    /// one succeeded, failed, or is still running on another thread, fails
    /// with [`BootstrapError::AlreadyInitialized`] without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Stage`] naming the failing stage, or
    /// [`BootstrapError::AlreadyInitialized`] on repeat calls.
    pub fn initialize(
        &self,
        args: &[OsString],
        requested: ThreadLevel,
    ) -> Result<ThreadLevel, BootstrapError> {
        if self.attempted.swap(true, Ordering::AcqRel) {
            return Err(BootstrapError::AlreadyInitialized);
        }
        let initialized =
            sequencer::bootstrap_with(&self.collaborators, args, requested, &self.threads, &self.state)?;
        let provided = initialized.provided();
        self.initialized
            .set(initialized)
            .map_err(|_| BootstrapError::AlreadyInitialized)?;
        Ok(provided)
    }

    /// Returns `true` once bootstrap has completed successfully.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Provided thread level, once negotiated.
    #[must_use]
    pub fn thread_level(&self) -> Option<ThreadLevel> {
        self.threads.get().map(|negotiation| negotiation.provided)
    }

    /// Thread recorded as the main thread, when threads are supported.
    #[must_use]
    pub fn main_thread(&self) -> Option<ThreadId> {
        self.threads.get().and_then(|negotiation| negotiation.main_thread)
    }

    /// Default communicator of `kind`, once bootstrap completed.
    #[must_use]
    pub fn communicator(&self, kind: CommunicatorKind) -> Option<&Communicator> {
        self.initialized.get().map(|initialized| match kind {
            CommunicatorKind::World => initialized.world(),
            CommunicatorKind::SelfOnly => initialized.self_only(),
        })
    }

    /// Latest lifecycle state this process published.
    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        self.state.get()
    }

    /// Bootstrap result, once available.
    #[must_use]
    pub fn initialized(&self) -> Option<&Initialized> {
        self.initialized.get()
    }

    /// Makes `category` usable, activating it on first use when it is
    /// deferred.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotInitialized`] before bootstrap completes
    /// and [`RuntimeError::Component`] when activation fails; a failed
    /// activation is retried on the next call.
    pub fn ensure_category(&self, category: Category) -> Result<WinnerSet, RuntimeError> {
        let initialized = self.initialized.get().ok_or(RuntimeError::NotInitialized)?;
        let hints = SelectionHints::default()
            .with_progress_threads(self.collaborators.capability.progress_threads())
            .with_concurrent_callers(initialized.negotiation().multiple);
        let mut framework = initialized
            .framework()
            .lock()
            .map_err(|_| RuntimeError::Poisoned)?;
        let first_use = framework.is_dormant(category);
        let reporter = self.collaborators.reporter.as_ref();
        match framework.ensure_available(category, &hints) {
            Ok(winners) => {
                if first_use {
                    reporter.category_activated(&winners);
                }
                Ok(winners)
            }
            Err(error) => {
                reporter.category_failed(category, &error);
                Err(error.into())
            }
        }
    }
}
