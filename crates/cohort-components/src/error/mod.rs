//! Errors raised by the component framework.
//!
//! Construction failures carry an explicit "unavailable" variant so a
//! component can decline to participate without aborting the category.

use thiserror::Error;

use crate::category::Category;

/// Errors arising from component registration, opening, and selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// A descriptor failed validation or collided with an existing one.
    #[error("descriptor error: {message}")]
    Descriptor {
        /// Description of the validation failure.
        message: String,
    },

    /// The component cannot run in this environment and should be skipped.
    #[error("component '{name}' is unavailable: {reason}")]
    Unavailable {
        /// Component name.
        name: String,
        /// Why the component declined.
        reason: String,
    },

    /// The component failed to construct in a way that must abort start-up.
    #[error("component '{name}' in {category} failed to open: {message}")]
    Construction {
        /// Category being opened.
        category: Category,
        /// Component name.
        name: String,
        /// Human-readable failure description.
        message: String,
    },

    /// No candidate accepted selection in a mandatory category.
    #[error("no viable {category} component")]
    NoViableComponent {
        /// Category that ended with no winner.
        category: Category,
    },

    /// The category was opened twice.
    #[error("{category} components are already open")]
    AlreadyOpened {
        /// Offending category.
        category: Category,
    },

    /// Selection was attempted before the category was opened.
    #[error("{category} components have not been opened")]
    NotOpened {
        /// Offending category.
        category: Category,
    },

    /// Selection was attempted twice.
    #[error("{category} components have already been selected")]
    AlreadySelected {
        /// Offending category.
        category: Category,
    },

    /// Winners were requested before selection completed.
    #[error("{category} components have not been selected")]
    NotSelected {
        /// Offending category.
        category: Category,
    },

    /// A lifecycle hook on a selected component failed.
    #[error("component '{name}' failed during {operation}: {message}")]
    Operation {
        /// Component name.
        name: String,
        /// Lifecycle operation that failed.
        operation: &'static str,
        /// Human-readable failure description.
        message: String,
    },
}

impl ComponentError {
    /// Builds an [`ComponentError::Unavailable`] error.
    #[must_use]
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`ComponentError::Operation`] error.
    #[must_use]
    pub fn operation(
        name: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Operation {
            name: name.into(),
            operation,
            message: message.into(),
        }
    }

    /// Whether the failure only removes the component from consideration.
    #[must_use]
    pub const fn is_ignorable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests;
