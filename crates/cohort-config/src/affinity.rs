use serde::{Deserialize, Serialize};

/// Processor-affinity request resolved from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AffinityRequest {
    /// No pinning was requested.
    #[default]
    Disabled,
    /// Pinning was requested but no processor index was supplied.
    Unspecified,
    /// Pin the process to the given processor index.
    Processor {
        /// Zero-based processor index.
        index: u32,
    },
}

impl AffinityRequest {
    /// Combines the raw `paffinity_alone` flag and processor index.
    #[must_use]
    pub fn from_settings(alone: bool, processor: Option<u32>) -> Self {
        match (alone, processor) {
            (false, _) => Self::Disabled,
            (true, None) => Self::Unspecified,
            (true, Some(index)) => Self::Processor { index },
        }
    }

    /// Returns `true` when any pinning was requested.
    #[must_use]
    pub fn is_requested(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}
