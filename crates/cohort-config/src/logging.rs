use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Rendering used by the runtime's tracing subscriber.
///
/// Parsed case-insensitively from `log_format` in any configuration layer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One terse line per event, meant for a terminal.
    #[default]
    Compact,
    /// One JSON object per event with fields flattened to the top level.
    Json,
}

impl LogFormat {
    /// Whether events are emitted as machine-readable records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Error produced by `"...".parse::<LogFormat>()`.
pub type LogFormatParseError = strum::ParseError;
