use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Concurrency-safety contract of the communication API.
///
/// Levels are ordered from most to least restrictive, so `Single < Multiple`.
///
/// # Example
///
/// ```
/// use cohort_types::ThreadLevel;
///
/// let level: ThreadLevel = "serialized".parse().expect("known level");
/// assert!(level < ThreadLevel::Multiple);
/// assert_eq!(level.to_string(), "serialized");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum ThreadLevel {
    /// Only one thread exists.
    #[default]
    Single,
    /// Only the main thread calls into the runtime.
    Funneled,
    /// Any thread may call, but never two at once.
    Serialized,
    /// Any thread may call at any time.
    Multiple,
}

/// Error raised when parsing an unknown thread level.
pub type ThreadLevelParseError = strum::ParseError;

impl ThreadLevel {
    /// Every level in ascending order.
    pub const ALL: [Self; 4] = [
        Self::Single,
        Self::Funneled,
        Self::Serialized,
        Self::Multiple,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        let mut sorted = ThreadLevel::ALL;
        sorted.sort();
        assert_eq!(sorted, ThreadLevel::ALL);
    }

    #[test]
    fn parsing_ignores_case() {
        assert_eq!("MULTIPLE".parse::<ThreadLevel>(), Ok(ThreadLevel::Multiple));
        assert!("concurrent".parse::<ThreadLevel>().is_err());
    }
}
