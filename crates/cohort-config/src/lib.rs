//! Shared configuration for the Cohort bootstrap runtime.
//!
//! The bootstrap core never reads the environment directly. Runtime toggles
//! such as the debug-trace flag, the "show all parameters" flag, and the
//! processor-affinity request are resolved here from defaults, configuration
//! files, `COHORT_*` environment variables, and start-up arguments, then
//! handed to the sequencer as plain values.

mod affinity;
mod defaults;
mod logging;
mod wait;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use affinity::AffinityRequest;
pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS, default_log_filter, default_log_filter_string,
    default_log_format, default_poll_interval_ms,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use wait::WaitPolicy;

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COHORT")]
pub struct Config {
    /// `tracing` filter expression applied to runtime telemetry.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for runtime telemetry.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Enables verbose bootstrap tracing and disables registry command batching.
    #[ortho_config(default = false)]
    pub debug_trace: bool,
    /// Dumps every resolved parameter once module selection completes.
    #[ortho_config(default = false)]
    pub show_all_params: bool,
    /// Requests that each process is pinned to a single processor.
    #[ortho_config(default = false)]
    pub paffinity_alone: bool,
    /// Processor index used when `paffinity_alone` is set.
    pub paffinity_processor: Option<u32>,
    /// Interval between polls while waiting on peers, in milliseconds.
    #[ortho_config(default = defaults::default_poll_interval_ms())]
    pub poll_interval_ms: u64,
    /// Optional upper bound on any single wait for peers, in milliseconds.
    pub wait_deadline_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            debug_trace: false,
            show_all_params: false,
            paffinity_alone: false,
            paffinity_processor: None,
            poll_interval_ms: default_poll_interval_ms(),
            wait_deadline_ms: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any source is malformed.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any source is malformed.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Filter expression used when installing telemetry.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Whether debug tracing is enabled.
    #[must_use]
    pub fn debug_trace(&self) -> bool {
        self.debug_trace
    }

    /// Whether every resolved parameter should be dumped after selection.
    #[must_use]
    pub fn show_all_params(&self) -> bool {
        self.show_all_params
    }

    /// Processor-affinity request derived from the affinity settings.
    #[must_use]
    pub fn affinity(&self) -> AffinityRequest {
        AffinityRequest::from_settings(self.paffinity_alone, self.paffinity_processor)
    }

    /// Polling policy applied while waiting on peers.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        let policy = WaitPolicy::new(Duration::from_millis(self.poll_interval_ms));
        match self.wait_deadline_ms {
            Some(deadline) => policy.with_deadline(Duration::from_millis(deadline)),
            None => policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_optional_features() {
        let config = Config::default();
        assert!(!config.debug_trace());
        assert!(!config.show_all_params());
        assert_eq!(config.affinity(), AffinityRequest::Disabled);
        assert_eq!(config.wait_policy().deadline(), None);
    }

    #[test]
    fn wait_policy_honours_deadline() {
        let config = Config {
            poll_interval_ms: 5,
            wait_deadline_ms: Some(250),
            ..Config::default()
        };
        let policy = config.wait_policy();
        assert_eq!(policy.poll_interval(), Duration::from_millis(5));
        assert_eq!(policy.deadline(), Some(Duration::from_millis(250)));
    }
}
