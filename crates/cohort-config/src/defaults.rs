use crate::logging::LogFormat;

/// Default log filter expression used by the runtime.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default interval between polls while waiting on peers.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default log filter expression used by the runtime.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default telemetry format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default polling interval in milliseconds.
pub fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
