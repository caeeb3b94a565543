//! Process-wide tracing subscriber.
//!
//! Simulated processes share one address space, so the subscriber is
//! installed by whichever process reaches the `telemetry` stage first. A
//! subscriber installed by the host application is left in place.

use std::io::{self, IsTerminal};

use cohort_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const TARGET: &str = "cohort_runtime::telemetry";

static INSTALLED: OnceCell<Telemetry> = OnceCell::new();

/// Subscriber that ended up handling runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    /// The runtime installed its own subscriber in this format.
    Installed(LogFormat),
    /// The host application already owned the global default.
    Host,
}

/// Failure to bring up runtime telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("log filter '{filter}' is invalid: {message}")]
    Filter {
        /// Rejected expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// Installs the subscriber described by `config` unless one is already in
/// place.
///
/// The filter is validated even when the host's subscriber is kept.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the filter is invalid.
pub fn initialise(config: &Config) -> Result<Telemetry, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;
    Ok(*INSTALLED.get_or_init(|| install(filter, config.log_format())))
}

fn install(filter: EnvFilter, format: LogFormat) -> Telemetry {
    if dispatcher::has_been_set() {
        tracing::debug!(target: TARGET, "keeping host subscriber");
        return Telemetry::Host;
    }
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339())
        .with_thread_names(true);
    let layer = match format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    };
    let subscriber = Registry::default().with(layer.with_filter(filter));
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => Telemetry::Installed(format),
        Err(_) => {
            tracing::debug!(target: TARGET, "host subscriber installed concurrently");
            Telemetry::Host
        }
    }
}
