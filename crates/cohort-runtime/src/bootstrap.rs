//! Configuration loading seam for the bootstrap sequence.

use std::ffi::OsString;
use std::sync::Arc;

use cohort_config::Config;
use ortho_config::OrthoError;

const PROGRAM_NAME: &str = "cohort";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the configuration for a process started with `args`.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any source is malformed.
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that resolves defaults, files, `COHORT_*` variables and the
/// supplied start-up arguments.
///
/// `args` are the runtime arguments only; a program name is prepended
/// before they reach the parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgsConfigLoader;

impl ConfigLoader for ArgsConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        let argv = std::iter::once(OsString::from(PROGRAM_NAME)).chain(args.iter().cloned());
        Config::load_from_iter(argv)
    }
}

/// Loader that always returns a pre-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}
