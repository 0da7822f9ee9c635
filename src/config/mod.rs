//! Configuration
//!
//! - `settings`: layered application settings (defaults < file < env);
//! - `runtime`: the JSON port record shared with companion processes;
//! - `startup`: the process start timestamp handed to every session.

pub mod runtime;
mod settings;
pub mod startup;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use runtime::RuntimeRecord;
pub use settings::{HubSettings, RuntimeSettings, ServerSettings, Settings};
pub use startup::ServerStartup;

/// Prefix of environment overrides, e.g. `TRACKCAST_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "TRACKCAST";

/// Loads `config/default.*` (if present) and `TRACKCAST_*` environment
/// variables over the built-in defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new("config/default"))
}

/// Same as [`load_config`] with an explicit base path for the config file
/// (extension is probed by the `config` crate).
pub fn load_config_from(base: &Path) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(base).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge())
}
