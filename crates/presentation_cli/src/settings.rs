//! Configuration loading for the CLI
//!
//! Layers, lowest priority first: built-in defaults, an optional
//! `geocoding.toml` (or an explicit `--config` file), then environment
//! variables such as `MEETINGDIR_OPTIONS__RETRIES=5` or
//! `MEETINGDIR_RATE_LIMIT__INTERVAL_MS=2000`.

use std::path::Path;

use integration_geocoding::GeocodingConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MEETINGDIR";

/// Default config file name, resolved against the working directory
const DEFAULT_CONFIG_FILE: &str = "geocoding";

/// Load the geocoding configuration from file and process environment
pub fn load_config(path: Option<&Path>) -> Result<GeocodingConfig, config::ConfigError> {
    load_config_with_env(path, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_config_with_env(
    path: Option<&Path>,
    env: config::Environment,
) -> Result<GeocodingConfig, config::ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    config::Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?
        .try_deserialize()
}
