//! geminiweb configuration.
//!
//! TOML configuration with environment overrides and validation. Every
//! section has defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geminiweb_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config.session.refresh_interval_secs);
//! ```

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{AuthConfig, CacheConfig, GeminiWebConfig, LoggingConfig, ModelConfig, SessionConfig};

use std::path::Path;

use geminiweb_common::ConfigError;

/// Load config from the platform default path, creating it if missing,
/// then apply environment overrides and validate.
pub fn load_config() -> Result<GeminiWebConfig, ConfigError> {
    load_config_from(None)
}

/// Like [`load_config`], reading `path` instead of the default location
/// when given. An explicit path must exist.
pub fn load_config_from(path: Option<&Path>) -> Result<GeminiWebConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    env::apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &GeminiWebConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
