//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use geminiweb_common::ConfigError;
use geminiweb_core::constants::{IDENTITY_COOKIE, SECONDARY_COOKIE};
use geminiweb_core::{Model, SessionOptions};
use serde::{Deserialize, Serialize};

/// Root configuration for the geminiweb client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiWebConfig {
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub model: ModelConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Browser cookies used to seed the session.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secure_1psid: String,
    pub secure_1psidts: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &str| if v.is_empty() { "" } else { "[REDACTED]" };
        f.debug_struct("AuthConfig")
            .field("secure_1psid", &redact(&self.secure_1psid))
            .field("secure_1psidts", &redact(&self.secure_1psidts))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_refresh: bool,
    /// Seconds between cookie rotation ticks. Minimum 60.
    pub refresh_interval_secs: u64,
    pub timeout_secs: u64,
    /// Empty means no proxy.
    pub proxy: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            refresh_interval_secs: 540,
            timeout_secs: 300,
            proxy: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub default: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: Model::Unspecified.name().into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root of the rotation cache and saved images. Empty uses the
    /// platform cache directory.
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, or error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl GeminiWebConfig {
    /// Seed cookies for `Session::initialize`. Empty values are left out.
    pub fn cookies(&self) -> Vec<(String, String)> {
        [
            (IDENTITY_COOKIE, &self.auth.secure_1psid),
            (SECONDARY_COOKIE, &self.auth.secure_1psidts),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_auto_refresh(self.session.auto_refresh)
            .with_refresh_interval(Duration::from_secs(self.session.refresh_interval_secs))
            .with_timeout(Duration::from_secs(self.session.timeout_secs))
    }

    pub fn proxy(&self) -> Option<&str> {
        Some(self.session.proxy.as_str()).filter(|p| !p.is_empty())
    }

    /// Unknown names fall back to [`Model::Unspecified`]; validation
    /// reports them.
    pub fn default_model(&self) -> Model {
        Model::from_name(&self.model.default).unwrap_or_default()
    }

    pub fn cache_root(&self) -> Result<PathBuf, ConfigError> {
        if !self.cache.dir.is_empty() {
            return Ok(PathBuf::from(&self.cache.dir));
        }
        geminiweb_common::paths::cache_dir().map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn cookie_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.cache_root()?.join("cookies"))
    }

    pub fn image_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.cache_root()?.join("images"))
    }

    /// Create the cookie and image directories under [`Self::cache_root`].
    pub fn ensure_cache_dirs(&self) -> Result<(), ConfigError> {
        for dir in [self.cookie_cache_dir()?, self.image_dir()?] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ConfigError::ParseError(format!("failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }
}
