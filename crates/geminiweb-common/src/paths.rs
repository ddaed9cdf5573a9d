use std::path::PathBuf;

use crate::PlatformError;

const APP_NAME: &str = "geminiweb";

/// Returns the platform-specific configuration directory.
///
/// - macOS: `~/Library/Application Support/geminiweb`
/// - Linux: `$XDG_CONFIG_HOME/geminiweb` (defaults to `~/.config/geminiweb`)
/// - Windows: `%APPDATA%\geminiweb`
pub fn config_dir() -> Result<PathBuf, PlatformError> {
    dirs::config_dir()
        .map(|d| d.join(APP_NAME))
        .ok_or_else(|| PlatformError::PathError("could not determine config directory".into()))
}

/// Returns the platform-specific cache directory.
///
/// - macOS: `~/Library/Caches/geminiweb`
/// - Linux: `$XDG_CACHE_HOME/geminiweb` (defaults to `~/.cache/geminiweb`)
/// - Windows: `%LOCALAPPDATA%\geminiweb`
pub fn cache_dir() -> Result<PathBuf, PlatformError> {
    dirs::cache_dir()
        .map(|d| d.join(APP_NAME))
        .ok_or_else(|| PlatformError::PathError("could not determine cache directory".into()))
}

/// Returns the path to the main configuration file.
pub fn config_file() -> Result<PathBuf, PlatformError> {
    Ok(config_dir()?.join("config.toml"))
}
