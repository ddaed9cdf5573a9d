//! Environment variable overrides, applied after the file is loaded.

use tracing::debug;

use crate::schema::GeminiWebConfig;

pub const ENV_SECURE_1PSID: &str = "GEMINI_SECURE_1PSID";
pub const ENV_SECURE_1PSIDTS: &str = "GEMINI_SECURE_1PSIDTS";
pub const ENV_PROXY: &str = "GEMINI_PROXY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut GeminiWebConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from `lookup`. Unset and empty variables are ignored.
pub fn apply_overrides_from(
    config: &mut GeminiWebConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let targets: [(&str, &mut String); 4] = [
        (ENV_SECURE_1PSID, &mut config.auth.secure_1psid),
        (ENV_SECURE_1PSIDTS, &mut config.auth.secure_1psidts),
        (ENV_PROXY, &mut config.session.proxy),
        (ENV_MODEL, &mut config.model.default),
    ];
    for (key, field) in targets {
        if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
            debug!(var = key, "Config overridden from environment");
            *field = value;
        }
    }
}
