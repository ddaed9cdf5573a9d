//! Configuration validation.
//!
//! Every check pushes a message; all failures are reported together in a
//! single `ConfigError::ValidationError`.

use geminiweb_common::ConfigError;
use geminiweb_core::session::{MAX_REFRESH_INTERVAL, ROTATION_DEBOUNCE};
use geminiweb_core::Model;

use crate::schema::GeminiWebConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &GeminiWebConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_session(&mut errors, config);
    validate_model(&mut errors, config);
    validate_logging(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_session(errors: &mut Vec<String>, config: &GeminiWebConfig) {
    let min = ROTATION_DEBOUNCE.as_secs();
    let max = MAX_REFRESH_INTERVAL.as_secs();
    let interval = config.session.refresh_interval_secs;
    if interval < min {
        errors.push(format!(
            "session.refresh_interval_secs = {interval} must be at least {min}"
        ));
    } else if interval > max {
        errors.push(format!(
            "session.refresh_interval_secs = {interval} must be at most {max}"
        ));
    }
    if config.session.timeout_secs == 0 {
        errors.push("session.timeout_secs must be positive".into());
    }
}

fn validate_model(errors: &mut Vec<String>, config: &GeminiWebConfig) {
    if Model::from_name(&config.model.default).is_none() {
        let known: Vec<&str> = Model::ALL.iter().map(|m| m.name()).collect();
        errors.push(format!(
            "model.default = {:?} is not one of {}",
            config.model.default,
            known.join(", ")
        ));
    }
}

fn validate_logging(errors: &mut Vec<String>, config: &GeminiWebConfig) {
    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(format!(
            "logging.level = {:?} is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }
}
