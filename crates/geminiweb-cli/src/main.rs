//! geminiweb: command-line client for the Gemini web app.

mod cli;
mod commands;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::cli::Command;
use crate::commands::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Logging is not up yet; load errors are reported once it is.
    let config = geminiweb_config::load_config_from(args.config.as_deref());

    let level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".into());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli::log_directive(&level))),
        )
        .init();

    tracing::debug!("geminiweb v{} starting", env!("CARGO_PKG_VERSION"));

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    args: cli::Args,
    config: Result<geminiweb_config::GeminiWebConfig, geminiweb_common::ConfigError>,
) -> Result<(), CliError> {
    let config = config?;
    if let Err(e) = config.ensure_cache_dirs() {
        tracing::warn!("Failed to create cache directories: {e}");
    }
    let model = commands::resolve_model(args.model.as_deref(), &config)?;

    match args.command {
        Command::Health => commands::health(&config, model).await,
        Command::Models => {
            commands::models(model);
            Ok(())
        }
        Command::Generate {
            prompt,
            save_images,
        } => commands::generate(&config, model, &prompt, save_images).await,
        Command::Chat => commands::chat(&config, model).await,
    }
}
