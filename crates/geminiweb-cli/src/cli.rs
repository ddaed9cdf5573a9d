use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// geminiweb: talk to the Gemini web app with your browser cookies.
#[derive(Parser, Debug)]
#[command(name = "geminiweb", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error) or a full
    /// filter directive.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Model to use instead of the configured default.
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the cookie handshake and report whether the session is usable.
    Health,
    /// List the selectable models.
    Models,
    /// Send a single prompt and print the reply.
    Generate {
        prompt: String,
        /// Download images in the reply into the image cache directory.
        #[arg(long)]
        save_images: bool,
    },
    /// Interactive multi-turn conversation.
    Chat,
}

pub fn parse() -> Args {
    Args::parse()
}

const OWN_TARGETS: [&str; 4] = ["geminiweb", "geminiweb_core", "geminiweb_config", "geminiweb_common"];

/// Turn a bare level into directives for this workspace's crates. Anything
/// that already looks like a directive is passed through.
pub fn log_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    OWN_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
