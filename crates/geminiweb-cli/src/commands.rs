//! Subcommand implementations.

use geminiweb_common::ConfigError;
use geminiweb_config::GeminiWebConfig;
use geminiweb_core::{GeminiClient, GeminiError, GenerationResult, Model, TurnOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gemini(#[from] GeminiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn resolve_model(name: Option<&str>, config: &GeminiWebConfig) -> Result<Model, CliError> {
    match name {
        Some(name) => Model::from_name(name).ok_or_else(|| {
            GeminiError::InvalidArgument(format!("unknown model {name:?}; see `geminiweb models`"))
                .into()
        }),
        None => Ok(config.default_model()),
    }
}

fn build_client(config: &GeminiWebConfig, model: Model) -> Result<GeminiClient, CliError> {
    let client = GeminiClient::with_defaults(config.proxy(), config.cookie_cache_dir()?)?;
    Ok(client.with_default_model(model))
}

async fn connect(
    config: &GeminiWebConfig,
    model: Model,
    auto_refresh: bool,
) -> Result<GeminiClient, CliError> {
    let client = build_client(config, model)?;
    let options = config.session_options().with_auto_refresh(auto_refresh);
    client.init(config.cookies(), options).await?;
    Ok(client)
}

pub async fn health(config: &GeminiWebConfig, model: Model) -> Result<(), CliError> {
    let client = connect(config, model, false).await?;
    println!(
        "ok: session ready ({} cookies)",
        client.session().credentials().len()
    );
    client.close();
    Ok(())
}

pub fn models(current: Model) {
    for model in Model::ALL {
        let marker = if model == current { "*" } else { " " };
        println!("{marker} {model}");
    }
}

pub async fn generate(
    config: &GeminiWebConfig,
    model: Model,
    prompt: &str,
    save_images: bool,
) -> Result<(), CliError> {
    let client = connect(config, model, false).await?;
    let result = client.generate_content(prompt, None).await?;
    print_result(&result);

    if save_images {
        let dir = config.image_dir()?;
        for image in result.images() {
            match client.save_image(image, &dir).await {
                Ok(path) => println!("saved {}", path.display()),
                Err(e) => warn!(url = %image.url, error = %e, "Image download failed"),
            }
        }
    }
    client.close();
    Ok(())
}

pub async fn chat(config: &GeminiWebConfig, model: Model) -> Result<(), CliError> {
    let client = connect(config, model, config.session.auto_refresh).await?;
    let mut thread = client.start_chat(None);
    info!(model = %thread.model(), "Chat started");
    println!("Chatting with {}. Commands: :candidates, :pick N, :quit", thread.model());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match ChatInput::parse(line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Candidates => match thread.last_result() {
                Some(result) => print_candidates(result),
                None => println!("no reply yet"),
            },
            ChatInput::Pick(index) => match thread.select_candidate(index) {
                Ok(result) => print_result(&result),
                Err(e) => eprintln!("error: {e}"),
            },
            ChatInput::Invalid(msg) => eprintln!("error: {msg}"),
            ChatInput::Prompt(prompt) => {
                match thread.send_turn(prompt, TurnOptions::default()).await {
                    Ok(result) => print_result(&result),
                    Err(e) if e.is_auth() => return Err(e.into()),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
        }
    }

    client.close();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Quit,
    Candidates,
    Pick(usize),
    Invalid(String),
    Prompt(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        match line {
            "" => ChatInput::Empty,
            ":quit" | ":q" => ChatInput::Quit,
            ":candidates" => ChatInput::Candidates,
            _ => match line.strip_prefix(":pick") {
                Some(rest) => match rest.trim().parse() {
                    Ok(index) => ChatInput::Pick(index),
                    Err(_) => ChatInput::Invalid(format!("usage: :pick N (got {:?})", rest.trim())),
                },
                None => ChatInput::Prompt(line),
            },
        }
    }
}

fn print_result(result: &GenerationResult) {
    println!("{result}");
    for image in result.images() {
        println!("{image}");
    }
}

fn print_candidates(result: &GenerationResult) {
    for (index, candidate) in result.candidates().iter().enumerate() {
        let marker = if index == result.chosen_index() { "*" } else { " " };
        let preview = candidate.text.lines().next().unwrap_or("");
        println!("{marker} [{index}] {preview}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_input_commands() {
        assert_eq!(ChatInput::parse(""), ChatInput::Empty);
        assert_eq!(ChatInput::parse(":quit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse(":candidates"), ChatInput::Candidates);
        assert_eq!(ChatInput::parse(":pick 2"), ChatInput::Pick(2));
        assert!(matches!(ChatInput::parse(":pick x"), ChatInput::Invalid(_)));
        assert_eq!(ChatInput::parse("hello"), ChatInput::Prompt("hello"));
    }

    #[test]
    fn model_flag_overrides_config() {
        let mut config = GeminiWebConfig::default();
        config.model.default = "gemini-2.5-pro".into();
        assert_eq!(resolve_model(None, &config).unwrap(), Model::Gemini25Pro);
        assert_eq!(
            resolve_model(Some("gemini-2.0-flash"), &config).unwrap(),
            Model::Gemini20Flash
        );
        assert!(resolve_model(Some("nope"), &config).is_err());
    }
}
