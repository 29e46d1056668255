use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{keys, save_options, set_toggle, ConfigStore, Settings, TomlConfigStore};
use crate::error::{AppError, Result};
use crate::models::SaveOutcome;
use crate::remote::WebDavStore;
use crate::sync::{Confirm, FixedAnswer, SyncEngine};

#[derive(Debug, Parser)]
#[command(name = "thinknote", version, about = "Save bookmarks and thinks to a ThinkNote database on WebDAV")]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "THINKNOTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the outcome as a JSON object instead of a sentence
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Save a bookmark, overwriting an existing one with the same URL after confirmation
    Bookmark(BookmarkArgs),
    /// Save a think with an explicit title
    Think(ThinkArgs),
    /// Save selected text from stdin as a think titled after its first line
    Selection,
    /// Show or change WebDAV options and display toggles
    #[command(subcommand)]
    Options(OptionsCommand),
}

#[derive(Debug, Args)]
pub struct BookmarkArgs {
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// Comma separated tags
    #[arg(long, default_value = "")]
    pub tags: String,
    /// Overwrite an existing bookmark without asking
    #[arg(long, conflicts_with = "no")]
    pub yes: bool,
    /// Keep an existing bookmark without asking
    #[arg(long)]
    pub no: bool,
}

#[derive(Debug, Args)]
pub struct ThinkArgs {
    #[arg(long)]
    pub title: String,
    /// Think body; read from stdin when omitted
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum OptionsCommand {
    Show,
    Set(SetOptionsArgs),
    /// Flip one display toggle
    Toggle {
        #[arg(value_enum)]
        toggle: Toggle,
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Args)]
pub struct SetOptionsArgs {
    #[arg(long)]
    pub webdav_url: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long, env = "THINKNOTE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long)]
    pub dark_mode: Option<bool>,
    #[arg(long)]
    pub eink_mode: Option<bool>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    DarkMode,
    EinkMode,
}

impl Toggle {
    fn key(self) -> &'static str {
        match self {
            Toggle::DarkMode => keys::DARK_MODE,
            Toggle::EinkMode => keys::EINK_MODE,
        }
    }
}

/// Prompts on the terminal and reads the answer from stdin.
pub struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        let prompt = format!("{}\n\n{}\n\nOverwrite? [y/N] ", title, message);
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stderr = io::stderr();
            stderr.write_all(prompt.as_bytes())?;
            stderr.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn engine(store: Arc<dyn ConfigStore>, confirm: Arc<dyn Confirm>) -> Result<SyncEngine> {
    Ok(SyncEngine::new(store, Arc::new(WebDavStore::new()?), confirm))
}

fn describe(settings: &Settings) -> String {
    format!(
        "webdav_url = {}\nusername   = {}\npassword   = {}\ndark_mode  = {}\neink_mode  = {}",
        settings.webdav_url.as_deref().unwrap_or("(not set)"),
        settings.username,
        if settings.password.is_empty() { "(not set)" } else { "********" },
        settings.dark_mode,
        settings.eink_mode,
    )
}

fn render(outcome: SaveOutcome, json: bool) -> Result<String> {
    if json {
        let mut value = serde_json::to_value(outcome)?;
        value["message"] = serde_json::Value::String(outcome.to_string());
        Ok(value.to_string())
    } else {
        Ok(outcome.to_string())
    }
}

/// Execute one command and return the line to print on success.
pub async fn run(cli: Cli) -> Result<String> {
    let json = cli.json;
    let path = cli.config.unwrap_or_else(TomlConfigStore::default_path);
    let store: Arc<dyn ConfigStore> = Arc::new(TomlConfigStore::new(path));

    match cli.command {
        Command::Bookmark(args) => {
            let confirm: Arc<dyn Confirm> = if args.yes {
                Arc::new(FixedAnswer(true))
            } else if args.no {
                Arc::new(FixedAnswer(false))
            } else {
                Arc::new(TerminalConfirm)
            };
            let outcome = engine(store, confirm)?
                .save_bookmark(&args.url, &args.title, &args.description, &args.tags)
                .await?;
            render(outcome, json)
        }
        Command::Think(args) => {
            let content = match args.content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let outcome = engine(store, Arc::new(FixedAnswer(false)))?
                .save_think(&args.title, &content)
                .await?;
            render(outcome, json)
        }
        Command::Selection => {
            let selection = read_stdin()?;
            let outcome = engine(store, Arc::new(FixedAnswer(false)))?
                .save_selection(&selection)
                .await?;
            render(outcome, json)
        }
        Command::Options(OptionsCommand::Show) => {
            let settings = Settings::load(store.as_ref())?;
            Ok(describe(&settings))
        }
        Command::Options(OptionsCommand::Set(args)) => {
            let mut settings = Settings::load(store.as_ref())?;
            if let Some(url) = args.webdav_url {
                settings.webdav_url = Some(url);
            }
            if let Some(username) = args.username {
                settings.username = username;
            }
            if let Some(password) = args.password {
                settings.password = password;
            }
            if let Some(dark_mode) = args.dark_mode {
                settings.dark_mode = dark_mode;
            }
            if let Some(eink_mode) = args.eink_mode {
                settings.eink_mode = eink_mode;
            }
            save_options(store.as_ref(), &settings)?;
            Ok("Your options have been saved successfully.".to_string())
        }
        Command::Options(OptionsCommand::Toggle { toggle, enabled }) => {
            set_toggle(store.as_ref(), toggle.key(), enabled)?;
            Ok(format!("{} = {}", toggle.key(), enabled))
        }
    }
}

/// Map an error to the message printed for the user.
pub fn report(err: &AppError, json: bool) -> String {
    if json {
        return serde_json::json!({
            "outcome": err.kind(),
            "message": err.to_string(),
        })
        .to_string();
    }
    match err {
        AppError::UserCancelled(reason) => format!("Nothing saved: {}", reason),
        other => format!("Error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bookmark() {
        let cli = Cli::try_parse_from([
            "thinknote", "bookmark", "--url", "https://example.com", "--title", "Example",
            "--tags", "a,b", "--yes",
        ])
        .unwrap();
        match cli.command {
            Command::Bookmark(args) => {
                assert_eq!(args.tags, "a,b");
                assert!(args.yes);
                assert_eq!(args.description, "");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_yes_and_no_conflict() {
        assert!(Cli::try_parse_from([
            "thinknote", "bookmark", "--url", "u", "--title", "t", "--yes", "--no",
        ])
        .is_err());
    }

    #[tokio::test]
    async fn test_options_set_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        let config_arg = config.to_string_lossy().to_string();

        let set = Cli::try_parse_from([
            "thinknote", "--config", &config_arg, "options", "set",
            "--webdav-url", "https://dav.example.com//me/", "--username", "me",
            "--dark-mode", "false",
        ])
        .unwrap();
        run(set).await.unwrap();

        let show = Cli::try_parse_from(["thinknote", "--config", &config_arg, "options", "show"])
            .unwrap();
        let output = run(show).await.unwrap();
        assert!(output.contains("https://dav.example.com/me"));
        assert!(output.contains("dark_mode  = false"));
    }

    #[tokio::test]
    async fn test_think_without_config_is_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_arg = dir.path().join("none.toml").to_string_lossy().to_string();
        let cli = Cli::try_parse_from([
            "thinknote", "--config", &config_arg, "think", "--title", "T", "--content", "C",
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, AppError::MissingConfig));
    }

    #[test]
    fn test_cancel_is_not_reported_as_error() {
        let message = report(&AppError::UserCancelled("kept existing bookmark".into()), false);
        assert!(message.starts_with("Nothing saved"));
    }

    #[test]
    fn test_json_rendering() {
        let line = render(SaveOutcome::BookmarkUpdated { id: 9 }, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["outcome"], "bookmark_updated");
        assert_eq!(value["id"], 9);
        assert_eq!(value["message"], "Bookmark #9 updated");

        let line = report(&AppError::RemoteWriteFailed("HTTP 507".into()), true);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["outcome"], "remote_write_failed");
    }
}
