//! Layered settings: built-in defaults, then an optional TOML file, then
//! command-line flags and environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use skirmish_system_tactics::TacticsConfig;

use crate::logging::LoggingConfig;

const DEFAULT_SERVER_URL: &str = "ws://localhost:8765";
const DEFAULT_SAFETY_MARGIN_MS: u64 = 50;

/// Command-line arguments of the bot.
#[derive(Debug, Default, Parser)]
#[command(name = "skirmish-bot", about = "Plays grid combat matches over a WebSocket")]
pub(crate) struct Args {
    /// Optional TOML settings file.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
    /// WebSocket address of the game server.
    #[arg(long, env = "SKIRMISH_SERVER_URL")]
    pub(crate) server_url: Option<String>,
    /// Team token used for authentication.
    #[arg(long, env = "SKIRMISH_TOKEN")]
    pub(crate) token: Option<String>,
    /// Display name of the bot.
    #[arg(long, env = "SKIRMISH_BOT_NAME")]
    pub(crate) bot_name: Option<String>,
    /// Milliseconds reserved for latency when bounding a decision.
    #[arg(long)]
    pub(crate) safety_margin_ms: Option<u64>,
    /// Seed for the tactical policy's random choices.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    token: Option<String>,
    bot_name: Option<String>,
    safety_margin_ms: Option<u64>,
    tactics: TacticsConfig,
    logging: LoggingConfig,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse config file {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Fully resolved settings of one bot process.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Settings {
    pub(crate) server_url: String,
    pub(crate) token: String,
    pub(crate) bot_name: String,
    pub(crate) safety_margin: Duration,
    pub(crate) tactics: TacticsConfig,
    pub(crate) logging: LoggingConfig,
}

impl Settings {
    /// Resolves the settings named by `args`, reading its config file if any.
    pub(crate) fn load(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::layer(file, args)
    }

    fn layer(file: FileConfig, args: Args) -> Result<Self> {
        let server_url = args
            .server_url
            .or(file.server_url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned());
        let Some(token) = args.token.or(file.token).filter(|token| !token.is_empty()) else {
            bail!("a team token is required (--token or SKIRMISH_TOKEN)");
        };
        let Some(bot_name) = args.bot_name.or(file.bot_name).filter(|name| !name.is_empty())
        else {
            bail!("a bot name is required (--bot-name or SKIRMISH_BOT_NAME)");
        };
        let safety_margin_ms = args
            .safety_margin_ms
            .or(file.safety_margin_ms)
            .unwrap_or(DEFAULT_SAFETY_MARGIN_MS);

        let mut tactics = file.tactics;
        if args.seed.is_some() {
            tactics.seed = args.seed;
        }
        tactics.validate().context("invalid [tactics] settings")?;

        Ok(Self {
            server_url,
            token,
            bot_name,
            safety_margin: Duration::from_millis(safety_margin_ms),
            tactics,
            logging: file.logging,
        })
    }

    /// Server address with the credentials appended as query parameters.
    pub(crate) fn connection_url(&self) -> String {
        format!(
            "{}?token={}&botName={}",
            self.server_url, self.token, self.bot_name
        )
    }
}
