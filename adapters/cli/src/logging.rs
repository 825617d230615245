use std::{
    fs::{File, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const WRAPPER_TARGETS: [&str; 3] = ["skirmish_bot", "skirmish_protocol", "skirmish_wire"];
const AI_TARGETS: [&str; 4] = [
    "skirmish_core",
    "skirmish_system_safety_map",
    "skirmish_system_armament",
    "skirmish_system_tactics",
];

/// `[logging]` section of the settings file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LoggingConfig {
    /// Level of the connection and protocol crates.
    pub(crate) wrapper_level: String,
    /// Level of the decision crates.
    pub(crate) ai_level: String,
    /// File the log is appended to.
    pub(crate) log_file: PathBuf,
    /// Whether to write `log_file` at all.
    pub(crate) log_to_file: bool,
    /// Whether to also log to the console.
    pub(crate) log_to_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            wrapper_level: "info".to_owned(),
            ai_level: "info".to_owned(),
            log_file: PathBuf::from("wrapper.log"),
            log_to_file: true,
            log_to_console: true,
        }
    }
}

impl LoggingConfig {
    fn directives(&self) -> String {
        let wrapper = WRAPPER_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.wrapper_level));
        let ai = AI_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.ai_level));
        std::iter::once("warn".to_owned())
            .chain(wrapper)
            .chain(ai)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> Result<EnvFilter> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return EnvFilter::try_from_default_env().context("invalid RUST_LOG directives");
        }
        EnvFilter::try_new(self.directives()).context("invalid [logging] levels")
    }
}

/// Installs the global subscriber: console output and an appended log file.
pub(crate) fn init(config: &LoggingConfig) -> Result<()> {
    let file = if config.log_to_file {
        Some(open_log_file(config)?)
    } else {
        None
    };

    let console = config.log_to_console.then(fmt::layer);
    let file = file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install the log subscriber")
}

fn open_log_file(config: &LoggingConfig) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))
}
