//! Logging initialization
//!
//! Console output goes through `tracing-subscriber` in pretty, compact or
//! JSON form; an optional plain-text file layer mirrors it. `RUST_LOG`
//! overrides the configured level when set.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Colored console output
    pub ansi: bool,
    /// Mirror log output into this file
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            ansi: true,
            file: None,
        }
    }
}

impl LogConfig {
    /// Apply the server's `--debug` / `--mute` switches. Debug wins.
    pub fn with_switches(mut self, debug: bool, mute: bool) -> Self {
        if debug {
            self.level = LogLevel::Debug;
        } else if mute {
            self.level = LogLevel::Error;
        }
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

/// Path of a session log file: `<dir>/server[-debug] %Y-%m-%d %H %M %S.log`
pub fn session_log_path<Tz>(dir: &Path, debug: bool, started: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let stem = if debug { "server-debug" } else { "server" };
    dir.join(format!("{stem} {}.log", started.format("%Y-%m-%d %H %M %S")))
}

/// Install the global subscriber.
///
/// Fails only when the log file cannot be created. A subscriber that is
/// already installed is left in place.
pub fn init_logging(config: &LogConfig) -> std::io::Result<()> {
    let console = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_ansi(config.ansi).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_ansi(config.ansi).boxed(),
        LogFormat::Json => fmt::layer().json().with_ansi(false).boxed(),
    };

    let file = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let writer = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(writer)))
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(config.env_filter())
        .try_init();

    Ok(())
}
