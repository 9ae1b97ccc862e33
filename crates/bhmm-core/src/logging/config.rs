//! Where log settings come from: `BHMM_LOG`, `RUST_LOG` and
//! `BHMM_LOG_FORMAT` in the environment, then `--log-level`, `--log-format`,
//! `-v` and `-q` on the command line.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing_subscriber::filter::LevelFilter;

/// Rendering of log records on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[value(alias = "pretty")]
    Human,
    /// One JSON object per line, for batch pipelines.
    #[value(alias = "json")]
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[value(alias = "quiet")]
    Off,
    Error,
    #[value(alias = "warning")]
    Warn,
    /// Run lifecycle plus sampler progress.
    #[default]
    Info,
    /// Adds per-stage timings of every Gibbs cycle.
    Debug,
    Trace,
}

impl LogLevel {
    /// Level implied by `-q` and a count of `-v` flags. `None` leaves the
    /// environment in charge.
    pub fn from_verbosity(quiet: bool, verbose: u8) -> Option<Self> {
        if quiet {
            return Some(LogLevel::Error);
        }
        match verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn value_name<T: ValueEnum>(value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.to_possible_value() {
        Some(v) => f.write_str(v.get_name()),
        None => Ok(()),
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        value_name(self, f)
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        value_name(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Timestamps on human output; JSONL records always carry one.
    pub timestamps: bool,
    /// A `RUST_LOG` value that is a full directive (`sampler.update=trace`)
    /// rather than a bare level.
    pub directive: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
            directive: None,
        }
    }
}

impl LogConfig {
    /// Precedence, lowest first: defaults, `RUST_LOG`, `BHMM_LOG`, CLI.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self::resolve(
            var("BHMM_LOG").as_deref(),
            var("RUST_LOG").as_deref(),
            var("BHMM_LOG_FORMAT").as_deref(),
            cli_level,
            cli_format,
        )
    }

    fn resolve(
        bhmm_log: Option<&str>,
        rust_log: Option<&str>,
        format: Option<&str>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = LogConfig::default();

        if let Some(raw) = rust_log.map(str::trim).filter(|v| !v.is_empty()) {
            match LogLevel::from_str(raw, true) {
                Ok(level) => config.level = level,
                Err(_) => config.directive = Some(raw.to_string()),
            }
        }
        if let Some(level) = bhmm_log.and_then(|v| LogLevel::from_str(v.trim(), true).ok()) {
            config.level = level;
            config.directive = None;
        }
        if let Some(fmt) = format.and_then(|v| LogFormat::from_str(v.trim(), true).ok()) {
            config.format = fmt;
        }

        if let Some(level) = cli_level {
            config.level = level;
            config.directive = None;
        }
        config.format = cli_format.unwrap_or(config.format);
        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Directive for `EnvFilter`: the raw `RUST_LOG` string if one survived,
    /// else the bare level.
    pub fn filter_directive(&self) -> String {
        match &self.directive {
            Some(d) => d.clone(),
            None => self.level.to_string(),
        }
    }
}
