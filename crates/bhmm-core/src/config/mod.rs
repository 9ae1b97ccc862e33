//! Configuration loading and validation for bhmm-core.
//!
//! This module handles:
//! - Loading sampler configuration from TOML or JSON files
//! - Config resolution order (CLI > config file > env > defaults)
//! - Semantic validation of the resolved values

pub mod sampler;
pub mod validation;

pub use sampler::{KernelKind, OutputModelType, SamplerConfig};
pub use validation::{validate_sampler_config, ValidationError};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a default config file.
pub const CONFIG_ENV_VAR: &str = "BHMM_CONFIG";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Unsupported config format for {path} (expected .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound { .. } => 10,
            ConfigError::UnsupportedFormat { .. } => 11,
            ConfigError::ParseError { .. } => 12,
            ConfigError::ValidationError(_) => 13,
            ConfigError::IoError { .. } => 14,
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority after CLI flags).
    pub config_path: Option<PathBuf>,
    /// Skip the `BHMM_CONFIG` lookup.
    pub ignore_env: bool,
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The loaded sampler configuration (not yet overridden by CLI flags).
    pub sampler: SamplerConfig,
    /// File the configuration came from (None if using defaults).
    pub source_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit `--config` path (via ConfigOptions)
/// 2. Environment variable (BHMM_CONFIG)
/// 3. Built-in defaults
///
/// CLI value flags are applied by the caller on top of the result, and the
/// final merged configuration is validated again there.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let path = match &options.config_path {
        Some(path) => Some(path.clone()),
        None if !options.ignore_env => std::env::var(CONFIG_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from),
        None => None,
    };

    match path {
        Some(path) => {
            let sampler = load_config_file(&path)?;
            Ok(ResolvedConfig {
                sampler,
                source_path: Some(path),
            })
        }
        None => Ok(ResolvedConfig {
            sampler: SamplerConfig::default(),
            source_path: None,
        }),
    }
}

/// Load and validate a sampler configuration from a `.toml` or `.json` file.
pub fn load_config_file(path: &Path) -> Result<SamplerConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let config: SamplerConfig = match extension.as_deref() {
        Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        Some("json") => serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    validate_sampler_config(&config)?;
    Ok(config)
}
