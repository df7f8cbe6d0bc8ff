//! # Runtime Configuration Module
//!
//! Runtime configuration for the dispatch engine, loaded from an optional YAML
//! file and overridden by environment variables.
//!
//! ## Environment Variables
//!
//! ### `BRRTD_ENV`
//!
//! `development` or `production` (default). Development mode enables the
//! diagnostics middleware's error page.
//!
//! ### `BRRTD_STACK_SIZE`
//!
//! Stack size for every coroutine the engine spawns (per-exchange coroutines
//! and deferred action coroutines). Accepts decimal (`65536`) or hex (`0x10000`).
//!
//! Default: `0x10000` (64 KB)
//!
//! Logging variables (`BRRTD_LOG_*`) are documented in [`crate::logging`].
//!
//! ## YAML file
//!
//! ```yaml
//! environment: development
//! stack_size: 0x8000
//! log:
//!   level: debug
//!   format: pretty
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use brrtdispatch::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logging::LogConfig;

/// Default coroutine stack size (64 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Hosting environment. Controls developer-facing diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub environment: Environment,
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            stack_size: DEFAULT_STACK_SIZE,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    environment: Option<Environment>,
    stack_size: Option<StackSize>,
    log: Option<LogConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StackSize {
    Bytes(usize),
    Text(String),
}

impl RuntimeConfig {
    /// Load configuration from environment variables on top of defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Load configuration from a YAML file, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Parse a YAML document into a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or an unparsable `stack_size`.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(text)?;
        let mut config = Self::default();
        if let Some(environment) = file.environment {
            config.environment = environment;
        }
        match file.stack_size {
            Some(StackSize::Bytes(n)) => config.stack_size = n,
            Some(StackSize::Text(s)) => {
                config.stack_size = parse_stack_size(&s)
                    .with_context(|| format!("invalid stack_size '{s}'"))?;
            }
            None => {}
        }
        if let Some(log) = file.log {
            config.log = log;
        }
        Ok(config)
    }

    /// Load the optional file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Propagates file loading errors.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply `BRRTD_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(environment) = lookup("BRRTD_ENV").as_deref().and_then(Environment::parse) {
            self.environment = environment;
        }
        if let Some(size) = lookup("BRRTD_STACK_SIZE")
            .as_deref()
            .and_then(parse_stack_size)
        {
            self.stack_size = size;
        }
        self.log.apply_overrides(&lookup);
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal byte count.
#[must_use]
pub fn parse_stack_size(s: &str) -> Option<usize> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
