//! Adapter and logging configuration.
//!
//! # Responsibility
//! - Describe connection options for the adapter and their defaults.
//! - Load options from JSON text or files.
//!
//! # Invariants
//! - Missing fields fall back to defaults; unknown fields are rejected.
//! - `keyspace` is never empty after loading.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1:9160";
pub const DEFAULT_KEYSPACE: &str = "test";
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, error: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, error } => {
                write!(f, "failed to read config `{}`: {error}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { error, .. } => Some(error),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Connection options for the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterOptions {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub user: String,
    pub password: String,
    pub timeout_ms: u64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_HOST.to_string()],
            keyspace: DEFAULT_KEYSPACE.to_string(),
            user: String::new(),
            password: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl AdapterOptions {
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = keyspace.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(text)?;
        options.validated()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.keyspace.trim().is_empty() {
            return Err(ConfigError::Invalid("keyspace cannot be empty".to_string()));
        }
        Ok(self)
    }
}

/// Logging options consumed by `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
    pub log_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: std::env::temp_dir().join("colmodel-logs"),
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
        path: path.to_path_buf(),
        error,
    })
}
