use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;
use thiserror::Error;

use crate::{collector::BoundsPolicy, report::DEFAULT_PROGRESS_WIDTH};

/// Errors raised while reading `budget.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (filesystem).
    #[error("reading config {}: {source}", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// TOML parsing failure.
    #[error("parsing config {}: {source}", path.display())]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// Parsed but semantically invalid.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Application settings. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    /// Regression artifact to load.
    pub model_path: PathBuf,
    /// JSON-lines log destination.
    pub log_path: PathBuf,
    /// Lowest level written to the log.
    pub log_level: LogLevel,
    /// Optional JSON-lines event log for prediction outcomes.
    pub event_log: Option<PathBuf>,
    /// Handling of out-of-range numeric entry.
    pub bounds_policy: BoundsPolicy,
    /// Width of the text progress bar.
    pub progress_width: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/event_budget_predictor.json"),
            log_path: PathBuf::from("logs/budget.log.jsonl"),
            log_level: LogLevel::Info,
            event_log: None,
            bounds_policy: BoundsPolicy::default(),
            progress_width: DEFAULT_PROGRESS_WIDTH,
        }
    }
}

impl BudgetConfig {
    /// Loads a TOML file; relative paths inside it resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.model_path = resolve(base, &config.model_path);
        config.log_path = resolve(base, &config.log_path);
        config.event_log = config.event_log.map(|event_log| resolve(base, &event_log));
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Parses TOML text without path resolution.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=200).contains(&self.progress_width) {
            return Err(ConfigError::Invalid(format!(
                "progress_width must be within 1..=200, got {}",
                self.progress_width
            )));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("model_path must not be empty".into()));
        }
        Ok(())
    }
}

fn resolve(base: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}
