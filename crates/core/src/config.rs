use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Read and deserialize a TOML config file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON lines on stdout.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `debug`, `info`, `warning`, `error` or `critical`; anything else means `info`.
    pub level: String,
    pub to_console: bool,
    pub format: LogFormat,
    /// Directory for a per-run log file. No file is written when unset.
    pub file_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            to_console: true,
            format: LogFormat::Pretty,
            file_dir: None,
            file_prefix: "scanocr".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Map the configured level onto a tracing level name.
    pub fn level_name(&self) -> &'static str {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" | "critical" => "error",
            _ => "info",
        }
    }

    /// Default `EnvFilter` directives: the configured level, with chatty
    /// transport crates held at `warn`.
    pub fn filter_directives(&self) -> String {
        format!("{},hyper=warn,h2=warn,reqwest=warn,rustls=warn", self.level_name())
    }
}

/// CPU and memory ceilings carried in configuration.
///
/// These are logged at startup and otherwise passed through untouched;
/// nothing enforces them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub cpu_use_percent: Option<u8>,
    pub memory_use_percent: Option<u8>,
}
