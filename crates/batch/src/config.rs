use scanocr_core::{load_toml, ComputeMode, ConfigError, LanguageSet, LoggingConfig, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a file reaches the recognition server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Send `{"path": ...}`; the server reads the file from a shared filesystem.
    #[default]
    Path,
    /// Read the file locally and post its bytes.
    Upload,
}

/// `config.toml` for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub root_path: PathBuf,
    /// Joined onto `root_path`; the root itself is scanned when unset.
    pub source_path: Option<PathBuf>,
    pub image_extensions: Vec<String>,
    pub server_url: String,
    pub languages: LanguageSet,
    pub compute_mode: ComputeMode,
    pub transfer: TransferMode,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
    pub report_path: Option<PathBuf>,
    #[serde(flatten)]
    pub limits: ResourceLimits,
    pub logging: LoggingConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            source_path: None,
            image_extensions: [".png", ".jpg", ".jpeg", ".tif", ".tiff", ".bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            server_url: "http://127.0.0.1:5000".into(),
            languages: LanguageSet::default(),
            compute_mode: ComputeMode::Auto,
            transfer: TransferMode::Path,
            concurrency: 1,
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
            io_timeout_secs: 60,
            report_path: None,
            limits: ResourceLimits::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.image_extensions.iter().all(|e| e.trim().trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid("image_extensions is empty".into()));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 || self.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "server_url must be an http(s) URL: '{}'",
                self.server_url
            )));
        }
        Ok(())
    }

    /// Directory that is scanned for images.
    pub fn source_dir(&self) -> PathBuf {
        match &self.source_path {
            Some(sub) => self.root_path.join(sub),
            None => self.root_path.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}
