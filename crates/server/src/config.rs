use scanocr_core::{load_toml, ComputeMode, ConfigError, LanguageSet, LoggingConfig, ResourceLimits};
use scanocr_ocr::pool::DEFAULT_MAX_IDLE_ENGINES;
use scanocr_ocr::recognizer::{MockFactory, OcrError, RecognizerFactory};
use scanocr_ocr::{BinarizeOptions, ComputeDevices, ComputePolicy, ServiceOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// `server.toml`. Every field has a default, so a partial file is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub default_languages: LanguageSet,
    pub default_compute: ComputeMode,
    pub allow_cpu_fallback: bool,
    /// Overrides the GPU probe when set.
    pub gpu_devices: Option<usize>,
    pub cpu_workers: Option<usize>,
    pub inference_timeout_secs: u64,
    pub io_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub max_dimension: Option<u32>,
    /// Idle engines kept across all language sets; the least recently used goes first.
    pub max_idle_engines: usize,
    pub binarize: BinarizeOptions,
    pub engine: EngineConfig,
    #[serde(flatten)]
    pub limits: ResourceLimits,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".into(),
            default_languages: LanguageSet::default(),
            default_compute: ComputeMode::Auto,
            allow_cpu_fallback: false,
            gpu_devices: None,
            cpu_workers: None,
            inference_timeout_secs: 120,
            io_timeout_secs: 30,
            max_body_bytes: 32 * 1024 * 1024,
            max_dimension: None,
            max_idle_engines: DEFAULT_MAX_IDLE_ENGINES,
            binarize: BinarizeOptions::default(),
            engine: EngineConfig::default(),
            limits: ResourceLimits::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference_timeout_secs == 0 || self.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be positive".into()));
        }
        if self.max_idle_engines == 0 {
            return Err(ConfigError::Invalid("max_idle_engines must be at least 1".into()));
        }
        if self.cpu_workers == Some(0) {
            return Err(ConfigError::Invalid("cpu_workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn devices(&self) -> ComputeDevices {
        ComputeDevices::detect(self.gpu_devices, self.cpu_workers)
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            binarize: self.binarize.clone(),
            max_dimension: self.max_dimension,
            policy: ComputePolicy { allow_cpu_fallback: self.allow_cpu_fallback },
            io_timeout: Duration::from_secs(self.io_timeout_secs),
            inference_timeout: Duration::from_secs(self.inference_timeout_secs),
            max_idle_engines: self.max_idle_engines,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Returns `mock_text` for every image.
    Mock,
    Tesseract,
}

impl Default for EngineKind {
    fn default() -> Self {
        if cfg!(feature = "tesseract") {
            EngineKind::Tesseract
        } else {
            EngineKind::Mock
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Directory holding `*.traineddata`; the library default when unset.
    pub tessdata: Option<String>,
    pub mock_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            tessdata: None,
            mock_text: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn build_factory(&self) -> Result<Arc<dyn RecognizerFactory>, OcrError> {
        match self.kind {
            EngineKind::Mock => Ok(Arc::new(MockFactory::new(self.mock_text.clone()))),
            EngineKind::Tesseract => tesseract_factory(self.tessdata.clone()),
        }
    }
}

#[cfg(feature = "tesseract")]
fn tesseract_factory(data_path: Option<String>) -> Result<Arc<dyn RecognizerFactory>, OcrError> {
    use scanocr_ocr::recognizer::tesseract_backend::TesseractFactory;
    Ok(Arc::new(TesseractFactory::new(data_path)))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_factory(_data_path: Option<String>) -> Result<Arc<dyn RecognizerFactory>, OcrError> {
    Err(OcrError::NotAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind = "127.0.0.1:6000"
default_languages = ["ko"]
allow_cpu_fallback = true
gpu_devices = 0
cpu_use_percent = 80

[binarize]
window = 15

[engine]
kind = "mock"
mock_text = "hello"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.bind, "127.0.0.1:6000");
        assert_eq!(config.default_languages.to_string(), "ko");
        assert_eq!(config.default_compute, ComputeMode::Auto);
        assert!(config.allow_cpu_fallback);
        assert_eq!(config.binarize.window, 15);
        assert_eq!(config.binarize.bias, 2);
        assert_eq!(config.engine.kind, EngineKind::Mock);
        assert_eq!(config.limits.cpu_use_percent, Some(80));
        assert_eq!(config.limits.memory_use_percent, None);
        assert_eq!(config.io_timeout_secs, 30);
        assert_eq!(config.devices().gpus, 0);
        assert_eq!(config.engine.build_factory().unwrap().name(), "mock");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(&dir.path().join("server.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_languages = []").unwrap();
        assert!(matches!(ServerConfig::load(file.path()), Err(ConfigError::Parse { .. })));

        let config = ServerConfig { io_timeout_secs: 0, ..ServerConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn service_options_carry_timeouts() {
        let options = ServerConfig::default().service_options();
        assert_eq!(options.inference_timeout, Duration::from_secs(120));
        assert_eq!(options.io_timeout, Duration::from_secs(30));
        assert!(!options.policy.allow_cpu_fallback);
        assert_eq!(options.max_idle_engines, DEFAULT_MAX_IDLE_ENGINES);
    }

    #[test]
    fn idle_engine_cap_is_configurable_but_not_zero() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_idle_engines = 2").unwrap();
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.service_options().max_idle_engines, 2);

        let config = ServerConfig { max_idle_engines: 0, ..ServerConfig::default() };
        assert!(config.validate().is_err());
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn tesseract_without_feature_is_unavailable() {
        let engine = EngineConfig { kind: EngineKind::Tesseract, ..EngineConfig::default() };
        assert!(matches!(engine.build_factory(), Err(OcrError::NotAvailable)));
    }
}
