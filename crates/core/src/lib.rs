pub mod compute;
pub mod config;
pub mod failure;
pub mod language;
pub mod telemetry;
pub mod wire;

pub use compute::{BinarizationDecision, ComputeDevice, ComputeMode};
pub use config::{load_toml, ConfigError, LogFormat, LoggingConfig, ResourceLimits};
pub use failure::{Failure, FailureKind};
pub use language::{Language, LanguageError, LanguageSet};
pub use telemetry::init_logging;
