use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigError, LogFormat, LoggingConfig};

/// Install the process-wide tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns the path of
/// the per-run log file when one was opened.
pub fn init_logging(app_name: &str, config: &LoggingConfig) -> Result<Option<PathBuf>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let (log_path, log_file) = match &config.file_dir {
        Some(dir) => {
            let (path, file) = open_log_file(dir, &config.file_prefix, Local::now())?;
            (Some(path), Some(file))
        }
        None => (None, None),
    };

    let json = config.format == LogFormat::Json;
    let console = (config.to_console && !json).then(|| fmt::layer().with_target(false));
    let storage = (config.to_console && json).then_some(JsonStorageLayer);
    let bunyan = (config.to_console && json)
        .then(|| BunyanFormattingLayer::new(app_name.to_string(), std::io::stdout));
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(storage)
        .with(bunyan)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Invalid(format!("logging already initialized: {e}")))?;

    Ok(log_path)
}

/// `<prefix>_<YYYYmmddHHMMSS>.log`
pub fn log_file_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{prefix}_{}.log", now.format("%Y%m%d%H%M%S"))
}

fn open_log_file(
    dir: &Path,
    prefix: &str,
    now: DateTime<Local>,
) -> Result<(PathBuf, File), ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(log_file_name(prefix, now));
    let file = File::create(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_file_name_uses_compact_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name("ocr_processor", now), "ocr_processor_20240309070501.log");
    }

    #[test]
    fn open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("batch");
        let (path, _file) = open_log_file(&nested, "run", Local::now()).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&nested));
    }
}
