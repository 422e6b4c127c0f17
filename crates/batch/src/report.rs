use chrono::{DateTime, Local};
use scanocr_core::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::orchestrator::{BatchJob, FileRecord, Outcome};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Writing the report did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Report write aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
}

impl OutcomeCounts {
    pub fn from_records(records: &[FileRecord]) -> Self {
        records.iter().fold(Self::default(), |mut c, r| {
            c.total += 1;
            match r.outcome {
                Outcome::Pending => c.pending += 1,
                Outcome::Success { .. } => c.succeeded += 1,
                Outcome::Failure(_) => c.failed += 1,
            }
            c
        })
    }
}

/// Final state of a run: every record, whatever its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub root: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub cancelled: bool,
    pub counts: OutcomeCounts,
    pub records: Vec<FileRecord>,
}

impl BatchReport {
    pub fn new(job: BatchJob, started_at: DateTime<Local>, finished_at: DateTime<Local>, cancelled: bool) -> Self {
        Self {
            counts: OutcomeCounts::from_records(&job.records),
            root: job.root,
            started_at,
            finished_at,
            cancelled,
            records: job.records,
        }
    }

    pub fn failures_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut by_kind = BTreeMap::new();
        for record in &self.records {
            if let Outcome::Failure(f) = &record.outcome {
                *by_kind.entry(f.kind).or_insert(0) += 1;
            }
        }
        by_kind
    }

    /// Pretty JSON, creating parent directories as needed. The filesystem
    /// work runs on a blocking thread bounded by `limit`.
    pub async fn write_json(&self, path: &Path, limit: Duration) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        let path = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || write_file(&path, &json));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ReportError::Aborted(join.to_string())),
            Err(_) => Err(ReportError::Timeout(limit)),
        }
    }

    pub fn log_summary(&self) {
        let elapsed = self.finished_at - self.started_at;
        info!(
            root = %self.root.display(),
            total = self.counts.total,
            succeeded = self.counts.succeeded,
            failed = self.counts.failed,
            pending = self.counts.pending,
            elapsed_ms = elapsed.num_milliseconds(),
            "Batch finished"
        );
        for (kind, count) in self.failures_by_kind() {
            warn!(kind = %kind, count, "Failures");
        }
        if self.cancelled {
            warn!(pending = self.counts.pending, "Run was cancelled before all files were sent");
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}
