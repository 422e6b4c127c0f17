use futures::stream::{self, StreamExt};
use futures::FutureExt;
use scanocr_core::Failure;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::RecognitionClient;
use crate::walk::{enumerate, ExtensionFilter, WalkError};

/// Result of one file. Every record starts `Pending` and is written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Success { text: String },
    Failure(Failure),
}

impl Outcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub outcome: Outcome,
}

impl FileRecord {
    pub fn pending(path: PathBuf) -> Self {
        Self { path, outcome: Outcome::Pending }
    }
}

/// The files of one run, in enumeration order.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub root: PathBuf,
    pub extensions: ExtensionFilter,
    pub records: Vec<FileRecord>,
}

impl BatchJob {
    /// Enumerate `root` under `io_timeout` and start every match as `Pending`.
    pub async fn discover(root: PathBuf, extensions: ExtensionFilter, io_timeout: Duration) -> Result<Self, WalkError> {
        let paths = enumerate(root.clone(), extensions.clone(), io_timeout).await?;
        Ok(Self::from_paths(root, extensions, paths))
    }

    pub fn from_paths(root: PathBuf, extensions: ExtensionFilter, paths: Vec<PathBuf>) -> Self {
        Self {
            root,
            extensions,
            records: paths.into_iter().map(FileRecord::pending).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Receives each outcome as soon as the collector records it.
pub trait OutcomeSink: Send {
    fn record(&mut self, record: &FileRecord);
}

/// One log event per recorded outcome.
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn record(&mut self, record: &FileRecord) {
        match &record.outcome {
            Outcome::Success { text } => {
                info!(path = %record.path.display(), chars = text.chars().count(), "OCR result: {text}")
            }
            Outcome::Failure(f) => {
                warn!(path = %record.path.display(), kind = %f.kind, "OCR failed: {}", f.reason)
            }
            Outcome::Pending => {}
        }
    }
}

impl OutcomeSink for Vec<FileRecord> {
    fn record(&mut self, record: &FileRecord) {
        self.push(record.clone());
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Requests in flight at once; 1 processes files strictly in order.
    pub concurrency: usize,
    pub request_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { concurrency: 1, request_timeout: Duration::from_secs(300) }
    }
}

/// Send every pending record to `client` and record its outcome.
///
/// This loop is the only writer of `job.records`. After `cancel` fires no new
/// request is issued; in-flight ones still complete and are recorded, and
/// the rest stay `Pending`. Returns `false` when the run was cancelled.
pub async fn run<C>(
    job: &mut BatchJob,
    client: &C,
    options: &RunOptions,
    sink: &mut dyn OutcomeSink,
    cancel: &CancellationToken,
) -> bool
where
    C: RecognitionClient + ?Sized,
{
    let work: Vec<(usize, PathBuf)> = job
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.outcome.is_pending())
        .map(|(i, r)| (i, r.path.clone()))
        .collect();

    let timeout = options.request_timeout;
    let mut results = stream::iter(work)
        .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
        .map(|(index, path)| async move {
            let outcome = attempt(client, &path, timeout).await;
            (index, outcome)
        })
        .buffer_unordered(options.concurrency.max(1));

    while let Some((index, outcome)) = results.next().await {
        let record = &mut job.records[index];
        record.outcome = outcome;
        sink.record(record);
    }

    !cancel.is_cancelled()
}

async fn attempt<C>(client: &C, path: &Path, limit: Duration) -> Outcome
where
    C: RecognitionClient + ?Sized,
{
    let call = AssertUnwindSafe(client.recognize(path)).catch_unwind();
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(Ok(text))) => Outcome::Success { text },
        Ok(Ok(Err(failure))) => Outcome::Failure(failure),
        Ok(Err(_panic)) => Outcome::Failure(Failure::recognition("client panicked")),
        Err(_) => Outcome::Failure(Failure::timeout(format!(
            "no response within {}s",
            limit.as_secs_f32()
        ))),
    }
}
