pub mod client;
pub mod config;
pub mod orchestrator;
pub mod report;
pub mod walk;

pub use client::{failure_from_error_response, HttpClient, LocalClient, RecognitionClient};
pub use config::{BatchConfig, TransferMode};
pub use orchestrator::{run, BatchJob, FileRecord, Outcome, OutcomeSink, RunOptions, TracingSink};
pub use report::{BatchReport, OutcomeCounts, ReportError};
pub use walk::{enumerate, walk, ExtensionFilter, WalkError};
