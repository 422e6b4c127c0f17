//! JSON shapes exchanged between the recognition server and its clients.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compute::{BinarizationDecision, ComputeDevice};
use crate::failure::{Failure, FailureKind};

pub const RECOGNIZE_PATH: &str = "/recognize";
/// Path-only endpoint kept for clients of the first deployment.
pub const LEGACY_OCR_PATH: &str = "/perform_ocr/";
pub const HEALTH_PATH: &str = "/health";

/// Query parameters of `POST /recognize`. Both are parsed by the handler so
/// that malformed values map onto the failure taxonomy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeParams {
    /// Comma-separated language codes, e.g. `en,ko`.
    pub languages: Option<String>,
    pub compute_mode: Option<String>,
}

/// JSON body for a path-based request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathBody {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub text: String,
    pub decision: BinarizationDecision,
    pub compute: ComputeDevice,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyParams {
    pub image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyResponse {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: FailureKind,
    pub reason: String,
}

impl From<Failure> for ErrorBody {
    fn from(f: Failure) -> Self {
        ErrorBody { error: f.kind, reason: f.reason }
    }
}

impl From<ErrorBody> for Failure {
    fn from(body: ErrorBody) -> Self {
        Failure::new(body.error, body.reason)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    pub gpu_devices: usize,
    pub cpu_workers: usize,
}
