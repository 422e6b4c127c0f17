use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use scanocr_core::wire::{ErrorBody, PathBody, RecognizeResponse, RECOGNIZE_PATH};
use scanocr_core::{ComputeMode, Failure, FailureKind, LanguageSet};
use scanocr_ocr::{RecognitionRequest, RecognitionService};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BatchConfig, TransferMode};

/// Turns one file into its recognized text. The orchestrator only talks to
/// this seam, so every error is already a [`Failure`].
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    async fn recognize(&self, path: &Path) -> Result<String, Failure>;
}

// ── HTTP client ───────────────────────────────────────────────────────────────

pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    languages: String,
    compute: ComputeMode,
    transfer: TransferMode,
    io_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &BatchConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}{RECOGNIZE_PATH}", config.server_url.trim_end_matches('/')),
            languages: config.languages.to_string(),
            compute: config.compute_mode,
            transfer: config.transfer,
            io_timeout: config.io_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn read_upload(&self, path: &Path) -> Result<Vec<u8>, Failure> {
        match tokio::time::timeout(self.io_timeout, tokio::fs::read(path)).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Failure::not_found(format!("no such file: {}", path.display())))
            }
            Ok(Err(e)) => Err(Failure::recognition(format!("cannot read {}: {e}", path.display()))),
            Err(_) => Err(Failure::timeout(format!("reading {} timed out", path.display()))),
        }
    }
}

#[async_trait]
impl RecognitionClient for HttpClient {
    async fn recognize(&self, path: &Path) -> Result<String, Failure> {
        let compute = self.compute.to_string();
        let request = self
            .http
            .post(&self.endpoint)
            .query(&[("languages", self.languages.as_str()), ("computeMode", compute.as_str())]);

        let request = match self.transfer {
            TransferMode::Path => request.json(&PathBody { path: path.to_path_buf() }),
            TransferMode::Upload => {
                let data = self.read_upload(path).await?;
                request.header(CONTENT_TYPE, "application/octet-stream").body(data)
            }
        };

        let response = request.send().await.map_err(transport_failure)?;
        let status = response.status();
        if status == StatusCode::OK {
            let body: RecognizeResponse = response.json().await.map_err(transport_failure)?;
            return Ok(body.text);
        }

        let body = response.text().await.unwrap_or_default();
        Err(failure_from_error_response(status.as_u16(), &body))
    }
}

/// Map a non-200 answer onto a failure: the kind named in the body when it
/// parses, else the status mapping, else a recognition failure.
pub fn failure_from_error_response(status: u16, body: &str) -> Failure {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.into();
    }
    let kind = FailureKind::from_status(status).unwrap_or(FailureKind::RecognitionFailure);
    let reason = if body.trim().is_empty() {
        format!("server answered {status}")
    } else {
        format!("server answered {status}: {}", body.trim())
    };
    Failure::new(kind, reason)
}

fn transport_failure(e: reqwest::Error) -> Failure {
    if e.is_timeout() {
        Failure::timeout(e.to_string())
    } else if e.is_decode() {
        Failure::recognition(format!("malformed response: {e}"))
    } else {
        Failure::network(e.to_string())
    }
}

// ── In-process client ─────────────────────────────────────────────────────────

/// Calls a [`RecognitionService`] directly, with no server in between.
pub struct LocalClient {
    service: Arc<RecognitionService>,
    languages: LanguageSet,
    compute: ComputeMode,
}

impl LocalClient {
    pub fn new(service: Arc<RecognitionService>, languages: LanguageSet, compute: ComputeMode) -> Self {
        Self { service, languages, compute }
    }
}

#[async_trait]
impl RecognitionClient for LocalClient {
    async fn recognize(&self, path: &Path) -> Result<String, Failure> {
        let request = RecognitionRequest::from_path(path, self.languages.clone(), self.compute);
        self.service.recognize(request).await.map(|done| done.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_kind_wins() {
        let f = failure_from_error_response(500, r#"{"error":"decode_error","reason":"bad png"}"#);
        assert_eq!(f.kind, FailureKind::DecodeError);
        assert_eq!(f.reason, "bad png");
    }

    #[test]
    fn status_maps_when_body_is_not_json() {
        for (status, kind) in [
            (404, FailureKind::NotFound),
            (422, FailureKind::DecodeError),
            (503, FailureKind::ComputeUnavailable),
            (504, FailureKind::Timeout),
            (400, FailureKind::InvalidRequest),
            (500, FailureKind::RecognitionFailure),
            (418, FailureKind::RecognitionFailure),
        ] {
            assert_eq!(failure_from_error_response(status, "<html>oops</html>").kind, kind, "{status}");
        }
        assert_eq!(failure_from_error_response(502, "").reason, "server answered 502");
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let config = BatchConfig { server_url: "http://10.0.0.5:5000/".into(), ..BatchConfig::default() };
        let client = HttpClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://10.0.0.5:5000/recognize");
    }

    #[tokio::test]
    async fn upload_of_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = BatchConfig { transfer: TransferMode::Upload, ..BatchConfig::default() };
        let client = HttpClient::new(&config).unwrap();
        let err = client.recognize(&dir.path().join("gone.png")).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::NotFound);
    }
}
