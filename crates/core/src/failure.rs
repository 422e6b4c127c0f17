use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Every way a single recognition can fail. Both the service boundary and
/// the batch orchestrator convert errors into one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bytes are not a decodable image.
    DecodeError,
    /// The requested compute mode has no device behind it.
    ComputeUnavailable,
    /// The recognition engine itself failed.
    RecognitionFailure,
    /// A path-based request named a file that does not exist.
    NotFound,
    /// No result within the configured bound.
    Timeout,
    /// The service could not be reached or the exchange broke off.
    NetworkError,
    /// The request was rejected before any work was done.
    InvalidRequest,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::DecodeError => "decode_error",
            FailureKind::ComputeUnavailable => "compute_unavailable",
            FailureKind::RecognitionFailure => "recognition_failure",
            FailureKind::NotFound => "not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::NetworkError => "network_error",
            FailureKind::InvalidRequest => "invalid_request",
        }
    }

    /// HTTP status the recognition endpoint answers with for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            FailureKind::InvalidRequest => 400,
            FailureKind::NotFound => 404,
            FailureKind::DecodeError => 422,
            FailureKind::RecognitionFailure => 500,
            FailureKind::NetworkError => 502,
            FailureKind::ComputeUnavailable => 503,
            FailureKind::Timeout => 504,
        }
    }

    /// Inverse of [`FailureKind::status_code`], for responses without a usable body.
    pub fn from_status(code: u16) -> Option<Self> {
        match code {
            400 => Some(FailureKind::InvalidRequest),
            404 => Some(FailureKind::NotFound),
            422 => Some(FailureKind::DecodeError),
            500 => Some(FailureKind::RecognitionFailure),
            502 => Some(FailureKind::NetworkError),
            503 => Some(FailureKind::ComputeUnavailable),
            504 => Some(FailureKind::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure kind plus the human-readable reason behind it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {reason}")]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::DecodeError, reason)
    }

    pub fn compute_unavailable(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::ComputeUnavailable, reason)
    }

    pub fn recognition(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::RecognitionFailure, reason)
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, reason)
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, reason)
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::NetworkError, reason)
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidRequest, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FailureKind; 7] = [
        FailureKind::DecodeError,
        FailureKind::ComputeUnavailable,
        FailureKind::RecognitionFailure,
        FailureKind::NotFound,
        FailureKind::Timeout,
        FailureKind::NetworkError,
        FailureKind::InvalidRequest,
    ];

    #[test]
    fn status_codes_map_back_to_kind() {
        for kind in ALL {
            assert_eq!(FailureKind::from_status(kind.status_code()), Some(kind));
        }
        assert_eq!(FailureKind::from_status(418), None);
    }

    #[test]
    fn status_codes_per_kind() {
        assert_eq!(FailureKind::NotFound.status_code(), 404);
        assert_eq!(FailureKind::DecodeError.status_code(), 422);
        assert_eq!(FailureKind::RecognitionFailure.status_code(), 500);
    }

    #[test]
    fn display_matches_serde_name() {
        for kind in ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn failure_display_includes_kind_and_reason() {
        let f = Failure::decode("not a PNG");
        assert_eq!(f.to_string(), "decode_error: not a PNG");
    }
}
