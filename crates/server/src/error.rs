use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{BytesRejection, JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scanocr_core::wire::ErrorBody;
use scanocr_core::{Failure, FailureKind};
use thiserror::Error;

/// Everything a handler can fail with. Rendered as `{"error", "reason"}`
/// with the status of its failure kind.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Failure(#[from] Failure),
    #[error("Invalid query: {0}")]
    Query(#[from] QueryRejection),
    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartRejection),
    #[error("Invalid multipart field: {0}")]
    MultipartField(#[from] MultipartError),
    #[error("Failed to read body: {0}")]
    Body(#[from] BytesRejection),
}

impl ApiError {
    fn into_failure(self) -> (StatusCode, Failure) {
        match self {
            ApiError::Failure(failure) => {
                let status = StatusCode::from_u16(failure.kind.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, failure)
            }
            // Oversized bodies keep their 413.
            ApiError::Body(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (StatusCode::PAYLOAD_TOO_LARGE, Failure::invalid(rejection.body_text()))
            }
            other => (StatusCode::BAD_REQUEST, Failure::new(FailureKind::InvalidRequest, other.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, failure) = self.into_failure();
        if status.is_server_error() {
            tracing::error!(kind = %failure.kind, reason = %failure.reason, "request failed");
        }
        (status, Json(ErrorBody::from(failure))).into_response()
    }
}
