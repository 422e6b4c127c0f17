use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use axum::{body::Bytes, Json, Router};
use scanocr_core::wire::{
    HealthResponse, LegacyParams, LegacyResponse, PathBody, RecognizeParams, RecognizeResponse, HEALTH_PATH,
    LEGACY_OCR_PATH, RECOGNIZE_PATH,
};
use scanocr_core::{ComputeMode, Failure, LanguageSet};
use scanocr_ocr::{ImageSource, RecognitionRequest};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route(RECOGNIZE_PATH, post(recognize))
        .route(LEGACY_OCR_PATH, post(perform_ocr))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn recognize(
    State(state): State<AppState>,
    params: Result<Query<RecognizeParams>, QueryRejection>,
    request: Request,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let Query(params) = params?;
    let (languages, compute) = request_settings(&state.config, &params)?;
    let source = image_source(request).await?;

    let done = state
        .service
        .recognize(RecognitionRequest { source, languages, compute })
        .await?;

    Ok(Json(RecognizeResponse {
        text: done.text,
        decision: done.decision,
        compute: done.compute,
    }))
}

/// Endpoint of the first deployment: server defaults, text only.
async fn perform_ocr(
    State(state): State<AppState>,
    params: Result<Query<LegacyParams>, QueryRejection>,
    request: Request,
) -> Result<Json<LegacyResponse>, ApiError> {
    let Query(params) = params?;
    let source = match params.image_path {
        Some(path) => ImageSource::Path(path),
        None => image_source(request).await?,
    };

    let done = state
        .service
        .recognize(RecognitionRequest {
            source,
            languages: state.config.default_languages.clone(),
            compute: state.config.default_compute,
        })
        .await?;

    Ok(Json(LegacyResponse { result: done.text }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let devices = state.service.devices();
    Json(HealthResponse {
        status: "ok".into(),
        engine: state.service.engine_name().to_string(),
        gpu_devices: devices.gpus,
        cpu_workers: devices.cpu_workers,
    })
}

fn request_settings(config: &ServerConfig, params: &RecognizeParams) -> Result<(LanguageSet, ComputeMode), Failure> {
    let languages = match params.languages.as_deref() {
        Some(list) => LanguageSet::parse_list(list).map_err(|e| Failure::invalid(e.to_string()))?,
        None => config.default_languages.clone(),
    };
    let compute = match params.compute_mode.as_deref() {
        Some(mode) => mode.parse::<ComputeMode>().map_err(Failure::invalid)?,
        None => config.default_compute,
    };
    Ok((languages, compute))
}

/// JSON bodies name a file; multipart bodies carry it in the `file` field;
/// anything else is the image itself.
async fn image_source(request: Request) -> Result<ImageSource, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(body) = Json::<PathBody>::from_request(request, &()).await?;
        return Ok(ImageSource::Path(body.path));
    }

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &()).await?;
        while let Some(field) = multipart.next_field().await? {
            if field.name() == Some("file") {
                return Ok(ImageSource::Bytes(field.bytes().await?.to_vec()));
            }
        }
        return Err(Failure::invalid("multipart body has no `file` field").into());
    }

    let body = Bytes::from_request(request, &()).await?;
    Ok(ImageSource::Bytes(body.to_vec()))
}
