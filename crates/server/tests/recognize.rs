use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use scanocr_ocr::recognizer::MockFactory;
use scanocr_server::{router, AppState, ServerConfig};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(config: ServerConfig, factory: MockFactory) -> Router {
    router(AppState::new(config, Arc::new(factory)))
}

fn app() -> Router {
    let config = ServerConfig { gpu_devices: Some(0), cpu_workers: Some(2), ..ServerConfig::default() };
    app_with(config, MockFactory::with_spans(["Total", " 5.50"]))
}

fn page_png() -> Vec<u8> {
    let img: GrayImage = ImageBuffer::from_fn(32, 16, |x, _| Luma([if x % 8 < 2 { 15 } else { 235 }]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

async fn json_body(response: Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn raw_bytes_are_recognized() {
    let response = app()
        .oneshot(post("/recognize?languages=en,ko", "image/png", page_png()))
        .await
        .unwrap();

    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "Total 5.50");
    assert_eq!(json["decision"], "global_otsu");
    assert_eq!(json["compute"], "cpu");
}

#[tokio::test]
async fn json_path_is_read_by_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.png");
    std::fs::write(&path, page_png()).unwrap();

    let body = serde_json::json!({ "path": path }).to_string();
    let response = app().oneshot(post("/recognize", "application/json", body)).await.unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "Total 5.50");
}

#[tokio::test]
async fn multipart_file_field_is_recognized() {
    let boundary = "scanocr-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&page_png());
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = app()
        .oneshot(post(
            "/recognize",
            &format!("multipart/form-data; boundary={boundary}"),
            body,
        ))
        .await
        .unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "Total 5.50");
}

#[tokio::test]
async fn missing_path_is_404() {
    let body = r#"{"path": "/definitely/not/here.png"}"#;
    let response = app().oneshot(post("/recognize", "application/json", body)).await.unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn corrupt_image_is_422() {
    let response = app()
        .oneshot(post("/recognize", "image/jpeg", &b"\xFF\xD8\xFF garbage"[..]))
        .await
        .unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "decode_error");
}

#[tokio::test]
async fn gpu_without_device_is_503() {
    let config = ServerConfig { gpu_devices: Some(0), ..ServerConfig::default() };
    let response = app_with(config, MockFactory::new("x").with_gpu_support())
        .oneshot(post("/recognize?computeMode=gpu", "image/png", page_png()))
        .await
        .unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "compute_unavailable");
}

#[tokio::test]
async fn invalid_parameters_are_400() {
    for uri in ["/recognize?languages=", "/recognize?computeMode=tpu", "/recognize?languages=en,,KO!"] {
        let response = app().oneshot(post(uri, "image/png", page_png())).await.unwrap();
        let (status, json) = json_body(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["error"], "invalid_request");
    }

    let response = app()
        .oneshot(post("/recognize", "application/json", "{not json"))
        .await
        .unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig { max_body_bytes: 64, gpu_devices: Some(0), ..ServerConfig::default() };
    let response = app_with(config, MockFactory::new("x"))
        .oneshot(post("/recognize", "image/png", vec![0u8; 1024]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn legacy_endpoint_reads_image_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipt.png");
    std::fs::write(&path, page_png()).unwrap();

    let uri = format!("/perform_ocr/?image_path={}", path.display());
    let response = app().oneshot(post(&uri, "text/plain", Body::empty())).await.unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "Total 5.50");
}

#[tokio::test]
async fn legacy_endpoint_missing_image_path_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("/perform_ocr/?image_path={}", dir.path().join("gone.png").display());

    let response = app().oneshot(post(&uri, "text/plain", Body::empty())).await.unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn health_reports_engine_and_devices() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["engine"], "mock");
    assert_eq!(json["gpu_devices"], 0);
    assert_eq!(json["cpu_workers"], 2);
}
