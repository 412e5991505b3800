use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use image::{DynamicImage, ImageFormat};
use reqwest::StatusCode as HttpStatus;
use tokio::net::TcpListener;

use snapcad::client::GENERIC_FAILURE_MESSAGE;
use snapcad::{ApiConfig, ClientError, ImageUpload, ModelClient};

/// One multipart part as the simulated service received it.
#[derive(Debug, Clone)]
struct ReceivedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<Vec<ReceivedPart>>>>,
}

impl Recorder {
    fn requests(&self) -> Vec<Vec<ReceivedPart>> {
        self.requests.lock().unwrap().clone()
    }
}

#[derive(Clone)]
enum Reply {
    Model(Vec<u8>),
    Status(StatusCode, String),
}

async fn record_and_reply(State((recorder, reply)): State<(Recorder, Reply)>, mut multipart: Multipart) -> Response {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await.unwrap().to_vec();
        parts.push(ReceivedPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    recorder.requests.lock().unwrap().push(parts);

    match reply {
        Reply::Model(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "model/gltf-binary"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"model_abc_photo.glb\""),
            ],
            bytes,
        )
            .into_response(),
        Reply::Status(status, body) => (status, body).into_response(),
    }
}

/// Start a stand-in generation service and return its base URL.
async fn spawn_service(reply: Reply) -> (String, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/generate3d", post(record_and_reply))
        .route("/health", get(|| async { "ok" }))
        .with_state((recorder.clone(), reply));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), recorder)
}

fn client(base_url: &str) -> ModelClient {
    ModelClient::new(&ApiConfig::new(base_url)).unwrap()
}

fn photo() -> ImageUpload {
    let img = DynamicImage::new_rgb8(16, 16);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    ImageUpload::new("photo.jpg", buffer.into_inner()).unwrap()
}

fn unused_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn test_request_model_posts_one_image_part() {
    let model = vec![0x67, 0x6c, 0x54, 0x46, 2, 0, 0, 0];
    let (base_url, recorder) = spawn_service(Reply::Model(model.clone())).await;
    let image = photo();

    let artifact = client(&base_url).request_model(&image).await.unwrap();

    assert_eq!(artifact.bytes(), model.as_slice());
    assert_eq!(artifact.content_type(), Some("model/gltf-binary"));
    assert_eq!(artifact.download_name(), "model_abc_photo.glb");

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1, "exactly one request per call");
    let parts = &requests[0];
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "image");
    assert_eq!(parts[0].file_name.as_deref(), Some("photo.jpg"));
    assert_eq!(parts[0].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(parts[0].bytes, image.bytes());
}

#[tokio::test]
async fn test_request_model_trailing_slash_base_url() {
    let (base_url, recorder) = spawn_service(Reply::Model(vec![1, 2, 3])).await;
    let artifact = client(&format!("{}/", base_url)).request_model(&photo()).await.unwrap();
    assert_eq!(artifact.len(), 3);
    assert_eq!(recorder.requests().len(), 1);
}

#[tokio::test]
async fn test_rejection_surfaces_service_message() {
    let (base_url, _) = spawn_service(Reply::Status(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"error":"GPU quota exhausted"}"#.to_string(),
    ))
    .await;

    let err = client(&base_url).request_model(&photo()).await.unwrap_err();
    match &err {
        ClientError::Rejected { status, message } => {
            assert_eq!(*status, HttpStatus::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "GPU quota exhausted");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(err.to_string(), "GPU quota exhausted");
}

#[tokio::test]
async fn test_rejection_message_is_passed_through_verbatim() {
    let (base_url, _) = spawn_service(Reply::Status(
        StatusCode::BAD_REQUEST,
        r#"{"error":"  No selected file \n"}"#.to_string(),
    ))
    .await;

    let err = client(&base_url).request_model(&photo()).await.unwrap_err();
    assert_eq!(err.to_string(), "  No selected file \n");
}

#[tokio::test]
async fn test_unreadable_rejection_uses_generic_message() {
    let (base_url, _) = spawn_service(Reply::Status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>".to_string())).await;

    let err = client(&base_url).request_model(&photo()).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status, .. } if status == HttpStatus::BAD_GATEWAY));
    assert_eq!(err.to_string(), GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_error_body_without_message_uses_generic_message() {
    let (base_url, _) = spawn_service(Reply::Status(StatusCode::BAD_REQUEST, "{}".to_string())).await;
    let err = client(&base_url).request_model(&photo()).await.unwrap_err();
    assert_eq!(err.to_string(), GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let err = client(&unused_port_url()).request_model(&photo()).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "{:?}", err);
}

#[tokio::test]
async fn test_check_health() {
    let (base_url, recorder) = spawn_service(Reply::Model(vec![])).await;
    assert!(client(&base_url).check_health().await);
    assert!(recorder.requests().is_empty(), "health never posts an image");

    assert!(!client(&unused_port_url()).check_health().await);
}

#[tokio::test]
async fn test_check_health_non_success_is_false() {
    let app = Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    assert!(!client(&format!("http://{}", addr)).check_health().await);
}

#[test]
fn test_invalid_base_url() {
    let err = ModelClient::new(&ApiConfig::new("ftp://example.com")).unwrap_err();
    assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    assert!(ModelClient::new(&ApiConfig::new("not a url")).is_err());
}
