//! The image-to-3D generation service: `POST /generate3d` and `GET /health`.

pub mod generator;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifact::GLB_CONTENT_TYPE;
use crate::client::IMAGE_FIELD;
use crate::upload::{has_allowed_extension, ImageUpload, UploadError, MAX_UPLOAD_BYTES};

pub use generator::{GeneratorKind, ModelGenerator, RelayGenerator, StaticModelGenerator};

/// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const CORS_ORIGIN: &str = "*";
const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "content-type";

/// Build the service routes around `generator`.
pub fn router<G: ModelGenerator>(generator: G) -> Router {
    Router::new()
        .route("/generate3d", post(generate3d::<G>).options(preflight))
        .route("/health", get(health).options(preflight))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
        .layer(middleware::map_response(add_cors_headers))
        .with_state(Arc::new(generator))
}

/// Serve until the process is stopped.
pub async fn serve<G: ModelGenerator>(listener: TcpListener, generator: G) -> std::io::Result<()> {
    serve_until(listener, generator, CancellationToken::new()).await
}

/// Serve until `shutdown` is cancelled, then finish in-flight requests.
pub async fn serve_until<G: ModelGenerator>(
    listener: TcpListener,
    generator: G,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    info!("Generation service listening on http://{}", addr);
    axum::serve(listener, router(generator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Generation service on {} stopped", addr);
    Ok(())
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(CORS_ORIGIN));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_HEADERS));
    response
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn generate3d<G: ModelGenerator>(
    State(generator): State<Arc<G>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!("Rejected /generate3d request: {}", rejection.body_text());
            return json_error(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let mut image = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        image = Some((file_name, bytes));
                        break;
                    }
                    Err(e) => return json_error(e.status(), &e.body_text()),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e.body_text());
                return json_error(e.status(), &e.body_text());
            }
        }
    }

    let Some((file_name, bytes)) = image else {
        return json_error(StatusCode::BAD_REQUEST, "No image part in the request");
    };
    if file_name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No selected file");
    }
    if !has_allowed_extension(&file_name) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid file type");
    }
    let upload = match ImageUpload::new(&file_name, bytes.to_vec()) {
        Ok(upload) => upload,
        Err(e @ UploadError::TooLarge { .. }) => {
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, &e.to_string());
        }
        Err(e) => {
            warn!("Rejected upload '{}': {}", file_name, e);
            return json_error(StatusCode::BAD_REQUEST, "Invalid file type");
        }
    };

    let request_id = Uuid::new_v4();
    let stem = upload.file_name().split('.').next().unwrap_or_default();
    let download_name = format!("model_{}_{}.glb", request_id, stem);
    info!(
        "Generating model {} for '{}' ({} bytes)",
        request_id,
        upload.file_name(),
        upload.len()
    );

    match generator.generate(&upload).await {
        Ok(artifact) => {
            info!("Model {} ready ({} bytes)", request_id, artifact.len());
            let disposition = format!("attachment; filename=\"{}\"", download_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, GLB_CONTENT_TYPE.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.bytes().to_vec(),
            )
                .into_response()
        }
        Err(e) => {
            error!("Model generation {} failed: {:#}", request_id, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
