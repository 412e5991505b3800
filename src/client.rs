//! Client for the remote image-to-3D generation service.
//!
//! One call per image, no retries, no timeout: a failed attempt is reported
//! and the user decides whether to try again.

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::artifact::{parse_content_disposition, ModelArtifact};
use crate::config::ApiConfig;
use crate::upload::ImageUpload;

/// Message used when the service rejects a request without a readable reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate 3D model";

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The service answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// The image could not be attached to the request.
    #[error("Could not attach image '{file_name}': {reason}")]
    InvalidImagePart { file_name: String, reason: String },

    /// The request never completed.
    #[error("Network error: could not reach the 3D generation service ({0})")]
    Network(String),
}

/// Error body returned by the service on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ModelClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent("SnapCAD/1.0")
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Self::with_http_client(config, http)
    }

    /// Build a client around an existing `reqwest::Client` (shared connection pool).
    pub fn with_http_client(config: &ApiConfig, http: reqwest::Client) -> Result<Self, ClientError> {
        let base_url = parse_base_url(&config.base_url)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Convert one image into one model artifact.
    pub async fn request_model(&self, image: &ImageUpload) -> Result<ModelArtifact, ClientError> {
        let url = self.endpoint("generate3d");
        info!(
            "Requesting 3D model for '{}' ({} bytes) from {}",
            image.file_name(),
            image.len(),
            url
        );

        let form = Form::new().part(IMAGE_FIELD, image_part(image)?);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("3D generation request to {} failed: {}", url, e);
                ClientError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = rejection_message(&body);
            warn!("3D generation rejected ({}): {}", status, message);
            return Err(ClientError::Rejected { status, message });
        }

        let content_type = header_str(&response, CONTENT_TYPE);
        let file_name = header_str(&response, CONTENT_DISPOSITION)
            .as_deref()
            .and_then(parse_content_disposition);

        let bytes = response.bytes().await.map_err(|e| {
            error!("Failed to read model body from {}: {}", url, e);
            ClientError::Network(e.to_string())
        })?;
        info!("Received {} byte model artifact", bytes.len());

        let mut artifact = ModelArtifact::new(bytes.to_vec());
        if let Some(content_type) = content_type {
            artifact = artifact.with_content_type(content_type);
        }
        if let Some(file_name) = file_name {
            artifact = artifact.with_file_name(file_name);
        }
        Ok(artifact)
    }

    /// Liveness check. Any failure, including no response, is `false`.
    pub async fn check_health(&self) -> bool {
        let url = self.endpoint("health");
        match self.http.get(&url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                info!("Health check {}: {}", url, response.status());
                healthy
            }
            Err(e) => {
                warn!("Health check {} failed: {}", url, e);
                false
            }
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim()).map_err(|e| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn image_part(image: &ImageUpload) -> Result<Part, ClientError> {
    Part::bytes(image.bytes().to_vec())
        .file_name(image.file_name().to_string())
        .mime_str(image.kind().mime_type())
        .map_err(|e| ClientError::InvalidImagePart {
            file_name: image.file_name().to_string(),
            reason: e.to_string(),
        })
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Pull the `error` field out of a failure body verbatim, or fall back to the
/// generic message when it is missing or empty.
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}
