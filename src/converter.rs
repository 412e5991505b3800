//! The convert-an-image flow behind the converter page.
//!
//! Select an image, convert it once, download the result. Every step that
//! the user should hear about leaves a [`Notice`] behind.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::artifact::ModelArtifact;
use crate::client::ModelClient;
use crate::error::SnapcadError;
use crate::notice::Notice;
use crate::upload::{ImageUpload, UploadError};

#[derive(Debug, Clone, PartialEq)]
pub enum ConverterState {
    Empty,
    Selected(ImageUpload),
    /// A request for this image is in flight.
    Converting(ImageUpload),
    Converted {
        image: ImageUpload,
        artifact: ModelArtifact,
    },
    Failed {
        image: ImageUpload,
        message: String,
    },
}

impl ConverterState {
    pub fn image(&self) -> Option<&ImageUpload> {
        match self {
            ConverterState::Empty => None,
            ConverterState::Selected(image) | ConverterState::Converting(image) => Some(image),
            ConverterState::Converted { image, .. } | ConverterState::Failed { image, .. } => Some(image),
        }
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        match self {
            ConverterState::Converted { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

pub struct ConversionFlow {
    client: ModelClient,
    state: ConverterState,
    notices: Vec<Notice>,
}

impl ConversionFlow {
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            state: ConverterState::Empty,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &ConverterState {
        &self.state
    }

    /// Pick a new image. Any previous selection or result is discarded.
    pub fn select_image(&mut self, image: ImageUpload) {
        info!("Selected image '{}' ({} bytes)", image.file_name(), image.len());
        self.state = ConverterState::Selected(image);
    }

    pub fn clear(&mut self) {
        self.state = ConverterState::Empty;
    }

    /// Convert the selected image.
    ///
    /// An image that already converted is not sent again; its artifact is
    /// returned as is. Calling this after a failure is a retry.
    pub async fn convert(&mut self) -> Result<ModelArtifact, String> {
        let image = match std::mem::replace(&mut self.state, ConverterState::Empty) {
            ConverterState::Empty => {
                self.notices.push(Notice::error(
                    "No image selected",
                    "Please select an image to convert.",
                ));
                return Err(SnapcadError::from(UploadError::Empty).into());
            }
            ConverterState::Converted { image, artifact } => {
                info!("'{}' is already converted", image.file_name());
                self.state = ConverterState::Converted {
                    image,
                    artifact: artifact.clone(),
                };
                return Ok(artifact);
            }
            ConverterState::Selected(image)
            | ConverterState::Converting(image)
            | ConverterState::Failed { image, .. } => image,
        };

        self.state = ConverterState::Converting(image.clone());
        match self.client.request_model(&image).await {
            Ok(artifact) => {
                info!("Converted '{}' into a {} byte model", image.file_name(), artifact.len());
                self.notices.push(Notice::success(
                    "Conversion complete!",
                    "Your 3D model is ready to download.",
                ));
                self.state = ConverterState::Converted {
                    image,
                    artifact: artifact.clone(),
                };
                Ok(artifact)
            }
            Err(e) => {
                let message = e.to_string();
                error!("Conversion of '{}' failed: {}", image.file_name(), message);
                self.notices.push(Notice::error("Conversion failed", message.clone()));
                self.state = ConverterState::Failed {
                    image,
                    message: message.clone(),
                };
                Err(SnapcadError::from(e).into())
            }
        }
    }

    /// Save the converted model into `dir`.
    pub fn download(&mut self, dir: &Path) -> Result<PathBuf, String> {
        let artifact = self
            .state
            .artifact()
            .ok_or_else(|| SnapcadError::Download("No model has been generated yet".to_string()))?;

        match artifact.save_to_dir(dir) {
            Ok(path) => {
                self.notices.push(Notice::success(
                    "Download started",
                    format!("Saving your 3D model to {}", path.display()),
                ));
                Ok(path)
            }
            Err(e) => {
                error!("Failed to save model into {:?}: {}", dir, e);
                self.notices.push(Notice::error("Download failed", e.to_string()));
                Err(SnapcadError::Download(e.to_string()).into())
            }
        }
    }

    /// Take the notices raised since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
