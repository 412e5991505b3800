pub mod artifact;
pub mod client;
pub mod config;
pub mod converter;
mod error;
pub mod health;
pub mod notice;
pub mod server;
pub mod upload;
pub mod viewer;

pub use artifact::ModelArtifact;
pub use client::{ClientError, ModelClient};
pub use config::{ApiConfig, SnapcadConfig};
pub use converter::{ConversionFlow, ConverterState};
pub use error::SnapcadError;
pub use upload::{ImageUpload, UploadError};
pub use viewer::{ModelSource, ModelViewer, ViewerError, ViewerOptions, ViewerSession, ViewerStatus};

/// Install the `tracing` subscriber: `RUST_LOG` when set, `info` otherwise.
/// A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
