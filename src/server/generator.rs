//! Where generated models come from.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::artifact::{ModelArtifact, GLB_CONTENT_TYPE};
use crate::client::ModelClient;
use crate::upload::ImageUpload;
use crate::viewer::demo::demo_model_glb;

/// Turns one validated image into one model.
pub trait ModelGenerator: Send + Sync + 'static {
    fn generate(&self, image: &ImageUpload) -> impl Future<Output = Result<ModelArtifact>> + Send;
}

/// Answers every request with the same model.
#[derive(Debug, Clone)]
pub struct StaticModelGenerator {
    glb: Arc<[u8]>,
}

impl StaticModelGenerator {
    /// The built-in demo box.
    pub fn demo() -> Self {
        Self {
            glb: demo_model_glb().into(),
        }
    }

    /// A GLB asset from disk. The file is checked once, here.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read model asset {:?}", path))?;
        gltf::Gltf::from_slice(&bytes).with_context(|| format!("{:?} is not a valid glTF asset", path))?;
        info!("Serving static model {:?} ({} bytes)", path, bytes.len());
        Ok(Self { glb: bytes.into() })
    }
}

impl ModelGenerator for StaticModelGenerator {
    async fn generate(&self, _image: &ImageUpload) -> Result<ModelArtifact> {
        Ok(ModelArtifact::new(Arc::clone(&self.glb)).with_content_type(GLB_CONTENT_TYPE))
    }
}

/// Forwards each image to another generation service.
#[derive(Debug, Clone)]
pub struct RelayGenerator {
    client: ModelClient,
}

impl RelayGenerator {
    pub fn new(client: ModelClient) -> Self {
        info!("Relaying generation requests to {}", client.base_url());
        Self { client }
    }
}

impl ModelGenerator for RelayGenerator {
    async fn generate(&self, image: &ImageUpload) -> Result<ModelArtifact> {
        Ok(self.client.request_model(image).await?)
    }
}

/// A generator picked at startup from configuration.
#[derive(Debug, Clone)]
pub enum GeneratorKind {
    Static(StaticModelGenerator),
    Relay(RelayGenerator),
}

impl ModelGenerator for GeneratorKind {
    async fn generate(&self, image: &ImageUpload) -> Result<ModelArtifact> {
        match self {
            GeneratorKind::Static(generator) => generator.generate(image).await,
            GeneratorKind::Relay(generator) => generator.generate(image).await,
        }
    }
}
