//! Fetching and parsing model artifacts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gltf::mesh::Mode;
use gltf::Semantic;
use nalgebra::{Matrix4, Point3};
use tracing::{debug, info};
use url::Url;

use super::bounds::Aabb;
use super::ViewerError;
use crate::artifact::ModelArtifact;

/// Largest model the viewer will download.
pub const MAX_MODEL_BYTES: u64 = 512 * 1024 * 1024;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const PREALLOC_LIMIT: u64 = 16 * 1024 * 1024;

/// What the viewer should display.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A `.glb`/`.gltf` file on disk.
    Path(PathBuf),
    /// A model served over HTTP(S).
    Url(Url),
    /// An artifact already in memory, typically a conversion result.
    Artifact(ModelArtifact),
}

impl ModelSource {
    /// Interpret a model reference: `http(s)://` URLs are fetched, `file://`
    /// URLs and anything else name a file on disk.
    pub fn parse(reference: &str) -> Self {
        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ModelSource::Url(url),
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => ModelSource::Path(path),
                Err(()) => ModelSource::Path(PathBuf::from(reference)),
            },
            _ => ModelSource::Path(PathBuf::from(reference)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ModelSource::Path(path) => path.display().to_string(),
            ModelSource::Url(url) => url.to_string(),
            ModelSource::Artifact(artifact) => artifact
                .file_name()
                .map(|name| format!("artifact '{}'", name))
                .unwrap_or_else(|| format!("artifact ({} bytes)", artifact.len())),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Two sources are the same reference when they name the same file or URL,
/// or share the same artifact bytes.
impl PartialEq for ModelSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ModelSource::Path(a), ModelSource::Path(b)) => a == b,
            (ModelSource::Url(a), ModelSource::Url(b)) => a == b,
            (ModelSource::Artifact(a), ModelSource::Artifact(b)) => {
                Arc::ptr_eq(&a.shared_bytes(), &b.shared_bytes())
            }
            _ => false,
        }
    }
}

impl From<ModelArtifact> for ModelSource {
    fn from(artifact: ModelArtifact) -> Self {
        ModelSource::Artifact(artifact)
    }
}

impl From<&Path> for ModelSource {
    fn from(path: &Path) -> Self {
        ModelSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ModelSource {
    fn from(path: PathBuf) -> Self {
        ModelSource::Path(path)
    }
}

impl From<Url> for ModelSource {
    fn from(url: Url) -> Self {
        ModelSource::Url(url)
    }
}

/// Geometry counts of a loaded model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub mesh_count: usize,
    pub primitive_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// A parsed model: its bounds in model space and what it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub bounds: Aabb,
    pub stats: ModelStats,
}

/// Fetch and parse the model behind `source`.
///
/// Parsing runs on the blocking pool so a large artifact never stalls the
/// render loop or input handling.
pub async fn load_model(source: &ModelSource, http: &reqwest::Client) -> Result<LoadedModel, ViewerError> {
    let label = source.label();
    let load_error = |reason: String| ViewerError::AssetLoad {
        model: label.clone(),
        reason,
    };

    let document = match source {
        ModelSource::Path(path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || gltf::import(&path))
                .await
                .map_err(|e| load_error(e.to_string()))?
                .map_err(|e| load_error(e.to_string()))?
                .0
        }
        ModelSource::Url(url) => {
            let bytes = fetch_bytes(url, http).await.map_err(load_error)?;
            parse_slice(bytes).await.map_err(load_error)?
        }
        ModelSource::Artifact(artifact) => parse_slice(artifact.shared_bytes()).await.map_err(load_error)?,
    };

    let model = inspect_document(&document).map_err(load_error)?;
    info!(
        "Loaded {}: {} meshes, {} triangles, largest dimension {:.3}",
        label,
        model.stats.mesh_count,
        model.stats.triangle_count,
        model.bounds.max_extent()
    );
    Ok(model)
}

async fn parse_slice(bytes: Arc<[u8]>) -> Result<gltf::Document, String> {
    tokio::task::spawn_blocking(move || gltf::import_slice(&bytes[..]))
        .await
        .map_err(|e| e.to_string())?
        .map(|(document, _, _)| document)
        .map_err(|e| e.to_string())
}

async fn fetch_bytes(url: &Url, http: &reqwest::Client) -> Result<Arc<[u8]>, String> {
    let mut response = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| format!("request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        ));
    }

    let total = response.content_length();
    if let Some(total) = total.filter(|t| *t > MAX_MODEL_BYTES) {
        return Err(too_large(total));
    }
    let reserve = total.unwrap_or(0).min(PREALLOC_LIMIT);
    let mut bytes = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
    while let Some(chunk) = response.chunk().await.map_err(|e| format!("download interrupted: {}", e))? {
        let received = (bytes.len() + chunk.len()) as u64;
        if received > MAX_MODEL_BYTES {
            return Err(too_large(received));
        }
        bytes.extend_from_slice(&chunk);
        if let Some(total) = total.filter(|t| *t > 0) {
            debug!("{}: {:.0}% loaded", url, bytes.len() as f64 / total as f64 * 100.0);
        }
    }
    Ok(bytes.into())
}

fn too_large(size: u64) -> String {
    format!("model is {} bytes, more than the {} byte limit", size, MAX_MODEL_BYTES)
}

/// Bounds and counts of the default scene (or the first scene).
///
/// Each primitive contributes its POSITION accessor bounds, carried through
/// the node hierarchy's transforms.
pub fn inspect_document(document: &gltf::Document) -> Result<LoadedModel, String> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| "model contains no scene".to_string())?;

    let mut bounds = Aabb::empty();
    let mut stats = ModelStats::default();
    for node in scene.nodes() {
        visit_node(&node, &Matrix4::identity(), &mut bounds, &mut stats);
    }

    if stats.primitive_count == 0 || bounds.is_empty() {
        return Err("model contains no geometry".to_string());
    }
    Ok(LoadedModel { bounds, stats })
}

fn visit_node(node: &gltf::Node, parent: &Matrix4<f32>, bounds: &mut Aabb, stats: &mut ModelStats) {
    let world = parent * Matrix4::from(node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        stats.mesh_count += 1;
        for primitive in mesh.primitives() {
            let Some(positions) = primitive.get(&Semantic::Positions) else {
                continue;
            };
            stats.primitive_count += 1;
            stats.vertex_count += positions.count();
            if primitive.mode() == Mode::Triangles {
                let corners = primitive.indices().map(|i| i.count()).unwrap_or(positions.count());
                stats.triangle_count += corners / 3;
            }

            let bb = primitive.bounding_box();
            let local = Aabb::new(Point3::from(bb.min), Point3::from(bb.max));
            bounds.union(&local.transformed(&world));
        }
    }

    for child in node.children() {
        visit_node(&child, &world, bounds, stats);
    }
}
