//! Generated 3D model artifacts and the download action.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::NamedTempFile;
use tracing::info;

use crate::upload::sanitize_file_name;

/// Content type of binary glTF, the format the service returns.
pub const GLB_CONTENT_TYPE: &str = "model/gltf-binary";

const DEFAULT_DOWNLOAD_NAME: &str = "model.glb";

/// Opaque model bytes returned by the generation service.
///
/// Cloning is cheap; the bytes are shared, so the same artifact can be handed
/// to the viewer and kept for download at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    bytes: Arc<[u8]>,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl ModelArtifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            file_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Name to save the artifact under: the server-provided name when it
    /// survives sanitizing, otherwise `model.glb`.
    pub fn download_name(&self) -> String {
        self.file_name
            .as_deref()
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
    }

    /// Save the artifact into `dir` under [`download_name`](Self::download_name).
    ///
    /// The write goes through a temp file in the same directory and is renamed
    /// into place, so an interrupted download never leaves a partial model.
    pub fn save_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let target = dir.join(self.download_name());

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&self.bytes)?;
        temp.flush()?;
        temp.persist(&target)?;

        info!("Saved {} byte model to {:?}", self.bytes.len(), target);
        Ok(target)
    }
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// Handles `filename=name.glb` and `filename="name.glb"`; the extended
/// `filename*=` form is ignored.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    value.split(';').find_map(|param| {
        let (key, raw) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_download_name_defaults() {
        let artifact = ModelArtifact::new(vec![1u8, 2, 3]);
        assert_eq!(artifact.download_name(), "model.glb");

        let named = ModelArtifact::new(vec![1u8]).with_file_name("../../model_abc.glb");
        assert_eq!(named.download_name(), "model_abc.glb");

        let hostile = ModelArtifact::new(vec![1u8]).with_file_name("...");
        assert_eq!(hostile.download_name(), "model.glb");
    }

    #[test]
    fn test_save_to_dir_writes_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..=255).collect();
        let artifact = ModelArtifact::new(bytes.clone()).with_file_name("model_1.glb");

        let path = artifact.save_to_dir(&dir.path().join("downloads")).unwrap();
        assert_eq!(path.file_name().unwrap(), "model_1.glb");
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_save_overwrites_previous_download() {
        let dir = TempDir::new().unwrap();
        ModelArtifact::new(vec![1u8; 10]).save_to_dir(dir.path()).unwrap();
        let path = ModelArtifact::new(vec![2u8; 4]).save_to_dir(dir.path()).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), vec![2u8; 4]);
    }

    #[test]
    fn test_clone_shares_bytes() {
        let artifact = ModelArtifact::new(vec![9u8; 64]).with_content_type(GLB_CONTENT_TYPE);
        let copy = artifact.clone();
        assert!(Arc::ptr_eq(&artifact.shared_bytes(), &copy.shared_bytes()));
        assert_eq!(copy.content_type(), Some(GLB_CONTENT_TYPE));
    }

    #[test]
    fn test_parse_content_disposition() {
        assert_eq!(
            parse_content_disposition("attachment; filename=model_x.glb"),
            Some("model_x.glb".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=\"model y.glb\""),
            Some("model y.glb".to_string())
        );
        assert_eq!(parse_content_disposition("inline"), None);
        assert_eq!(parse_content_disposition("attachment; filename=\"\""), None);
    }
}
