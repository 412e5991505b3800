//! Image uploads accepted for conversion.
//!
//! Uploads come from the file picker (a path on disk) or from the camera
//! capture helper (a `data:` URL). Both end up as an [`ImageUpload`] that has
//! already been checked for format and size, so the client never sends an
//! image the service would reject for those reasons.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, ImageReader};
use thiserror::Error;
use tracing::{debug, info};

/// Largest image accepted for conversion (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// File extensions the generation service accepts.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No image selected")]
    Empty,

    #[error("Image is {size} bytes; the maximum is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported image format: only PNG and JPEG are accepted")]
    UnsupportedFormat,

    #[error("Invalid image data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Failed to read image file: {0}")]
    Read(String),
}

/// Image container formats the service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
        }
    }

    /// Sniff the format from the leading bytes, ignoring any declared type.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => Some(ImageKind::Png),
            Ok(ImageFormat::Jpeg) => Some(ImageKind::Jpeg),
            _ => None,
        }
    }
}

/// A validated PNG or JPEG image ready to be posted to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    kind: ImageKind,
    bytes: Vec<u8>,
}

impl ImageUpload {
    /// Validate raw image bytes under the given (untrusted) file name.
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
        let kind = ImageKind::detect(&bytes).ok_or(UploadError::UnsupportedFormat)?;

        let mut file_name = sanitize_file_name(file_name);
        if file_name.is_empty() {
            file_name = format!("image.{}", kind.extension());
        }

        debug!("Accepted {} upload '{}' ({} bytes)", kind.mime_type(), file_name, bytes.len());
        Ok(Self {
            file_name,
            kind,
            bytes,
        })
    }

    /// Read a user-picked file from disk.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| UploadError::Read(format!("{}: {}", path.display(), e)))?;
        if metadata.len() as usize > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size: metadata.len() as usize,
                max: MAX_UPLOAD_BYTES,
            });
        }

        let bytes = std::fs::read(path)
            .map_err(|e| UploadError::Read(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        info!("Loaded image file {:?} ({} bytes)", path, bytes.len());
        Self::new(name, bytes)
    }

    /// Decode a still captured by the camera helper, e.g.
    /// `data:image/jpeg;base64,/9j/4AAQ...`.
    pub fn from_data_url(data_url: &str) -> Result<Self, UploadError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| UploadError::InvalidDataUrl("missing 'data:' prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| UploadError::InvalidDataUrl("missing ',' separator".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(UploadError::InvalidDataUrl(
                "only base64 payloads are supported".to_string(),
            ));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| UploadError::InvalidDataUrl(e.to_string()))?;
        let kind = ImageKind::detect(&bytes).ok_or(UploadError::UnsupportedFormat)?;
        Self::new(&format!("capture.{}", kind.extension()), bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Pixel dimensions, read from the image header without decoding.
    pub fn dimensions(&self) -> Result<(u32, u32), UploadError> {
        ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .map_err(|e| UploadError::Read(e.to_string()))?
            .into_dimensions()
            .map_err(|e| UploadError::Read(e.to_string()))
    }

    /// Preview form of the image for the presentation layer.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime_type(), STANDARD.encode(&self.bytes))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Whether `file_name` carries one of the [`ALLOWED_EXTENSIONS`].
pub fn has_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Reduce an untrusted file name to a safe single path component.
///
/// Keeps ASCII alphanumerics, `.`, `_` and `-`; whitespace becomes `_`;
/// directory parts and leading dots/underscores are dropped.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    cleaned.trim_start_matches(|c: char| c == '.' || c == '_').to_string()
}
