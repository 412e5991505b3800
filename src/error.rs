use thiserror::Error;

use crate::client::ClientError;
use crate::upload::UploadError;
use crate::viewer::ViewerError;

#[derive(Debug, Error)]
pub enum SnapcadError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error("Download error: {0}")]
    Download(String),
}

impl From<SnapcadError> for String {
    fn from(err: SnapcadError) -> Self {
        err.to_string()
    }
}
