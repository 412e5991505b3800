//! Runtime configuration.
//!
//! Read from `<config_dir>/snapcad/config.toml` when present. Every field has
//! a default, so an empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SnapcadError;
use crate::viewer::ViewerOptions;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "SNAPCAD_API_URL";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapcadConfig {
    pub api: ApiConfig,
    pub viewer: ViewerOptions,
    pub server: ServerConfig,
    /// Where downloaded models are saved. Defaults to the platform download dir.
    pub download_dir: Option<PathBuf>,
}

/// Location of the remote generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5500".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// GLB served by the static generator. The built-in demo box when unset.
    pub demo_asset: Option<PathBuf>,
    /// Upstream `/generate3d` service to relay to instead of serving a static asset.
    pub upstream: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5500".to_string(),
            demo_asset: None,
            upstream: None,
        }
    }
}

impl SnapcadConfig {
    /// Parse a config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, SnapcadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SnapcadError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load the per-user config file, falling back to defaults when it does
    /// not exist.
    pub fn load_default() -> Result<Self, SnapcadError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    /// Parse and validate a config document.
    pub fn from_toml(content: &str) -> Result<Self, SnapcadError> {
        let config: Self = toml::from_str(content).map_err(|e| SnapcadError::Config(e.to_string()))?;
        config.viewer.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.apply_api_url_override(Some(url));
        }
    }

    fn apply_api_url_override(&mut self, value: Option<String>) {
        match value.map(|v| v.trim().to_string()) {
            Some(url) if !url.is_empty() => {
                info!("Using API base URL from {}: {}", API_URL_ENV, url);
                self.api.base_url = url;
            }
            Some(_) => warn!("{} is set but empty, ignoring", API_URL_ENV),
            None => {}
        }
    }

    /// Directory for the download action.
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("snapcad").join(CONFIG_FILE))
}
