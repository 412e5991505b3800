//! Interactive model viewer.
//!
//! A [`ViewerSession`] binds one render surface in a [`Container`] to one
//! [`ModelSource`]: it sets up the scene, camera, lights and orbit controls,
//! loads and fits the model in the background, and drives a cancellable
//! render loop until it is disposed. [`ModelViewer`] is the mount point that
//! swaps sessions when the model reference changes.

pub mod bounds;
pub mod camera;
pub mod controls;
pub mod demo;
pub mod frame_loop;
pub mod headless;
pub mod loader;
pub mod model_viewer;
pub mod scene;
pub mod session;
pub mod surface;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bounds::Aabb;
pub use camera::PerspectiveCamera;
pub use controls::OrbitControls;
pub use frame_loop::FrameLoop;
pub use headless::{HeadlessBackend, HeadlessContainer};
pub use loader::{LoadedModel, ModelSource, ModelStats};
pub use model_viewer::ModelViewer;
pub use scene::{Color, FitOptions, Light, ModelTransform, Scene, SceneModel};
pub use session::{ViewerSession, ViewerStatus};
pub use surface::{Container, RenderBackend, Renderer, RendererSettings, Size, SurfaceId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewerError {
    #[error("Viewer container has no area ({width}x{height})")]
    InvalidContainer { width: u32, height: u32 },

    #[error("Failed to load model {model}: {reason}")]
    AssetLoad { model: String, reason: String },

    #[error("Invalid viewer option {option}: {reason}")]
    InvalidOptions { option: &'static str, reason: String },
}

/// Tunables for a viewer session. Every field has a default, so a partial
/// `[viewer]` table in the config file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Initial camera distance from the origin along +Z.
    pub camera_distance: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    /// Scene units the largest model dimension is scaled to.
    pub fit_size: f32,
    pub vertical_offset: f32,
    /// Radians.
    pub initial_yaw: f32,
    pub refresh_rate_hz: u32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
            camera_distance: 4.0,
            auto_rotate: true,
            auto_rotate_speed: 1.0,
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            enable_zoom: false,
            zoom_speed: 1.0,
            min_distance: None,
            max_distance: None,
            fit_size: 2.0,
            vertical_offset: 0.5,
            initial_yaw: std::f32::consts::PI * 0.01,
            refresh_rate_hz: 60,
        }
    }
}

impl ViewerOptions {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            size: self.fit_size,
            vertical_offset: self.vertical_offset,
            rotation_y: self.initial_yaw,
        }
    }

    /// Reject values the camera or controls cannot work with.
    pub fn validate(&self) -> Result<(), ViewerError> {
        let invalid = |option: &'static str, reason: String| -> Result<(), ViewerError> {
            Err(ViewerError::InvalidOptions { option, reason })
        };

        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return invalid("fov_degrees", format!("{} is not between 0 and 180", self.fov_degrees));
        }
        if !(self.near.is_finite() && self.near > 0.0) {
            return invalid("near", format!("{} is not a positive distance", self.near));
        }
        if !(self.far.is_finite() && self.far > self.near) {
            return invalid("far", format!("{} is not beyond near ({})", self.far, self.near));
        }
        if !(self.camera_distance.is_finite() && self.camera_distance > 0.0) {
            return invalid(
                "camera_distance",
                format!("{} is not a positive distance", self.camera_distance),
            );
        }
        if !(self.damping_factor > 0.0 && self.damping_factor <= 1.0) {
            return invalid("damping_factor", format!("{} is not in (0, 1]", self.damping_factor));
        }
        for (option, value) in [
            ("auto_rotate_speed", self.auto_rotate_speed),
            ("rotate_speed", self.rotate_speed),
            ("zoom_speed", self.zoom_speed),
            ("vertical_offset", self.vertical_offset),
            ("initial_yaw", self.initial_yaw),
        ] {
            if !value.is_finite() {
                return invalid(option, format!("{} is not finite", value));
            }
        }
        if !(self.fit_size.is_finite() && self.fit_size > 0.0) {
            return invalid("fit_size", format!("{} is not a positive size", self.fit_size));
        }

        let min = self.min_distance.unwrap_or(0.0);
        if !(min.is_finite() && min >= 0.0) {
            return invalid("min_distance", format!("{} is not a distance", min));
        }
        if let Some(max) = self.max_distance {
            if max.is_nan() || max < min {
                return invalid("max_distance", format!("{} is below min_distance ({})", max, min));
            }
        }
        Ok(())
    }

    /// Time between frames; a zero refresh rate falls back to 60 Hz.
    pub fn frame_period(&self) -> Duration {
        let hz = if self.refresh_rate_hz == 0 { 60 } else { self.refresh_rate_hz };
        Duration::from_nanos(1_000_000_000 / u64::from(hz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ViewerOptions::default();
        assert_eq!(options.fov_degrees, 45.0);
        assert_eq!(options.camera_distance, 4.0);
        assert!(options.auto_rotate);
        assert!(!options.enable_zoom);
        assert_eq!(options.fit_options(), FitOptions::default());
    }

    #[test]
    fn test_frame_period() {
        let options = ViewerOptions {
            refresh_rate_hz: 50,
            ..ViewerOptions::default()
        };
        assert_eq!(options.frame_period(), Duration::from_millis(20));

        let zero = ViewerOptions {
            refresh_rate_hz: 0,
            ..ViewerOptions::default()
        };
        assert_eq!(zero.frame_period(), ViewerOptions::default().frame_period());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(ViewerOptions::default().validate(), Ok(()));
        let bounded = ViewerOptions {
            min_distance: Some(2.0),
            max_distance: Some(2.0),
            ..ViewerOptions::default()
        };
        assert_eq!(bounded.validate(), Ok(()));
    }

    fn rejected_option(options: ViewerOptions) -> &'static str {
        match options.validate() {
            Err(ViewerError::InvalidOptions { option, .. }) => option,
            other => panic!("expected invalid options, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_inverted_distance_range() {
        let options = ViewerOptions {
            min_distance: Some(5.0),
            max_distance: Some(2.0),
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(options), "max_distance");

        let negative = ViewerOptions {
            min_distance: Some(-1.0),
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(negative), "min_distance");
    }

    #[test]
    fn test_rejects_degenerate_projection() {
        let flat = ViewerOptions {
            near: 1.0,
            far: 1.0,
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(flat), "far");

        let zero_near = ViewerOptions {
            near: 0.0,
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(zero_near), "near");

        for fov in [0.0, 180.0, f32::NAN] {
            let options = ViewerOptions {
                fov_degrees: fov,
                ..ViewerOptions::default()
            };
            assert_eq!(rejected_option(options), "fov_degrees");
        }
    }

    #[test]
    fn test_rejects_bad_camera_and_fit() {
        let at_origin = ViewerOptions {
            camera_distance: 0.0,
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(at_origin), "camera_distance");

        let no_damping = ViewerOptions {
            damping_factor: 0.0,
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(no_damping), "damping_factor");

        let spinning = ViewerOptions {
            auto_rotate_speed: f32::INFINITY,
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(spinning), "auto_rotate_speed");

        let empty_fit = ViewerOptions {
            fit_size: -2.0,
            ..ViewerOptions::default()
        };
        assert_eq!(rejected_option(empty_fit), "fit_size");
    }

    #[test]
    fn test_partial_toml_table() {
        let options: ViewerOptions = toml::from_str("enable_zoom = true\nmax_distance = 8.0\n").unwrap();
        assert!(options.enable_zoom);
        assert_eq!(options.max_distance, Some(8.0));
        assert_eq!(options.fit_size, 2.0);
    }
}
