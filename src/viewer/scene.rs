//! Scene contents: lights and the fitted model.

use nalgebra::{Matrix4, Point3, Rotation3, Vector3};

use super::bounds::Aabb;
use super::loader::ModelStats;

/// Linear RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };

    /// From a `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self {
            r: channel(16),
            g: channel(8),
            b: channel(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Uniform light from every direction.
    Ambient { color: Color, intensity: f32 },
    /// Parallel light shining from `position` towards the origin.
    Directional {
        color: Color,
        intensity: f32,
        position: Point3<f32>,
    },
}

/// A soft white fill plus a white key light and two colored rim lights.
pub fn default_lighting() -> Vec<Light> {
    vec![
        Light::Ambient {
            color: Color::WHITE,
            intensity: 0.5,
        },
        Light::Directional {
            color: Color::WHITE,
            intensity: 3.0,
            position: Point3::new(1.0, 1.0, 1.0),
        },
        Light::Directional {
            color: Color::from_hex(0xc054ff),
            intensity: 2.0,
            position: Point3::new(-1.0, -1.0, -1.0),
        },
        Light::Directional {
            color: Color::from_hex(0x5271ff),
            intensity: 2.0,
            position: Point3::new(0.0, 1.0, -1.0),
        },
    ]
}

/// Placement of the loaded model in the scene: scale, then yaw, then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub translation: Vector3<f32>,
    pub scale: f32,
    pub rotation_y: f32,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            scale: 1.0,
            rotation_y: 0.0,
        }
    }
}

impl ModelTransform {
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.translation)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), self.rotation_y).to_homogeneous()
            * Matrix4::new_scaling(self.scale)
    }
}

/// How a loaded model is framed in the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Scene units the largest model dimension is scaled to.
    pub size: f32,
    /// Lift applied on +Y after centering.
    pub vertical_offset: f32,
    /// Yaw (radians) applied after scaling.
    pub rotation_y: f32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            size: 2.0,
            vertical_offset: 0.5,
            rotation_y: std::f32::consts::PI * 0.01,
        }
    }
}

/// Center the model's bounding box on the origin and scale it uniformly so
/// its largest dimension spans `fit.size` scene units.
///
/// A degenerate box (largest dimension zero) keeps a scale of 1.
pub fn fit_to_viewport(bounds: &Aabb, fit: &FitOptions) -> ModelTransform {
    let max_dim = bounds.max_extent();
    let scale = if max_dim > f32::EPSILON {
        fit.size / max_dim
    } else {
        1.0
    };

    let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), fit.rotation_y);
    let center = if bounds.is_empty() {
        Vector3::zeros()
    } else {
        bounds.center().coords
    };
    let translation = -(rotation * (center * scale)) + Vector3::new(0.0, fit.vertical_offset, 0.0);

    ModelTransform {
        translation,
        scale,
        rotation_y: fit.rotation_y,
    }
}

/// A model placed in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneModel {
    pub label: String,
    /// Bounds in the model's own coordinates, before fitting.
    pub bounds: Aabb,
    pub transform: ModelTransform,
    pub stats: ModelStats,
}

impl SceneModel {
    /// Bounds after the fit transform.
    pub fn world_bounds(&self) -> Aabb {
        self.bounds.transformed(&self.transform.matrix())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// `None` renders a transparent background.
    pub background: Option<Color>,
    lights: Vec<Light>,
    model: Option<SceneModel>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// An empty scene with a transparent background and no lights.
    pub fn new() -> Self {
        Self {
            background: None,
            lights: Vec::new(),
            model: None,
        }
    }

    pub fn with_default_lighting() -> Self {
        let mut scene = Self::new();
        scene.lights = default_lighting();
        scene
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn set_model(&mut self, model: SceneModel) {
        self.model = Some(model);
    }

    pub fn clear_model(&mut self) -> Option<SceneModel> {
        self.model.take()
    }

    pub fn model(&self) -> Option<&SceneModel> {
        self.model.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn no_offset() -> FitOptions {
        FitOptions {
            size: 2.0,
            vertical_offset: 0.0,
            rotation_y: 0.0,
        }
    }

    #[test]
    fn test_color_from_hex() {
        let c = Color::from_hex(0xc054ff);
        assert_relative_eq!(c.r, 192.0 / 255.0);
        assert_relative_eq!(c.g, 84.0 / 255.0);
        assert_relative_eq!(c.b, 1.0);
    }

    #[test]
    fn test_default_lighting_rig() {
        let scene = Scene::with_default_lighting();
        assert_eq!(scene.lights().len(), 4);
        assert!(matches!(scene.lights()[0], Light::Ambient { intensity, .. } if intensity == 0.5));
        let directional = scene
            .lights()
            .iter()
            .filter(|l| matches!(l, Light::Directional { .. }))
            .count();
        assert_eq!(directional, 3);
        assert!(scene.background.is_none());
    }

    #[test]
    fn test_fit_scales_largest_dimension_to_two() {
        let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(8.0, 2.0, 4.0));
        let transform = fit_to_viewport(&bounds, &no_offset());
        assert_relative_eq!(transform.scale, 2.0 / 8.0);
    }

    #[test]
    fn test_fit_centers_model() {
        let bounds = Aabb::new(Point3::new(10.0, -4.0, 2.0), Point3::new(14.0, 0.0, 3.0));
        let transform = fit_to_viewport(&bounds, &no_offset());
        let fitted = bounds.transformed(&transform.matrix());

        assert_relative_eq!(fitted.center().coords, Vector3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(fitted.max_extent(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_fit_with_lift_and_yaw_keeps_center_on_axis() {
        let bounds = Aabb::new(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 2.0, 2.0));
        let fit = FitOptions::default();
        let transform = fit_to_viewport(&bounds, &fit);

        let center = transform.matrix().transform_point(&bounds.center());
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.5, epsilon = 1e-5);
        assert_relative_eq!(center.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_fit_degenerate_box_keeps_unit_scale() {
        let point = Aabb::new(Point3::new(1.0, 1.0, 1.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(fit_to_viewport(&point, &no_offset()).scale, 1.0);
        assert_eq!(fit_to_viewport(&Aabb::empty(), &no_offset()).scale, 1.0);
    }
}
