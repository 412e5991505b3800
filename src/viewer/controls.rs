//! Orbit controls: rotate and dolly the camera around a focal point.

use std::f32::consts::PI;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use super::camera::PerspectiveCamera;
use super::ViewerOptions;

/// Keeps the polar angle away from the poles so `look_at` stays defined.
const POLAR_EPSILON: f32 = 1e-6;

/// Smallest camera displacement reported as movement.
const MOVE_EPSILON: f32 = 1e-6;

/// Zoom step per wheel notch at `zoom_speed == 1`.
const ZOOM_STEP: f32 = 0.95;

/// Camera offset from the target in spherical coordinates (Y up).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth around Y, measured from +Z towards +X.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: &Vector3<f32>) -> Self {
        let radius = offset.norm();
        if radius <= f32::EPSILON {
            return Self {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Mouse/touch orbit handler bound to one render surface.
///
/// Input accumulates into a pending rotation and zoom; [`update`](Self::update)
/// applies it to the camera once per frame, together with damping and
/// auto-rotation.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    /// 1.0 is one full turn per minute at 60 frames per second.
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    target: Point3<f32>,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    attached: bool,
}

impl OrbitControls {
    pub fn new(options: &ViewerOptions) -> Self {
        Self {
            enable_damping: options.enable_damping,
            damping_factor: options.damping_factor,
            auto_rotate: options.auto_rotate,
            auto_rotate_speed: options.auto_rotate_speed,
            rotate_speed: options.rotate_speed,
            enable_zoom: options.enable_zoom,
            zoom_speed: options.zoom_speed,
            min_distance: options.min_distance.unwrap_or(0.0),
            max_distance: options.max_distance.unwrap_or(f32::INFINITY),
            target: Point3::origin(),
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            attached: true,
        }
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn set_target(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Stop listening for input and drop pending motion.
    pub fn dispose(&mut self) {
        if self.attached {
            debug!("Orbit controls detached");
        }
        self.attached = false;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Pointer drag of `dx`, `dy` pixels over a surface `surface_height` pixels tall.
    pub fn handle_pointer_drag(&mut self, dx: f32, dy: f32, surface_height: u32) {
        if !self.attached || surface_height == 0 {
            return;
        }
        let height = surface_height as f32;
        self.rotate_left(2.0 * PI * dx / height * self.rotate_speed);
        self.rotate_up(2.0 * PI * dy / height * self.rotate_speed);
    }

    /// Wheel motion; negative `delta_y` zooms in. Ignored while zoom is disabled.
    pub fn handle_wheel(&mut self, delta_y: f32) {
        if !self.attached || !self.enable_zoom {
            return;
        }
        let step = self.zoom_scale();
        if delta_y < 0.0 {
            self.scale *= step;
        } else if delta_y > 0.0 {
            self.scale /= step;
        }
    }

    fn zoom_scale(&self) -> f32 {
        ZOOM_STEP.powf(self.zoom_speed)
    }

    fn auto_rotation_angle(&self) -> f32 {
        2.0 * PI / 60.0 / 60.0 * self.auto_rotate_speed
    }

    /// Apply pending motion to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let before = camera.position();
        let offset = before - self.target;
        let mut spherical = Spherical::from_offset(&offset);

        if self.auto_rotate && self.attached {
            self.rotate_left(self.auto_rotation_angle());
        }

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }
        spherical.phi = spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.set_position(self.target + spherical.to_offset());
        camera.look_at(self.target);

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        (camera.position() - before).norm() > MOVE_EPSILON
    }
}
