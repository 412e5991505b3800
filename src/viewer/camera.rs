use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector3};

/// The view point from which the model is rendered.
///
/// A perspective (pinhole) camera that always looks at a target point. The
/// view and projection matrices are kept in sync with the camera parameters;
/// after changing `aspect` by hand call
/// [`update_projection_matrix`](Self::update_projection_matrix).
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Width over height of the render surface.
    pub aspect: f32,
    /// Near plane distance. Must be greater than `0.0` and less than `far`.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,

    position: Point3<f32>,
    target: Point3<f32>,
    up: Vector3<f32>,
    projection_matrix: Matrix4<f32>,
    view_matrix: Matrix4<f32>,
}

impl PerspectiveCamera {
    /// Creates a camera at the origin looking down -Z.
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: Point3::origin(),
            target: Point3::new(0.0, 0.0, -1.0),
            up: Vector3::y(),
            projection_matrix: Matrix4::identity(),
            view_matrix: Matrix4::identity(),
        };
        camera.update_projection_matrix();
        camera.update_view_matrix();
        camera
    }

    /// Recomputes the projection matrix from `fov_degrees`, `aspect`, `near`, `far`.
    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix =
            Perspective3::new(self.aspect, self.fov_degrees.to_radians(), self.near, self.far)
                .to_homogeneous();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    /// Moves the camera, keeping its current target.
    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
        self.update_view_matrix();
    }

    /// Turns the camera towards `target`.
    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
        self.update_view_matrix();
    }

    fn update_view_matrix(&mut self) {
        // Degenerate when position == target; keep the previous view then.
        if (self.position - self.target).norm_squared() <= f32::EPSILON {
            return;
        }
        self.view_matrix = Isometry3::look_at_rh(&self.position, &self.target, &self.up).to_homogeneous();
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection_matrix
    }

    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view_matrix
    }

    pub fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix * self.view_matrix
    }
}
