//! The seams between a viewer session and the rendering library.

use super::camera::PerspectiveCamera;
use super::scene::{Color, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, 1.0 for an empty size.
    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Identifies a render surface attached to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct RendererSettings {
    pub antialias: bool,
    /// Keep an alpha channel so the page shows through the background.
    pub alpha: bool,
    pub clear_color: Color,
    pub clear_alpha: f32,
    pub srgb_output: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
            clear_color: Color::BLACK,
            clear_alpha: 0.0,
            srgb_output: true,
        }
    }
}

/// A drawing surface owned by one viewer session.
pub trait Renderer: Send {
    fn surface_id(&self) -> SurfaceId;
    fn size(&self) -> Size;
    fn set_size(&mut self, size: Size);
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);
}

/// Creates renderers; one per session.
pub trait RenderBackend: Send + Sync {
    fn create_renderer(&self, size: Size, settings: &RendererSettings) -> Box<dyn Renderer>;
}

/// The host element a viewer draws into.
pub trait Container: Send + Sync {
    /// Current client area in pixels.
    fn client_size(&self) -> Size;
    fn append_surface(&self, surface: SurfaceId);
    fn remove_surface(&self, surface: SurfaceId);
}
