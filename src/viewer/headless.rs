//! Offscreen render backend.
//!
//! Nothing is rasterized: every render call is recorded so tests and the
//! server can see what a session would have drawn, and when.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use nalgebra::Point3;
use tracing::debug;

use super::camera::PerspectiveCamera;
use super::scene::Scene;
use super::surface::{Container, RenderBackend, Renderer, RendererSettings, Size, SurfaceId};

/// What one render call saw.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub surface: SurfaceId,
    pub size: Size,
    pub camera_position: Point3<f32>,
    /// Scale of the fitted model, if one was in the scene.
    pub model_scale: Option<f32>,
}

/// Counters shared by every renderer of one backend.
#[derive(Debug, Default)]
pub struct FrameStats {
    frames: AtomicU64,
    model_frames: AtomicU64,
    last: Mutex<Option<FrameRecord>>,
}

impl FrameStats {
    /// Render calls so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// Render calls that had a model in the scene.
    pub fn model_frames(&self) -> u64 {
        self.model_frames.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Option<FrameRecord> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, record: FrameRecord) {
        self.frames.fetch_add(1, Ordering::SeqCst);
        if record.model_scale.is_some() {
            self.model_frames.fetch_add(1, Ordering::SeqCst);
        }
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(record);
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    next_surface: Arc<AtomicU64>,
    stats: Arc<FrameStats>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<FrameStats> {
        Arc::clone(&self.stats)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_renderer(&self, size: Size, settings: &RendererSettings) -> Box<dyn Renderer> {
        let id = SurfaceId(self.next_surface.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(
            "Headless surface {} created at {}x{} (antialias: {}, alpha: {})",
            id.0,
            size.width,
            size.height,
            settings.antialias,
            settings.alpha
        );
        Box::new(HeadlessRenderer {
            id,
            size,
            stats: Arc::clone(&self.stats),
        })
    }
}

#[derive(Debug)]
pub struct HeadlessRenderer {
    id: SurfaceId,
    size: Size,
    stats: Arc<FrameStats>,
}

impl Renderer for HeadlessRenderer {
    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn size(&self) -> Size {
        self.size
    }

    fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        self.stats.record(FrameRecord {
            surface: self.id,
            size: self.size,
            camera_position: camera.position(),
            model_scale: scene.model().map(|m| m.transform.scale),
        });
    }
}

/// A container with a settable client size that tracks attached surfaces.
#[derive(Debug, Default)]
pub struct HeadlessContainer {
    size: Mutex<Size>,
    surfaces: Mutex<Vec<SurfaceId>>,
}

impl HeadlessContainer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new(Size::new(width, height)),
            surfaces: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the host element being resized.
    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = Size::new(width, height);
    }

    pub fn surfaces(&self) -> Vec<SurfaceId> {
        self.surfaces.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Container for HeadlessContainer {
    fn client_size(&self) -> Size {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_surface(&self, surface: SurfaceId) {
        self.surfaces.lock().unwrap_or_else(PoisonError::into_inner).push(surface);
    }

    fn remove_surface(&self, surface: SurfaceId) {
        self.surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| *s != surface);
    }
}
