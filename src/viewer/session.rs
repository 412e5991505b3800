//! One viewer bound to one container and one model.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use nalgebra::Point3;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::camera::PerspectiveCamera;
use super::controls::OrbitControls;
use super::frame_loop::FrameLoop;
use super::loader::{self, LoadedModel, ModelSource};
use super::scene::{fit_to_viewport, FitOptions, ModelTransform, Scene, SceneModel};
use super::surface::{Container, RenderBackend, Renderer, RendererSettings, Size, SurfaceId};
use super::{ViewerError, ViewerOptions};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerStatus {
    /// Set up and waiting for the model.
    Loading,
    /// Model placed; the render loop is running.
    Ready,
    /// The model could not be loaded. Nothing is rendered.
    Failed(String),
    Disposed,
}

impl fmt::Display for ViewerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerStatus::Loading => write!(f, "loading"),
            ViewerStatus::Ready => write!(f, "ready"),
            ViewerStatus::Failed(reason) => write!(f, "failed: {}", reason),
            ViewerStatus::Disposed => write!(f, "disposed"),
        }
    }
}

/// State shared by the session owner, the load task and the render loop.
struct SessionCore {
    status: ViewerStatus,
    status_tx: watch::Sender<ViewerStatus>,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    renderer: Box<dyn Renderer>,
    frame_loop: Option<FrameLoop>,
    fit: FitOptions,
    frame_period: Duration,
}

impl SessionCore {
    fn set_status(&mut self, status: ViewerStatus) {
        debug!("Viewer status: {} -> {}", self.status, status);
        self.status = status.clone();
        self.status_tx.send_replace(status);
    }

    fn finish_load(&mut self, label: String, result: Result<LoadedModel, ViewerError>, this: Weak<Mutex<SessionCore>>) {
        if self.status != ViewerStatus::Loading {
            debug!("Discarding load result for {}: session is {}", label, self.status);
            return;
        }

        match result {
            Ok(model) => {
                let transform = fit_to_viewport(&model.bounds, &self.fit);
                info!(
                    "Model {} ready (scale {:.4}, {} triangles)",
                    label, transform.scale, model.stats.triangle_count
                );
                self.scene.set_model(SceneModel {
                    label,
                    bounds: model.bounds,
                    transform,
                    stats: model.stats,
                });
                self.set_status(ViewerStatus::Ready);
                self.frame_loop = Some(FrameLoop::start(self.frame_period, move || render_frame(&this)));
            }
            Err(e) => {
                error!("{}", e);
                self.set_status(ViewerStatus::Failed(e.to_string()));
            }
        }
    }

    /// A render loop that stopped on its own while `Ready` has died: report it.
    fn check_frame_loop(&mut self) {
        if self.status != ViewerStatus::Ready {
            return;
        }
        if self.frame_loop.as_ref().is_some_and(|frames| !frames.is_running()) {
            error!("Render loop stopped unexpectedly");
            self.frame_loop = None;
            self.set_status(ViewerStatus::Failed("render loop stopped unexpectedly".to_string()));
        }
    }

    /// Draw, then advance the controls.
    fn render(&mut self) {
        let SessionCore {
            scene,
            camera,
            controls,
            renderer,
            ..
        } = self;
        renderer.render(scene, camera);
        controls.update(camera);
    }
}

fn render_frame(core: &Weak<Mutex<SessionCore>>) -> ControlFlow<()> {
    let Some(shared) = core.upgrade() else {
        return ControlFlow::Break(());
    };
    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.status != ViewerStatus::Ready {
        return ControlFlow::Break(());
    }
    guard.render();
    ControlFlow::Continue(())
}

/// A live viewer.
///
/// Mounting sets up the scene synchronously and starts loading the model in
/// the background; the render loop starts once the model is placed. The
/// session's surface stays attached to the container until
/// [`dispose`](Self::dispose), which also runs on drop.
pub struct ViewerSession {
    core: Arc<Mutex<SessionCore>>,
    status_rx: watch::Receiver<ViewerStatus>,
    load_task: Option<JoinHandle<()>>,
    container: Arc<dyn Container>,
    surface: SurfaceId,
    source: ModelSource,
}

impl ViewerSession {
    /// Mount a viewer for `source` into `container`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(
        container: Arc<dyn Container>,
        backend: &dyn RenderBackend,
        source: ModelSource,
        options: &ViewerOptions,
        http: reqwest::Client,
    ) -> Result<Self, ViewerError> {
        options.validate()?;
        let size = container.client_size();
        if size.is_empty() {
            return Err(ViewerError::InvalidContainer {
                width: size.width,
                height: size.height,
            });
        }

        let mut camera = PerspectiveCamera::new(options.fov_degrees, size.aspect(), options.near, options.far);
        camera.set_position(Point3::new(0.0, 0.0, options.camera_distance));
        camera.look_at(Point3::origin());

        let renderer = backend.create_renderer(size, &RendererSettings::default());
        let surface = renderer.surface_id();
        container.append_surface(surface);

        let (status_tx, status_rx) = watch::channel(ViewerStatus::Loading);
        let core = Arc::new(Mutex::new(SessionCore {
            status: ViewerStatus::Loading,
            status_tx,
            scene: Scene::with_default_lighting(),
            camera,
            controls: OrbitControls::new(options),
            renderer,
            frame_loop: None,
            fit: options.fit_options(),
            frame_period: options.frame_period(),
        }));

        info!("Viewer mounted at {}x{}, loading {}", size.width, size.height, source);

        let weak = Arc::downgrade(&core);
        let load_source = source.clone();
        let load_task = tokio::spawn(async move {
            let result = loader::load_model(&load_source, &http).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            guard.finish_load(load_source.label(), result, Arc::downgrade(&shared));
        });

        Ok(Self {
            core,
            status_rx,
            load_task: Some(load_task),
            container,
            surface,
            source,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop rendering, abort an unfinished load, detach the surface and
    /// release the controls. Safe to call more than once.
    pub fn dispose(&mut self) {
        {
            let mut core = self.lock();
            if core.status == ViewerStatus::Disposed {
                return;
            }
            if let Some(frames) = core.frame_loop.take() {
                frames.cancel();
            }
            core.controls.dispose();
            core.scene.clear_model();
            core.set_status(ViewerStatus::Disposed);
        }

        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        self.container.remove_surface(self.surface);
        info!("Viewer for {} disposed", self.source);
    }

    /// Follow the container's current size. Zero-area sizes are ignored.
    pub fn handle_resize(&self) {
        let size = self.container.client_size();
        if size.is_empty() {
            debug!("Ignoring resize to {}x{}", size.width, size.height);
            return;
        }
        let mut core = self.lock();
        if core.status == ViewerStatus::Disposed {
            return;
        }
        core.camera.set_aspect(size.aspect());
        core.renderer.set_size(size);
    }

    /// Pointer drag over the surface, in pixels.
    pub fn pointer_drag(&self, dx: f32, dy: f32) {
        let mut core = self.lock();
        let height = core.renderer.size().height;
        core.controls.handle_pointer_drag(dx, dy, height);
    }

    pub fn wheel(&self, delta_y: f32) {
        self.lock().controls.handle_wheel(delta_y);
    }

    pub fn status(&self) -> ViewerStatus {
        let mut core = self.lock();
        core.check_frame_loop();
        core.status.clone()
    }

    /// Wait until the session leaves `Loading` and return the new status.
    pub async fn wait_until_settled(&self) -> ViewerStatus {
        let mut rx = self.status_rx.clone();
        let settled = rx
            .wait_for(|status| *status != ViewerStatus::Loading)
            .await
            .map(|status| status.clone());
        match settled {
            Ok(status) => status,
            Err(_) => self.status(),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface
    }

    /// The placed model, once loaded.
    pub fn model(&self) -> Option<SceneModel> {
        self.lock().scene.model().cloned()
    }

    pub fn model_transform(&self) -> Option<ModelTransform> {
        self.lock().scene.model().map(|m| m.transform)
    }

    pub fn renderer_size(&self) -> Size {
        self.lock().renderer.size()
    }

    pub fn camera(&self) -> PerspectiveCamera {
        self.lock().camera.clone()
    }

    pub fn is_frame_loop_running(&self) -> bool {
        let mut core = self.lock();
        core.check_frame_loop();
        core.frame_loop.as_ref().is_some_and(FrameLoop::is_running)
    }
}

impl fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerSession")
            .field("source", &self.source)
            .field("surface", &self.surface)
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ModelArtifact;
    use crate::viewer::demo::demo_model_glb;
    use crate::viewer::headless::{HeadlessBackend, HeadlessContainer};

    fn mount(container: Arc<HeadlessContainer>, backend: &HeadlessBackend, source: ModelSource) -> ViewerSession {
        ViewerSession::mount(
            container,
            backend,
            source,
            &ViewerOptions::default(),
            reqwest::Client::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mount_sets_up_camera() {
        let container = Arc::new(HeadlessContainer::new(800, 400));
        let backend = HeadlessBackend::new();
        let session = mount(container.clone(), &backend, ModelArtifact::new(demo_model_glb()).into());

        let camera = session.camera();
        assert_eq!(camera.aspect, 2.0);
        assert_eq!(camera.fov_degrees, 45.0);
        assert_eq!(camera.position(), Point3::new(0.0, 0.0, 4.0));
        assert_eq!(container.surfaces(), vec![session.surface_id()]);
    }

    #[tokio::test]
    async fn test_ready_starts_render_loop() {
        let container = Arc::new(HeadlessContainer::new(640, 480));
        let backend = HeadlessBackend::new();
        let session = mount(container, &backend, ModelArtifact::new(demo_model_glb()).into());

        assert_eq!(session.wait_until_settled().await, ViewerStatus::Ready);
        assert!(session.is_frame_loop_running());
        assert!(session.model().is_some());
    }

    #[tokio::test]
    async fn test_failed_load_does_not_render() {
        let container = Arc::new(HeadlessContainer::new(640, 480));
        let backend = HeadlessBackend::new();
        let session = mount(container, &backend, ModelArtifact::new(b"nope".to_vec()).into());

        let status = session.wait_until_settled().await;
        assert!(matches!(status, ViewerStatus::Failed(_)), "{:?}", status);
        assert!(!session.is_frame_loop_running());
        assert_eq!(backend.stats().frames(), 0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_options_before_mounting() {
        let container = Arc::new(HeadlessContainer::new(640, 480));
        let backend = HeadlessBackend::new();
        let options = ViewerOptions {
            near: 5.0,
            far: 5.0,
            ..ViewerOptions::default()
        };
        let err = ViewerSession::mount(
            container.clone(),
            &backend,
            ModelArtifact::new(demo_model_glb()).into(),
            &options,
            reqwest::Client::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ViewerError::InvalidOptions { option: "far", .. }), "{:?}", err);
        assert!(container.surfaces().is_empty());
    }

    #[tokio::test]
    async fn test_dead_render_loop_is_not_ready() {
        let container = Arc::new(HeadlessContainer::new(640, 480));
        let backend = HeadlessBackend::new();
        let session = mount(container, &backend, ModelArtifact::new(demo_model_glb()).into());
        assert_eq!(session.wait_until_settled().await, ViewerStatus::Ready);

        // An inverted distance range makes the next controls update panic.
        {
            let mut core = session.lock();
            core.controls.min_distance = 5.0;
            core.controls.max_distance = 2.0;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!session.is_frame_loop_running());
        assert!(matches!(session.status(), ViewerStatus::Failed(_)), "{:?}", session.status());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let container = Arc::new(HeadlessContainer::new(640, 480));
        let backend = HeadlessBackend::new();
        let mut session = mount(container.clone(), &backend, ModelArtifact::new(demo_model_glb()).into());

        session.dispose();
        session.dispose();
        assert_eq!(session.status(), ViewerStatus::Disposed);
        assert!(container.surfaces().is_empty());
    }
}
