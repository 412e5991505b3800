use std::sync::Arc;

use tracing::debug;

use super::loader::ModelSource;
use super::session::ViewerSession;
use super::surface::{Container, RenderBackend};
use super::{ViewerError, ViewerOptions};

/// The mount point for a viewer inside a host container.
///
/// Holds at most one [`ViewerSession`]. Showing a different model tears the
/// current session down completely and mounts a fresh one.
pub struct ModelViewer {
    container: Arc<dyn Container>,
    backend: Arc<dyn RenderBackend>,
    options: ViewerOptions,
    http: reqwest::Client,
    session: Option<ViewerSession>,
}

impl ModelViewer {
    pub fn new(
        container: Arc<dyn Container>,
        backend: Arc<dyn RenderBackend>,
        options: ViewerOptions,
        http: reqwest::Client,
    ) -> Self {
        Self {
            container,
            backend,
            options,
            http,
            session: None,
        }
    }

    /// Display `source`. Showing the model already on screen does nothing.
    pub fn show(&mut self, source: impl Into<ModelSource>) -> Result<(), ViewerError> {
        let source = source.into();
        if self.session.as_ref().is_some_and(|s| *s.source() == source) {
            debug!("{} is already shown", source);
            return Ok(());
        }

        self.unmount();
        self.session = Some(ViewerSession::mount(
            Arc::clone(&self.container),
            self.backend.as_ref(),
            source,
            &self.options,
            self.http.clone(),
        )?);
        Ok(())
    }

    /// Dispose the current session, if any.
    pub fn unmount(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.dispose();
        }
    }

    pub fn session(&self) -> Option<&ViewerSession> {
        self.session.as_ref()
    }

    /// Forward a container resize to the live session.
    pub fn handle_resize(&self) {
        if let Some(session) = &self.session {
            session.handle_resize();
        }
    }
}

impl Drop for ModelViewer {
    fn drop(&mut self) {
        self.unmount();
    }
}
