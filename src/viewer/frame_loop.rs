use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a running render loop.
///
/// The loop calls its frame callback once per period until the callback
/// breaks or the handle is cancelled. Dropping the handle cancels it.
#[derive(Debug)]
pub struct FrameLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl FrameLoop {
    /// Spawn the loop on the current tokio runtime. The first frame runs
    /// immediately.
    pub fn start<F>(period: Duration, mut frame: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if frame().is_break() {
                            break;
                        }
                    }
                }
            }
            debug!("Render loop stopped");
        });
        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
