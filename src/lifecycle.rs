//! Abstracts how apps are run: starts each on its own task, delivers an
//! exit callback (spec.md §2, §5).

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::App;
use crate::pane::PaneId;

/// Starts an app on its own tokio task and reports completion via a callback
/// dispatched back onto the caller-provided channel. The engine never blocks
/// on an app's `run()`.
#[derive(Default)]
pub struct AppLifecycleManager;

impl AppLifecycleManager {
    pub fn new() -> Self {
        Self
    }

    /// Spawns `app.run()` on its own task. `on_exit` is invoked (on the
    /// tokio runtime, not the draw loop) with the pane id and any error once
    /// the app's `run()` returns. Workspaces route this back to the draw
    /// loop via their own channel to preserve single-writer tree mutation.
    pub fn start(
        &self,
        pane: PaneId,
        mut app: Box<dyn App>,
        on_exit: impl FnOnce(PaneId, Box<dyn App>, Option<anyhow::Error>) + Send + 'static,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(pane = %pane, "app task starting");
            let result = tokio::task::block_in_place(|| app.run());
            match &result {
                Ok(()) => debug!(pane = %pane, "app task exited cleanly"),
                Err(e) => warn!(pane = %pane, error = %e, "app task exited with error"),
            }
            on_exit(pane, app, result.err());
        })
    }

    /// Stops an app. Expected to be idempotent and bounded; the manager does
    /// not force-kill.
    pub fn stop(&self, app: &mut dyn App) {
        app.stop();
    }
}
