//! A pane: one hosted app plus the bookkeeping the compositor needs to draw
//! and address it (spec.md §3, §9 design notes).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app::App;
use crate::buffer::Buffer;

/// Stable 128-bit identity, carried across snapshot/restore. Distinct from
/// [`PaneHandle`], the arena index used for in-process lookups — an id
/// survives a restore into a new process, a handle does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PaneId(pub Uuid);

impl PaneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a workspace's pane arena. `usize::MAX` is never a valid index;
/// handles are only ever produced by the arena that owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneHandle(pub usize);

/// One hosted app plus its last rendered frame and dirty flag.
pub struct Pane {
    pub id: PaneId,
    app: Box<dyn App>,
    app_type: String,
    last_frame: Buffer,
    prev_title: String,
    needs_render: Arc<AtomicBool>,
    cols: u16,
    rows: u16,
    is_resizing: bool,
    rounded_corners: bool,
    z_order: i32,
}

impl Pane {
    /// Wraps `app` (registered under `app_type`) into a pane of size
    /// `cols` x `rows`, wires its refresh notifier, and installs its pane id.
    pub fn new(app_type: impl Into<String>, mut app: Box<dyn App>, cols: u16, rows: u16) -> Self {
        let id = PaneId::new();
        app.set_pane_id(id);
        app.resize(cols, rows);
        let needs_render = Arc::new(AtomicBool::new(true));
        Self {
            id,
            app,
            app_type: app_type.into(),
            last_frame: Buffer::blank(cols, rows),
            prev_title: String::new(),
            needs_render,
            cols,
            rows,
            is_resizing: false,
            rounded_corners: false,
            z_order: 0,
        }
    }

    /// Reconstructs a pane from a snapshot, preserving its original id
    /// rather than minting a new one (spec.md §4.5 restore step 1: "Create
    /// all panes first (with their preserved ids...)").
    pub fn from_snapshot(id: PaneId, app_type: impl Into<String>, mut app: Box<dyn App>, cols: u16, rows: u16) -> Self {
        app.set_pane_id(id);
        app.resize(cols, rows);
        let needs_render = Arc::new(AtomicBool::new(true));
        Self {
            id,
            app,
            app_type: app_type.into(),
            last_frame: Buffer::blank(cols, rows),
            prev_title: String::new(),
            needs_render,
            cols,
            rows,
            is_resizing: false,
            rounded_corners: false,
            z_order: 0,
        }
    }

    pub fn app_type(&self) -> &str {
        &self.app_type
    }

    pub fn app(&self) -> &dyn App {
        self.app.as_ref()
    }

    pub fn app_mut(&mut self) -> &mut dyn App {
        self.app.as_mut()
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Installs a capacity-1 coalesced-notify channel on the app and returns
    /// the receiver half for the caller (workspace dispatcher) to poll.
    pub fn wire_refresh_channel(&mut self) -> (Arc<AtomicBool>, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        self.app.set_refresh_notifier(tx);
        (self.needs_render.clone(), rx)
    }

    pub fn mark_dirty(&self) {
        self.needs_render.store(true, Ordering::Relaxed);
    }

    pub fn is_dirty(&self) -> bool {
        self.needs_render.load(Ordering::Relaxed)
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) == (self.cols, self.rows) {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.app.resize(cols, rows);
        self.mark_dirty();
    }

    /// Renders the app if dirty, caching the result; otherwise returns the
    /// cached frame. Clears the dirty flag on a fresh render. A cache hit
    /// also requires the app's title to be unchanged (spec.md §4.2, §3: a
    /// title-only change must not return a stale frame).
    pub fn render_cached(&mut self) -> &Buffer {
        let title = self.app.title();
        let title_changed = title != self.prev_title;
        self.prev_title = title;
        if self.needs_render.swap(false, Ordering::Relaxed) || title_changed {
            self.last_frame = self.app.render();
        }
        &self.last_frame
    }

    pub fn title(&self) -> String {
        self.app.title()
    }

    pub fn is_resizing(&self) -> bool {
        self.is_resizing
    }

    pub fn set_resizing(&mut self, value: bool) {
        self.is_resizing = value;
    }

    pub fn rounded_corners(&self) -> bool {
        self.rounded_corners
    }

    pub fn set_rounded_corners(&mut self, value: bool) {
        self.rounded_corners = value;
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn set_z_order(&mut self, value: i32) {
        self.z_order = value;
    }

    /// Swaps in a replacement app at this pane's position, preserving the
    /// pane id (used by control-mode "replace" and restore-with-no-factory).
    pub fn replace_app(&mut self, app_type: impl Into<String>, mut app: Box<dyn App>) {
        app.set_pane_id(self.id);
        app.resize(self.cols, self.rows);
        self.app_type = app_type.into();
        self.app = app;
        self.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::KeyEvent;
    use crate::cell::Style;

    /// An app whose title can be flipped from the outside without marking
    /// itself dirty, so tests can isolate `render_cached`'s title check.
    struct RetitlableApp {
        title: String,
    }

    impl App for RetitlableApp {
        fn resize(&mut self, _cols: u16, _rows: u16) {}

        fn render(&mut self) -> Buffer {
            let mut buf = Buffer::blank(1, 1);
            buf.set_str(0, 0, "x", Style::default());
            buf
        }

        fn title(&self) -> String {
            self.title.clone()
        }

        fn handle_key(&mut self, _key: KeyEvent) {}
    }

    #[test]
    fn render_cached_reuses_frame_when_not_dirty_and_title_unchanged() {
        let mut pane = Pane::new("retitlable", Box::new(RetitlableApp { title: "a".into() }), 1, 1);
        pane.render_cached();
        assert!(!pane.is_dirty());
        // Second call with nothing changed must not re-render (no way to
        // observe that directly here beyond it not panicking and the dirty
        // flag staying clear), but a title change below must force one.
        pane.render_cached();
        assert!(!pane.is_dirty());
    }

    #[test]
    fn render_cached_invalidates_on_title_change_alone() {
        use std::sync::{Arc, Mutex};

        struct Flippable {
            title: Arc<Mutex<String>>,
        }
        impl App for Flippable {
            fn resize(&mut self, _cols: u16, _rows: u16) {}
            fn render(&mut self) -> Buffer {
                let mut buf = Buffer::blank(1, 1);
                let ch = self.title.lock().unwrap().chars().next().unwrap_or(' ');
                buf.set_str(0, 0, &ch.to_string(), Style::default());
                buf
            }
            fn title(&self) -> String {
                self.title.lock().unwrap().clone()
            }
            fn handle_key(&mut self, _key: KeyEvent) {}
        }

        let title = Arc::new(Mutex::new("first".to_string()));
        let mut pane = Pane::new("flippable", Box::new(Flippable { title: title.clone() }), 1, 1);
        let first = pane.render_cached().clone();
        assert_eq!(first.get(0, 0).unwrap().ch, 'f');
        // Not dirty anymore, and the title hasn't changed: cached frame reused.
        assert!(!pane.is_dirty());

        // Title changes underneath the pane without marking it dirty.
        *title.lock().unwrap() = "second".into();
        let second = pane.render_cached();
        assert_eq!(second.get(0, 0).unwrap().ch, 's');
    }

    #[test]
    fn is_resizing_defaults_false_and_is_settable() {
        let mut pane = Pane::new("x", Box::new(RetitlableApp { title: "x".into() }), 1, 1);
        assert!(!pane.is_resizing());
        pane.set_resizing(true);
        assert!(pane.is_resizing());
        pane.set_resizing(false);
        assert!(!pane.is_resizing());
    }

    #[test]
    fn z_order_and_rounded_corners_default_and_are_settable() {
        let mut pane = Pane::new("x", Box::new(RetitlableApp { title: "x".into() }), 1, 1);
        assert_eq!(pane.z_order(), 0);
        assert!(!pane.rounded_corners());
        pane.set_z_order(3);
        pane.set_rounded_corners(true);
        assert_eq!(pane.z_order(), 3);
        assert!(pane.rounded_corners());
    }
}
