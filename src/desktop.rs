//! The root coordinator: workspaces, status panes, floating panels,
//! control-mode, selection/clipboard, mouse pipeline, zoom, state broadcast
//! (spec.md §4.4).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::app::{App, KeyCode, KeyEvent, Modifiers, MouseButtons};
use crate::buffer::Buffer;
use crate::cell::{Cell, Style};
use crate::config::{EngineConfig, Theme};
use crate::apps::snapshot_app::SnapshotApp;
use crate::lifecycle::AppLifecycleManager;
use crate::pane::{Pane, PaneHandle, PaneId};
use crate::registry::{AppRegistry, SnapshotRegistry};
use crate::snapshot::{PaneSnapshot, TreeCapture};
use crate::tree::{Axis, Direction, Rect};
use crate::workspace::Workspace;

/// The fixed chord that toggles control mode (spec.md §4.4: "a fixed
/// chord"). Modeled as Ctrl+b, the conventional tmux-family prefix.
pub fn is_control_toggle_chord(key: &KeyEvent) -> bool {
    key.mods.ctrl && key.code == KeyCode::Char && key.ch == Some('b')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Normal,
    Control,
    ControlSubSwap,
}

/// A fixed-size strip anchored to one edge, reserving space out of the
/// workspace area (spec.md §3).
pub struct StatusPane {
    pub id: i32,
    pub side: Side,
    pub size: u16,
    pub app: Box<dyn App>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

/// A non-tiled overlay rendered above the workspace at explicit coordinates
/// (spec.md §3).
pub struct FloatingPanel {
    pub id: i32,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub modal: bool,
    pub app: Box<dyn App>,
}

/// A MIME -> bytes clipboard, guarded by its own lock so snapshot consumers
/// may read concurrently (spec.md §4.4, §5).
#[derive(Clone, Default)]
pub struct ClipboardHandle(Arc<Mutex<Clipboard>>);

#[derive(Default)]
struct Clipboard {
    slots: HashMap<String, Vec<u8>>,
    pending: Option<(String, Vec<u8>)>,
}

impl ClipboardHandle {
    pub fn get(&self, mime: &str) -> Option<Vec<u8>> {
        self.0.lock().unwrap().slots.get(mime).cloned()
    }

    pub fn set(&self, mime: impl Into<String>, bytes: Vec<u8>) {
        self.0.lock().unwrap().slots.insert(mime.into(), bytes);
    }

    fn set_pending(&self, mime: String, bytes: Vec<u8>) {
        self.0.lock().unwrap().pending = Some((mime, bytes));
    }

    /// Returns and clears the last selection-finish result. A second call
    /// without an intervening selection returns `None` (spec.md §8 property
    /// 8).
    pub fn pop_pending(&self) -> Option<(String, Vec<u8>)> {
        self.0.lock().unwrap().pending.take()
    }
}

/// Selection/clipboard drag state (spec.md §4.4).
enum SelectionState {
    Idle,
    Selecting(PaneHandle),
}

/// `StatePayload` — the only coarse external interface to observers
/// (spec.md §4.4, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct StatePayload {
    pub all_workspaces: Vec<i32>,
    pub active_workspace_id: i32,
    pub in_control_mode: bool,
    pub sub_mode: Option<String>,
    pub active_title: String,
    pub default_bg: crate::cell::Color,
    pub zoomed: bool,
    pub zoomed_pane_id: Option<PaneId>,
}

/// A state-change observer (spec.md §4.4, §6).
pub type StateListener = Box<dyn Fn(&StatePayload) + Send>;

pub struct Desktop {
    workspaces: HashMap<i32, Workspace>,
    active_workspace: i32,
    status_panes: Vec<StatusPane>,
    floating_panels: Vec<FloatingPanel>,
    pub registry: AppRegistry,
    pub snapshot_registry: SnapshotRegistry,
    lifecycle: AppLifecycleManager,
    pub theme: Theme,
    pub config: EngineConfig,
    control_state: ControlState,
    zoomed: Option<(i32, PaneHandle)>,
    clipboard: ClipboardHandle,
    selection: SelectionState,
    last_broadcast: Option<StatePayload>,
    viewport_override: Option<(u16, u16)>,
    last_viewport: (u16, u16),
    listeners: Vec<StateListener>,
    quitting: bool,
    next_status_pane_id: i32,
    next_floating_panel_id: i32,
    help_panel: Option<i32>,
}

impl Desktop {
    pub fn new(config: EngineConfig, theme: Theme, registry: AppRegistry) -> Self {
        Self {
            workspaces: HashMap::new(),
            active_workspace: 0,
            status_panes: Vec::new(),
            floating_panels: Vec::new(),
            registry,
            snapshot_registry: SnapshotRegistry::new(),
            lifecycle: AppLifecycleManager::new(),
            theme,
            config,
            control_state: ControlState::Normal,
            zoomed: None,
            clipboard: ClipboardHandle::default(),
            selection: SelectionState::Idle,
            last_broadcast: None,
            viewport_override: None,
            last_viewport: (80, 24),
            listeners: Vec::new(),
            quitting: false,
            next_status_pane_id: 0,
            next_floating_panel_id: 0,
            help_panel: None,
        }
    }

    pub fn clipboard(&self) -> ClipboardHandle {
        self.clipboard.clone()
    }

    pub fn add_state_listener(&mut self, listener: StateListener) {
        self.listeners.push(listener);
    }

    pub fn set_viewport_override(&mut self, size: Option<(u16, u16)>) {
        self.viewport_override = size;
    }

    /// Anchors `app` to `side` of the screen, reserving `size` rows/columns
    /// out of the workspace area (spec.md §4.4 "Status Pane"). Returns the
    /// pane's id for later removal.
    pub fn add_status_pane(&mut self, side: Side, size: u16, app: Box<dyn App>) -> i32 {
        let id = self.next_status_pane_id;
        self.next_status_pane_id += 1;
        self.status_panes.push(StatusPane { id, side, size, app });
        id
    }

    pub fn remove_status_pane(&mut self, id: i32) {
        if let Some(pos) = self.status_panes.iter().position(|p| p.id == id) {
            let mut sp = self.status_panes.remove(pos);
            self.lifecycle.stop(sp.app.as_mut());
        }
    }

    /// Adds a floating panel at `(x, y, w, h)`, `modal` gating whether it
    /// captures all keyboard input ahead of everything else (spec.md §4.4
    /// input routing priority #1). Returns the panel's id for later removal.
    pub fn add_floating_panel(&mut self, x: u16, y: u16, width: u16, height: u16, modal: bool, mut app: Box<dyn App>) -> i32 {
        let id = self.next_floating_panel_id;
        self.next_floating_panel_id += 1;
        app.resize(width, height);
        self.floating_panels.push(FloatingPanel { id, x, y, width, height, modal, app });
        id
    }

    pub fn remove_floating_panel(&mut self, id: i32) {
        if let Some(pos) = self.floating_panels.iter().position(|p| p.id == id) {
            let mut fp = self.floating_panels.remove(pos);
            self.lifecycle.stop(fp.app.as_mut());
        }
    }

    /// `F1` is a global hotkey, independent of control mode, that toggles a
    /// Help floating panel (spec.md §4.4).
    pub fn toggle_help_panel(&mut self) {
        if let Some(id) = self.help_panel {
            self.remove_floating_panel(id);
            self.help_panel = None;
            return;
        }
        let app: Box<dyn App> = self
            .registry
            .create("help", None)
            .unwrap_or_else(|| Box::new(crate::apps::welcome::WelcomeApp::new()));
        let id = self.add_floating_panel(4, 2, 60, 16, true, app);
        self.help_panel = Some(id);
    }

    /// Switches to workspace `id`, creating it on demand via `init_app` if
    /// it doesn't exist yet (spec.md §4.4 "Workspaces & zoom").
    pub fn switch_workspace(&mut self, id: i32, init_app: impl FnOnce() -> (String, Box<dyn App>)) {
        self.workspaces.entry(id).or_insert_with(|| {
            let (app_type, app) = init_app();
            Workspace::new(id, app_type, app)
        });
        self.active_workspace = id;
        self.zoomed = None;
        self.recalculate_layout(self.last_viewport);
    }

    pub fn active_workspace_id(&self) -> i32 {
        self.active_workspace
    }

    pub fn active_workspace(&self) -> Option<&Workspace> {
        self.workspaces.get(&self.active_workspace)
    }

    pub fn active_workspace_mut(&mut self) -> Option<&mut Workspace> {
        self.workspaces.get_mut(&self.active_workspace)
    }

    pub fn workspace_ids(&self) -> Vec<i32> {
        let mut ids: Vec<_> = self.workspaces.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The main workspace rect against the last viewport size this desktop
    /// observed (spec.md §4.4 "Query viewport size (driver or override)"),
    /// used by every interactive mouse/geometry path so they agree with
    /// whatever was last actually rendered instead of an assumed size.
    fn current_main_rect(&self) -> Rect {
        self.main_rect(self.last_viewport)
    }

    fn main_rect(&self, viewport: (u16, u16)) -> Rect {
        let (mut x, mut y) = (0u16, 0u16);
        let (mut w, mut h) = self.viewport_override.unwrap_or(viewport);
        for sp in &self.status_panes {
            match sp.side {
                Side::Top => {
                    y += sp.size;
                    h = h.saturating_sub(sp.size);
                }
                Side::Bottom => {
                    h = h.saturating_sub(sp.size);
                }
                Side::Left => {
                    x += sp.size;
                    w = w.saturating_sub(sp.size);
                }
                Side::Right => {
                    w = w.saturating_sub(sp.size);
                }
            }
        }
        Rect { x, y, width: w, height: h }
    }

    /// `recalculate_layout()` (spec.md §4.4).
    pub fn recalculate_layout(&mut self, viewport: (u16, u16)) {
        self.last_viewport = viewport;
        let main = self.main_rect(viewport);
        for sp in &mut self.status_panes {
            let (w, h) = match sp.side {
                Side::Top | Side::Bottom => (main.width, sp.size),
                Side::Left | Side::Right => (sp.size, main.height),
            };
            sp.app.resize(w, h);
        }
        if let Some((ws_id, pane)) = self.zoomed {
            if let Some(ws) = self.workspaces.get_mut(&ws_id) {
                if let Some(p) = ws.pane_mut(pane) {
                    p.resize(main.width.saturating_sub(2), main.height.saturating_sub(2));
                }
            }
        } else if let Some(ws) = self.workspaces.get_mut(&self.active_workspace) {
            ws.resize(main);
        }
        for fp in &mut self.floating_panels {
            fp.app.resize(fp.width, fp.height);
        }
    }

    pub fn toggle_control_mode(&mut self) {
        self.control_state = match self.control_state {
            ControlState::Normal => ControlState::Control,
            _ => {
                if let Some(ws) = self.active_workspace_mut() {
                    ws.keyboard_resize_selection = None;
                }
                ControlState::Normal
            }
        };
        info!(state = ?self.control_state, "control mode toggled");
        self.broadcast_state();
    }

    pub fn toggle_zoom(&mut self) {
        match self.zoomed {
            Some(_) => self.zoomed = None,
            None => {
                if let Some(ws) = self.active_workspace() {
                    self.zoomed = Some((self.active_workspace, ws.active_pane_handle()));
                }
            }
        }
        self.broadcast_state();
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoomed.is_some()
    }

    fn active_pane_title(&self) -> String {
        self.active_workspace()
            .and_then(|ws| ws.pane(ws.active_pane_handle()))
            .map(|p| p.title())
            .unwrap_or_default()
    }

    fn current_payload(&self) -> StatePayload {
        StatePayload {
            all_workspaces: self.workspace_ids(),
            active_workspace_id: self.active_workspace,
            in_control_mode: self.control_state != ControlState::Normal,
            sub_mode: match self.control_state {
                ControlState::ControlSubSwap => Some("swap".into()),
                _ => None,
            },
            active_title: self.active_pane_title(),
            default_bg: self.theme.default_bg,
            zoomed: self.zoomed.is_some(),
            zoomed_pane_id: self.zoomed.and_then(|(ws_id, pane)| {
                self.workspaces.get(&ws_id).and_then(|w| w.pane(pane)).map(|p| p.id)
            }),
        }
    }

    /// Assembles and broadcasts a [`StatePayload`] only if it differs from
    /// the last one (spec.md §4.4 — prevents redraw storms).
    fn broadcast_state(&mut self) {
        let payload = self.current_payload();
        if self.last_broadcast.as_ref() == Some(&payload) {
            return;
        }
        for listener in &self.listeners {
            listener(&payload);
        }
        self.last_broadcast = Some(payload);
    }

    /// Input routing priority (spec.md §4.4).
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::F(1) {
            self.toggle_help_panel();
            return;
        }
        if let Some(top) = self.floating_panels.iter().rposition(|p| p.modal) {
            self.floating_panels[top].app.handle_key(key);
            return;
        }
        if is_control_toggle_chord(&key) {
            self.toggle_control_mode();
            return;
        }
        if self.control_state != ControlState::Normal {
            self.handle_control_key(key);
            return;
        }
        if let Some((ws_id, pane)) = self.zoomed {
            if let Some(ws) = self.workspaces.get_mut(&ws_id) {
                if let Some(p) = ws.pane_mut(pane) {
                    p.app_mut().handle_key(key);
                }
            }
            return;
        }
        let nav_dir = shift_arrow_direction(&key);
        if let Some(ws) = self.active_workspace_mut() {
            let before = ws.active_pane_handle();
            ws.handle_key(key, nav_dir);
            if ws.active_pane_handle() != before {
                self.broadcast_state();
            }
        }
    }

    fn handle_control_key(&mut self, key: KeyEvent) {
        if self.control_state == ControlState::ControlSubSwap {
            self.control_state = ControlState::Normal;
            if let Some(dir) = arrow_direction(&key) {
                if let Some(ws) = self.active_workspace_mut() {
                    ws.swap_active(dir);
                }
            }
            self.broadcast_state();
            return;
        }

        if key.code == KeyCode::Esc {
            self.toggle_control_mode();
            return;
        }
        if key.mods.ctrl {
            if let Some(dir) = arrow_direction(&key) {
                self.interactive_resize(dir);
                return;
            }
        }
        if key.code == KeyCode::Char {
            match key.ch {
                Some(c) if c.is_ascii_digit() && c != '0' => {
                    let id = c.to_digit(10).unwrap() as i32;
                    self.switch_workspace(id, || ("welcome".into(), Box::new(crate::apps::welcome::WelcomeApp::new())));
                    self.control_state = ControlState::Normal;
                    self.broadcast_state();
                    return;
                }
                Some('x') => {
                    if self.zoomed.is_some() {
                        self.zoomed = None;
                    }
                    self.close_active_pane();
                    self.control_state = ControlState::Normal;
                    return;
                }
                Some('|') => {
                    self.split_active(Axis::Vertical);
                    self.control_state = ControlState::Normal;
                    return;
                }
                Some('-') => {
                    self.split_active(Axis::Horizontal);
                    self.control_state = ControlState::Normal;
                    return;
                }
                Some('w') => {
                    self.control_state = ControlState::ControlSubSwap;
                    return;
                }
                Some('z') => {
                    self.toggle_zoom();
                    self.control_state = ControlState::Normal;
                    return;
                }
                _ => {}
            }
        }
        self.control_state = ControlState::Normal;
        self.broadcast_state();
    }

    fn interactive_resize(&mut self, dir: Direction) {
        let area = self.current_main_rect();
        let step = self.config.resize_step;
        if let Some(ws) = self.active_workspace_mut() {
            let active = ws.active_pane_handle();
            let neighbor = ws.keyboard_resize_selection.map(|(_, n)| n).or_else(|| ws.tree.neighbor_pane(dir));
            if let Some(neighbor) = neighbor {
                ws.keyboard_resize_selection = Some((active, neighbor));
                ws.tree.adjust_ratio(active, neighbor, step);
                ws.resize(area);
            }
        }
    }

    fn split_active(&mut self, axis: Axis) {
        let area = self.current_main_rect();
        let app = self.registry.create("shell", None).unwrap_or_else(|| Box::new(crate::apps::welcome::WelcomeApp::new()));
        if let Some(ws) = self.active_workspace_mut() {
            let _ = ws.split_active(axis, "shell", app, area);
        }
        self.broadcast_state();
    }

    fn close_active_pane(&mut self) {
        let area = self.current_main_rect();
        let lifecycle = AppLifecycleManager::new();
        if let Some(ws) = self.active_workspace_mut() {
            ws.close_active(&lifecycle, || ("welcome".into(), Box::new(crate::apps::welcome::WelcomeApp::new())), area);
        }
        self.broadcast_state();
    }

    /// Mouse pipeline (spec.md §4.4).
    pub fn handle_mouse(&mut self, x: u16, y: u16, buttons: MouseButtons, mods: Modifiers) {
        let area = self.current_main_rect();
        if let Some(ws) = self.active_workspace_mut() {
            if ws.handle_mouse_resize(area, x, y, buttons) {
                return;
            }
        }
        self.drive_selection(area, x, y, buttons, mods);
    }

    pub fn handle_mouse_wheel(&mut self, x: u16, y: u16, delta: i32) {
        let area = self.current_main_rect();
        if let Some(ws) = self.active_workspace_mut() {
            if let Some(pane_handle) = ws.tree.pane_at(area, x, y) {
                if let Some(pane) = ws.pane_mut(pane_handle) {
                    if let Some(wheel) = pane.app_mut().as_mouse_wheel_handler() {
                        wheel.handle_wheel(x, y, delta);
                    }
                }
            }
        }
    }

    fn drive_selection(&mut self, area: Rect, x: u16, y: u16, buttons: MouseButtons, _mods: Modifiers) {
        match self.selection {
            SelectionState::Idle => {
                if buttons.left {
                    if let Some(ws) = self.active_workspace_mut() {
                        if let Some(pane_handle) = ws.tree.pane_at(area, x, y) {
                            let started = ws.pane_mut(pane_handle).and_then(|pane| {
                                pane.app_mut().as_selection_handler().map(|h| h.start(x, y))
                            });
                            if started == Some(true) {
                                self.selection = SelectionState::Selecting(pane_handle);
                                return;
                            }
                            ws.tree.set_active_pane(pane_handle);
                        }
                    }
                    self.broadcast_state();
                }
            }
            SelectionState::Selecting(pane_handle) => {
                if !buttons.left {
                    if let Some(ws) = self.active_workspace_mut() {
                        if let Some(pane) = ws.pane_mut(pane_handle) {
                            if let Some(handler) = pane.app_mut().as_selection_handler() {
                                if let Some((mime, bytes, keep)) = handler.finish(x, y) {
                                    if keep {
                                        self.clipboard.set_pending(mime.clone(), bytes.clone());
                                        self.clipboard.set(mime, bytes);
                                    }
                                }
                            }
                        }
                    }
                    self.selection = SelectionState::Idle;
                    return;
                }
                if let Some(ws) = self.active_workspace_mut() {
                    if let Some(pane) = ws.pane_mut(pane_handle) {
                        if let Some(handler) = pane.app_mut().as_selection_handler() {
                            handler.update(x, y);
                        }
                    }
                }
            }
        }
    }

    /// Cancels an in-progress selection if the button was lost mid-drag
    /// (spec.md §4.4 "button lost mid-drag").
    pub fn cancel_selection_on_button_loss(&mut self) {
        if let SelectionState::Selecting(pane_handle) = self.selection {
            if let Some(ws) = self.active_workspace_mut() {
                if let Some(pane) = ws.pane_mut(pane_handle) {
                    if let Some(handler) = pane.app_mut().as_selection_handler() {
                        handler.cancel();
                    }
                }
            }
            self.selection = SelectionState::Idle;
        }
    }

    /// Composites every dirty pane, status pane, and floating panel into one
    /// screen-sized buffer.
    pub fn render(&mut self, viewport: (u16, u16)) -> Buffer {
        self.last_viewport = viewport;
        let mut out = Buffer::filled(viewport.0, viewport.1, self.theme.default_style());
        let main = self.main_rect(viewport);

        for sp in &mut self.status_panes {
            let frame = sp.app.render();
            let (x, y) = match sp.side {
                Side::Top => (0, 0),
                Side::Bottom => (0, viewport.1.saturating_sub(sp.size)),
                Side::Left => (0, main.y),
                Side::Right => (viewport.0.saturating_sub(sp.size), main.y),
            };
            out.blit(&frame, x, y);
        }

        if let Some((ws_id, pane_handle)) = self.zoomed {
            if let Some(ws) = self.workspaces.get_mut(&ws_id) {
                if let Some(pane) = ws.pane_mut(pane_handle) {
                    let is_resizing = pane.is_resizing();
                    render_pane_with_border(&mut out, pane, main, self.theme, true, is_resizing);
                }
            }
        } else if let Some(ws) = self.workspaces.get_mut(&self.active_workspace) {
            let active = ws.active_pane_handle();
            let rects = ws.tree.compute_rects(main);
            for (pane_handle, rect) in rects {
                let is_active = pane_handle == active;
                if let Some(pane) = ws.pane_mut(pane_handle) {
                    let is_resizing = pane.is_resizing();
                    render_pane_with_border(&mut out, pane, rect, self.theme, is_active, is_resizing);
                }
            }
        }

        for fp in &mut self.floating_panels {
            let frame = fp.app.render();
            out.blit(&frame, fp.x, fp.y);
        }

        out
    }

    /// Reconstructs an app from a restore-time [`PaneSnapshot`]: consults
    /// `registry` for a factory matching the snapshot's `app_type`, falling
    /// back to a read-only [`SnapshotApp`] replaying the captured buffer and
    /// title when there's no app_type or no matching factory (spec.md §4.5
    /// restore step 1).
    fn app_from_snapshot(snapshot: &PaneSnapshot, registry: &SnapshotRegistry) -> Box<dyn App> {
        if let Some(app_type) = &snapshot.app_type {
            if let Some(app) = registry.create(app_type, snapshot.title.clone(), snapshot.app_config.clone()) {
                return app;
            }
        }
        Box::new(SnapshotApp::new(snapshot.title.clone(), snapshot.buffer.clone()))
    }

    /// Captures every workspace's tree structure, ratios, and active leaf
    /// into a serializable [`TreeCapture`] (spec.md §4.5, §8 round-trip
    /// property). Each leaf's pane is snapshotted via its
    /// [`crate::app::SnapshotProvider`] facet, if it has one, into a shared
    /// `panes` vector addressed by fresh indices.
    pub fn capture_tree(&mut self) -> TreeCapture {
        let main = self.current_main_rect();
        let mut panes = Vec::new();
        let mut workspace_roots = HashMap::new();
        let mut workspace_active_leaf = HashMap::new();
        let ids = self.workspace_ids();
        for id in ids {
            let Some(ws) = self.workspaces.get_mut(&id) else { continue };
            let tree = ws.tree.clone();
            let rects: HashMap<PaneHandle, Rect> = tree.compute_rects(main).into_iter().collect();
            let mut snapshot_pane = |handle: PaneHandle| -> PaneSnapshot {
                let rect = rects.get(&handle).copied().unwrap_or(Rect { x: 0, y: 0, width: 0, height: 0 });
                let Some(pane) = ws.pane_mut(handle) else {
                    return PaneSnapshot {
                        id: [0; 16],
                        title: String::new(),
                        buffer: Buffer::blank(0, 0),
                        rect: rect.into(),
                        app_type: None,
                        app_config: None,
                    };
                };
                let (app_type, app_config) = match pane.app_mut().as_snapshot_provider() {
                    Some(provider) => {
                        let (app_type, app_config) = provider.snapshot();
                        (Some(app_type), Some(app_config))
                    }
                    None => (None, None),
                };
                PaneSnapshot {
                    id: *pane.id.0.as_bytes(),
                    title: pane.title(),
                    buffer: pane.render_cached().clone(),
                    rect: rect.into(),
                    app_type,
                    app_config,
                }
            };
            let (capture, active_idx) = crate::snapshot::capture_workspace(&tree, &mut panes, &mut snapshot_pane);
            workspace_roots.insert(id, capture);
            workspace_active_leaf.insert(id, active_idx);
        }
        TreeCapture {
            panes,
            workspace_roots,
            workspace_active_leaf,
            active_workspace_id: self.active_workspace,
        }
    }

    /// Restores the desktop from `capture` (spec.md §4.5): stops every
    /// currently-running app, rebuilds each workspace's pane arena and tree
    /// with preserved ids and ratios (substituting an "Error: Missing Pane"
    /// placeholder for any `pane_index` that's out of range —
    /// `Error::RestoreMismatch`), recomputes layout, then adopts the
    /// captured active workspace id, or any restored workspace if that id
    /// is no longer present.
    pub fn apply_tree_capture(&mut self, capture: TreeCapture) {
        for ws in self.workspaces.values_mut() {
            let handles: Vec<_> = ws.panes_iter().map(|(h, _)| h).collect();
            for h in handles {
                if let Some(pane) = ws.pane_mut(h) {
                    self.lifecycle.stop(pane.app_mut());
                }
            }
        }
        self.workspaces.clear();

        let mut pane_pool: Vec<Option<Pane>> = capture
            .panes
            .iter()
            .map(|snap| {
                let id = PaneId(uuid::Uuid::from_bytes(snap.id));
                let app_type = snap.app_type.clone().unwrap_or_else(|| "snapshot".into());
                let app = Self::app_from_snapshot(snap, &self.snapshot_registry);
                Some(Pane::from_snapshot(id, app_type, app, snap.rect.width.max(1), snap.rect.height.max(1)))
            })
            .collect();

        let main = self.current_main_rect();
        let mut restored_ids = Vec::new();
        for (&ws_id, node_capture) in &capture.workspace_roots {
            let mut local_panes: Vec<Option<Pane>> = Vec::new();
            let mut resolve = |pane_index: i32| -> PaneHandle {
                let taken = if pane_index >= 0 {
                    pane_pool.get_mut(pane_index as usize).and_then(|slot| slot.take())
                } else {
                    None
                };
                let pane = taken.unwrap_or_else(|| Pane::new("placeholder", Box::new(SnapshotApp::missing_pane(1, 1)), 1, 1));
                local_panes.push(Some(pane));
                PaneHandle(local_panes.len() - 1)
            };
            let active_idx = capture.workspace_active_leaf.get(&ws_id).copied().unwrap_or(-1);
            let tree = crate::snapshot::rebuild_tree(node_capture, active_idx, &mut resolve);
            let mut ws = Workspace::from_restored(ws_id, local_panes, tree);
            ws.resize(main);
            restored_ids.push(ws_id);
            self.workspaces.insert(ws_id, ws);
        }

        self.active_workspace = if restored_ids.contains(&capture.active_workspace_id) {
            capture.active_workspace_id
        } else {
            restored_ids.first().copied().unwrap_or(self.active_workspace)
        };
        self.zoomed = None;
        self.broadcast_state();
    }

    /// Closes the desktop: sets the quit flag, stops all panes' apps across
    /// all workspaces, then status panes and floating panels (spec.md §5).
    pub fn shutdown(&mut self) {
        self.quitting = true;
        for ws in self.workspaces.values_mut() {
            let handles: Vec<_> = ws.panes_iter().map(|(h, _)| h).collect();
            for h in handles {
                if let Some(pane) = ws.pane_mut(h) {
                    self.lifecycle.stop(pane.app_mut());
                }
            }
        }
        for sp in &mut self.status_panes {
            self.lifecycle.stop(sp.app.as_mut());
        }
        for fp in &mut self.floating_panels {
            self.lifecycle.stop(fp.app.as_mut());
        }
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }
}

fn shift_arrow_direction(key: &KeyEvent) -> Option<Direction> {
    if !key.mods.shift {
        return None;
    }
    arrow_direction(key)
}

fn arrow_direction(key: &KeyEvent) -> Option<Direction> {
    match key.code {
        KeyCode::Up => Some(Direction::Up),
        KeyCode::Down => Some(Direction::Down),
        KeyCode::Left => Some(Direction::Left),
        KeyCode::Right => Some(Direction::Right),
        _ => None,
    }
}

fn render_pane_with_border(out: &mut Buffer, pane: &mut crate::pane::Pane, rect: Rect, theme: Theme, is_active: bool, is_resizing: bool) {
    let border_color = theme.border_color(is_active, is_resizing);
    let border_style = Style::default().fg(border_color);
    if rect.width >= 2 && rect.height >= 2 {
        for x in rect.x..rect.x + rect.width {
            out.set(x, rect.y, Cell::new('─', border_style));
            out.set(x, rect.y + rect.height - 1, Cell::new('─', border_style));
        }
        for y in rect.y..rect.y + rect.height {
            out.set(rect.x, y, Cell::new('│', border_style));
            out.set(rect.x + rect.width - 1, y, Cell::new('│', border_style));
        }
        out.set(rect.x, rect.y, Cell::new('┌', border_style));
        out.set(rect.x + rect.width - 1, rect.y, Cell::new('┐', border_style));
        out.set(rect.x, rect.y + rect.height - 1, Cell::new('└', border_style));
        out.set(rect.x + rect.width - 1, rect.y + rect.height - 1, Cell::new('┘', border_style));

        let title = pane.title();
        let max_len = rect.width.saturating_sub(4) as usize;
        let truncated: String = title.chars().take(max_len).collect();
        if !truncated.is_empty() {
            let start_x = rect.x + (rect.width.saturating_sub(truncated.chars().count() as u16)) / 2;
            out.set_str(start_x, rect.y, &truncated, border_style);
        }
    }
    let frame = pane.render_cached();
    let (inner_x, inner_y) = (rect.x.saturating_add(1), rect.y.saturating_add(1));
    out.blit(frame, inner_x, inner_y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::welcome::WelcomeApp;
    use crate::tree::Node;

    fn desktop() -> Desktop {
        let registry = AppRegistry::new();
        Desktop::new(EngineConfig::default(), Theme::default(), registry)
    }

    #[tokio::test]
    async fn new_desktop_creates_workspace_on_demand() {
        let mut d = desktop();
        d.switch_workspace(1, || ("welcome".into(), Box::new(WelcomeApp::new())));
        assert_eq!(d.active_workspace_id(), 1);
        assert_eq!(d.workspace_ids(), vec![1]);
    }

    #[tokio::test]
    async fn toggle_control_mode_round_trips_to_normal() {
        let mut d = desktop();
        d.switch_workspace(1, || ("welcome".into(), Box::new(WelcomeApp::new())));
        assert_eq!(d.control_state, ControlState::Normal);
        d.toggle_control_mode();
        assert_eq!(d.control_state, ControlState::Control);
        d.toggle_control_mode();
        assert_eq!(d.control_state, ControlState::Normal);
    }

    #[tokio::test]
    async fn toggle_zoom_round_trips() {
        let mut d = desktop();
        d.switch_workspace(1, || ("welcome".into(), Box::new(WelcomeApp::new())));
        assert!(!d.is_zoomed());
        d.toggle_zoom();
        assert!(d.is_zoomed());
        d.toggle_zoom();
        assert!(!d.is_zoomed());
    }

    #[test]
    fn clipboard_set_then_get_round_trips_bytes() {
        let clipboard = ClipboardHandle::default();
        clipboard.set("text/plain", b"hello".to_vec());
        assert_eq!(clipboard.get("text/plain"), Some(b"hello".to_vec()));
    }

    #[test]
    fn pop_pending_clipboard_twice_returns_none_second_time() {
        let clipboard = ClipboardHandle::default();
        clipboard.set_pending("text/plain".into(), b"x".to_vec());
        assert!(clipboard.pop_pending().is_some());
        assert!(clipboard.pop_pending().is_none());
    }

    #[tokio::test]
    async fn capture_tree_then_apply_tree_capture_round_trips_structure_and_active_ids() {
        let mut d = desktop();
        d.switch_workspace(1, || ("welcome".into(), Box::new(WelcomeApp::new())));
        d.split_active(Axis::Vertical);
        d.switch_workspace(2, || ("welcome".into(), Box::new(WelcomeApp::new())));
        d.split_active(Axis::Horizontal);
        d.switch_workspace(1, || ("welcome".into(), Box::new(WelcomeApp::new())));

        let ws1_ids_before: Vec<PaneId> = d.workspaces[&1].panes_iter().map(|(_, p)| p.id).collect();
        let ws1_active_id_before = d.workspaces[&1].pane(d.workspaces[&1].active_pane_handle()).unwrap().id;
        let ws2_active_id_before = d.workspaces[&2].pane(d.workspaces[&2].active_pane_handle()).unwrap().id;

        let capture = d.capture_tree();
        d.apply_tree_capture(capture);

        assert_eq!(d.active_workspace_id(), 1);
        let mut ws1_ids_after: Vec<PaneId> = d.workspaces[&1].panes_iter().map(|(_, p)| p.id).collect();
        let mut ws1_ids_before_sorted = ws1_ids_before.clone();
        ws1_ids_after.sort_by_key(|id| id.0);
        ws1_ids_before_sorted.sort_by_key(|id| id.0);
        assert_eq!(ws1_ids_before_sorted, ws1_ids_after);

        let ws1_active_id_after = d.workspaces[&1].pane(d.workspaces[&1].active_pane_handle()).unwrap().id;
        assert_eq!(ws1_active_id_after, ws1_active_id_before);
        let ws2_active_id_after = d.workspaces[&2].pane(d.workspaces[&2].active_pane_handle()).unwrap().id;
        assert_eq!(ws2_active_id_after, ws2_active_id_before);

        let Node::Split { axis, ratios, .. } = d.workspaces[&1].tree.node(d.workspaces[&1].tree.root()) else {
            panic!("expected workspace 1 to still be split after restore")
        };
        assert_eq!(*axis, Axis::Vertical);
        assert_eq!(ratios.len(), 2);
    }

    #[tokio::test]
    async fn setting_active_true_twice_is_a_noop() {
        let mut d = desktop();
        d.switch_workspace(1, || ("welcome".into(), Box::new(WelcomeApp::new())));
        let before = d.current_payload();
        d.broadcast_state();
        // No state actually changed since switch_workspace already broadcasts
        // via recalculate_layout's callers; a repeated broadcast with an
        // unchanged payload must not register as a new state.
        let after = d.current_payload();
        assert_eq!(before, after);
    }
}
