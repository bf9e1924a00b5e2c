//! One independent tiling tree, analogous to a virtual desktop or tab
//! (spec.md §4.3).

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::app::{App, KeyEvent, MouseButtons};
use crate::error::Result;
use crate::lifecycle::AppLifecycleManager;
use crate::pane::{Pane, PaneHandle, PaneId};
use crate::tree::{Axis, Direction, Rect, Tree};

/// Mouse-resize drag state (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseResizeState {
    Idle,
    Dragging { grower: PaneHandle, shrinker: PaneHandle, anchor_x: u16, anchor_y: u16, axis: Axis },
}

/// One workspace: an arena of panes plus a layout [`Tree`] addressing them
/// by handle (spec.md §9 design notes).
pub struct Workspace {
    pub id: i32,
    panes: Vec<Option<Pane>>,
    free_slots: Vec<PaneHandle>,
    pub tree: Tree,
    pub mouse_resize: MouseResizeState,
    pub keyboard_resize_selection: Option<(PaneHandle, PaneHandle)>,
    pub refresh_rx: mpsc::Receiver<()>,
    refresh_tx: mpsc::Sender<()>,
}

impl Workspace {
    /// Creates a workspace whose sole pane hosts `app`.
    pub fn new(id: i32, app_type: impl Into<String>, app: Box<dyn App>) -> Self {
        let mut pane = Pane::new(app_type, app, 1, 1);
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        wire_pane_refresh(&mut pane, refresh_tx.clone());
        let tree = Tree::single(PaneHandle(0));
        Self {
            id,
            panes: vec![Some(pane)],
            free_slots: Vec::new(),
            tree,
            mouse_resize: MouseResizeState::Idle,
            keyboard_resize_selection: None,
            refresh_rx,
            refresh_tx,
        }
    }

    /// Rebuilds a workspace from an already-restored pane arena and tree
    /// (spec.md §4.5 restore steps 2-3): rewires every pane's refresh
    /// notifier onto a fresh channel, since whatever channel it held before
    /// capture no longer has a receiver on this side of a restore.
    pub fn from_restored(id: i32, mut panes: Vec<Option<Pane>>, tree: Tree) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        for slot in panes.iter_mut().flatten() {
            wire_pane_refresh(slot, refresh_tx.clone());
        }
        Self {
            id,
            panes,
            free_slots: Vec::new(),
            tree,
            mouse_resize: MouseResizeState::Idle,
            keyboard_resize_selection: None,
            refresh_rx,
            refresh_tx,
        }
    }

    pub fn pane(&self, h: PaneHandle) -> Option<&Pane> {
        self.panes.get(h.0).and_then(|p| p.as_ref())
    }

    pub fn pane_mut(&mut self, h: PaneHandle) -> Option<&mut Pane> {
        self.panes.get_mut(h.0).and_then(|p| p.as_mut())
    }

    pub fn active_pane_handle(&self) -> PaneHandle {
        self.tree.active_pane()
    }

    pub fn panes_iter(&self) -> impl Iterator<Item = (PaneHandle, &Pane)> {
        self.panes.iter().enumerate().filter_map(|(i, p)| p.as_ref().map(|p| (PaneHandle(i), p)))
    }

    fn insert_pane(&mut self, pane: Pane) -> PaneHandle {
        if let Some(h) = self.free_slots.pop() {
            self.panes[h.0] = Some(pane);
            h
        } else {
            self.panes.push(Some(pane));
            PaneHandle(self.panes.len() - 1)
        }
    }

    /// Splits the active pane, spawning `new_app` (named `app_type`) into the
    /// new leaf (spec.md §4.1).
    pub fn split_active(&mut self, axis: Axis, app_type: impl Into<String>, new_app: Box<dyn App>, area: Rect) -> Result<PaneHandle> {
        let mut pane = Pane::new(app_type, new_app, 1, 1);
        wire_pane_refresh(&mut pane, self.refresh_tx.clone());
        let handle = self.insert_pane(pane);
        match self.tree.split_active(axis, handle, area) {
            Ok(_) => {
                self.resize(area);
                Ok(handle)
            }
            Err(e) => {
                self.panes[handle.0] = None;
                self.free_slots.push(handle);
                Err(e)
            }
        }
    }

    /// Closes the active pane, stopping its app via `lifecycle`. If this
    /// empties the workspace, spawns `welcome_app` as the replacement
    /// (spec.md §4.1, §4.3 "app exit handling").
    pub fn close_active(&mut self, lifecycle: &AppLifecycleManager, welcome_factory: impl FnOnce() -> (String, Box<dyn App>), area: Rect) {
        let closed_handle = self.tree.active_pane();
        match self.tree.close_active_leaf() {
            Ok(_) => {
                if let Some(mut pane) = self.panes[closed_handle.0].take() {
                    lifecycle.stop(pane.app_mut());
                }
                self.free_slots.push(closed_handle);
                if self.is_empty() {
                    self.spawn_welcome(welcome_factory, area);
                } else {
                    self.resize(area);
                }
            }
            Err(_) => {
                // Only pane in the workspace: stop it and replace wholesale.
                if let Some(mut pane) = self.panes[closed_handle.0].take() {
                    lifecycle.stop(pane.app_mut());
                }
                self.free_slots.push(closed_handle);
                self.spawn_welcome(welcome_factory, area);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.panes.iter().all(|p| p.is_none())
    }

    fn spawn_welcome(&mut self, welcome_factory: impl FnOnce() -> (String, Box<dyn App>), area: Rect) {
        let (app_type, app) = welcome_factory();
        let mut pane = Pane::new(app_type, app, 1, 1);
        wire_pane_refresh(&mut pane, self.refresh_tx.clone());
        let handle = self.insert_pane(pane);
        self.tree = Tree::single(handle);
        self.resize(area);
    }

    pub fn move_active(&mut self, dir: Direction) -> bool {
        self.tree.move_active(dir)
    }

    pub fn swap_active(&mut self, dir: Direction) -> bool {
        self.tree.swap_active(dir).is_some()
    }

    /// Recomputes geometry and resizes every pane's app accordingly (spec.md
    /// §4.1 "resize (geometry)").
    pub fn resize(&mut self, area: Rect) {
        for (pane_handle, rect) in self.tree.compute_rects(area) {
            if let Some(pane) = self.pane_mut(pane_handle) {
                let (dw, dh) = (rect.width.saturating_sub(2), rect.height.saturating_sub(2));
                pane.resize(dw, dh);
            }
        }
    }

    /// Routes a key event per spec.md §4.3: Shift+arrow navigates instead of
    /// being forwarded.
    pub fn handle_key(&mut self, key: KeyEvent, nav_dir: Option<Direction>) {
        if key.mods.shift {
            if let Some(dir) = nav_dir {
                self.move_active(dir);
                return;
            }
        }
        let active = self.active_pane_handle();
        if let Some(pane) = self.pane_mut(active) {
            pane.app_mut().handle_key(key);
        }
    }

    /// A "border cell" hit test: is `(x, y)` on the outer edge of the pane at
    /// `(x,y)` with a sibling on that side? Returns the adjacent pane pair
    /// and the split axis if so (spec.md §4.3).
    pub fn border_at(&self, area: Rect, x: u16, y: u16) -> Option<(PaneHandle, PaneHandle, Axis)> {
        let rects = self.tree.compute_rects(area);
        for i in 0..rects.len() {
            for j in 0..rects.len() {
                if i == j {
                    continue;
                }
                let (left_pane, left_rect) = rects[i];
                let (right_pane, right_rect) = rects[j];
                if left_rect.y == right_rect.y
                    && left_rect.height == right_rect.height
                    && left_rect.x + left_rect.width == right_rect.x
                    && x == right_rect.x.saturating_sub(1)
                    && y >= left_rect.y
                    && y < left_rect.y + left_rect.height
                {
                    return Some((left_pane, right_pane, Axis::Vertical));
                }
                if left_rect.x == right_rect.x
                    && left_rect.width == right_rect.width
                    && left_rect.y + left_rect.height == right_rect.y
                    && y == right_rect.y.saturating_sub(1)
                    && x >= left_rect.x
                    && x < left_rect.x + left_rect.width
                {
                    return Some((left_pane, right_pane, Axis::Horizontal));
                }
            }
        }
        None
    }

    /// Drives the mouse-resize state machine (spec.md §4.3). Returns `true`
    /// if the event was consumed.
    pub fn handle_mouse_resize(&mut self, area: Rect, x: u16, y: u16, buttons: MouseButtons) -> bool {
        match self.mouse_resize {
            MouseResizeState::Idle => {
                if buttons.left {
                    if let Some((left, right, axis)) = self.border_at(area, x, y) {
                        self.mouse_resize = MouseResizeState::Dragging {
                            grower: left,
                            shrinker: right,
                            anchor_x: x,
                            anchor_y: y,
                            axis,
                        };
                        if let Some(p) = self.pane_mut(left) {
                            p.set_resizing(true);
                        }
                        if let Some(p) = self.pane_mut(right) {
                            p.set_resizing(true);
                        }
                        return true;
                    }
                }
                false
            }
            MouseResizeState::Dragging { grower, shrinker, anchor_x, anchor_y, axis } => {
                if !buttons.left {
                    self.mouse_resize = MouseResizeState::Idle;
                    if let Some(p) = self.pane_mut(grower) {
                        p.set_resizing(false);
                    }
                    if let Some(p) = self.pane_mut(shrinker) {
                        p.set_resizing(false);
                    }
                    return true;
                }
                let delta_px = match axis {
                    Axis::Vertical => x as i32 - anchor_x as i32,
                    Axis::Horizontal => y as i32 - anchor_y as i32,
                };
                let total = match axis {
                    Axis::Vertical => area.width,
                    Axis::Horizontal => area.height,
                } as f64;
                self.tree.adjust_ratio(grower, shrinker, delta_px as f64 / total);
                self.mouse_resize = MouseResizeState::Dragging {
                    grower,
                    shrinker,
                    anchor_x: x,
                    anchor_y: y,
                    axis,
                };
                self.resize(area);
                true
            }
        }
    }

    pub fn all_pane_ids(&self) -> HashMap<PaneId, PaneHandle> {
        self.panes_iter().map(|(h, p)| (p.id, h)).collect()
    }
}

fn wire_pane_refresh(pane: &mut Pane, workspace_tx: mpsc::Sender<()>) {
    let (dirty_flag, mut app_rx) = pane.wire_refresh_channel();
    tokio::spawn(async move {
        while app_rx.recv().await.is_some() {
            dirty_flag.store(true, std::sync::atomic::Ordering::Relaxed);
            let _ = workspace_tx.try_send(());
        }
    });
}
