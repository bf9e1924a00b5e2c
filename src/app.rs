//! The contract the core consumes from hosted apps (spec.md §6), plus the
//! optional capability facets apps may implement (spec.md §3).
//!
//! Capabilities are discovered via accessor methods on [`App`] rather than
//! downcasting: each defaults to `None`, and a concrete app overrides the
//! ones it implements. This keeps pane/desktop code dispatching statically
//! through trait objects without reaching for `Any`.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::buffer::Buffer;
use crate::pane::PaneId;

/// A decoded input event, as delivered by the screen driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub ch: Option<char>,
    pub mods: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char,
    Enter,
    Tab,
    Backspace,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

/// The pluggable unit hosted inside a pane.
///
/// No assumption is made about reentrancy across an app's own methods — the
/// core serializes `resize`, `render`, `handle_key`, `handle_mouse` and
/// `handle_paste` for a given app.
pub trait App: Send {
    /// Starts the app's long-lived logic. Run on its own task by the
    /// lifecycle manager; the engine never blocks on it.
    fn run(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stops the app. Expected to be idempotent and bounded.
    fn stop(&mut self) {}

    fn resize(&mut self, cols: u16, rows: u16);

    fn render(&mut self) -> Buffer;

    fn title(&self) -> String;

    fn handle_key(&mut self, key: KeyEvent);

    /// Installs the channel the app signals "I have new content" on.
    /// Capacity-1, coalesced notify — see spec.md §5.
    fn set_refresh_notifier(&mut self, sender: mpsc::Sender<()>) {
        let _ = sender;
    }

    fn as_paste_handler(&mut self) -> Option<&mut dyn PasteHandler> {
        None
    }

    fn as_snapshot_provider(&mut self) -> Option<&mut dyn SnapshotProvider> {
        None
    }

    fn as_selection_handler(&mut self) -> Option<&mut dyn SelectionHandler> {
        None
    }

    fn as_mouse_wheel_handler(&mut self) -> Option<&mut dyn MouseWheelHandler> {
        None
    }

    fn as_mouse_handler(&mut self) -> Option<&mut dyn MouseHandler> {
        None
    }

    fn as_close_callback_requester(&mut self) -> Option<&mut dyn CloseCallbackRequester> {
        None
    }

    fn as_control_bus_provider(&mut self) -> Option<&mut dyn ControlBusProvider> {
        None
    }

    fn as_pipeline_provider(&mut self) -> Option<&mut dyn PipelineProvider> {
        None
    }

    fn set_pane_id(&mut self, id: PaneId) {
        let _ = id;
    }

    fn set_clipboard(&mut self, clipboard: crate::desktop::ClipboardHandle) {
        let _ = clipboard;
    }
}

/// Receives a raw paste byte stream in one call.
pub trait PasteHandler {
    fn handle_paste(&mut self, bytes: &[u8]);
}

/// Returns the app type name and config needed to reconstruct this app.
pub trait SnapshotProvider {
    fn snapshot(&mut self) -> (String, HashMap<String, Value>);
}

/// Local-coordinate text selection lifecycle.
pub trait SelectionHandler {
    fn start(&mut self, x: u16, y: u16) -> bool;
    fn update(&mut self, x: u16, y: u16);
    /// Returns `(mime, bytes, keep)` on a successful finish.
    fn finish(&mut self, x: u16, y: u16) -> Option<(String, Vec<u8>, bool)>;
    fn cancel(&mut self);
}

pub trait MouseWheelHandler {
    /// Returns true if the wheel delta was consumed.
    fn handle_wheel(&mut self, x: u16, y: u16, delta: i32) -> bool;
}

pub trait MouseHandler {
    fn handle_mouse(&mut self, x: u16, y: u16, buttons: MouseButtons, mods: Modifiers) -> bool;
}

/// Vetoes close, or requests a confirmation callback before replacement.
pub trait CloseCallbackRequester {
    /// Consults the app about a pending replacement. `proceed` runs the
    /// replacement when invoked; if the app wants to confirm first it may
    /// stash `proceed` and call it later instead of invoking it inline.
    fn request_close(&mut self, proceed: Box<dyn FnOnce() + Send>);
}

/// Exposes a named "control" bus (name -> handler(payload)), used by apps
/// like a launcher to hand off to a replacement.
pub trait ControlBusProvider {
    fn control_bus(&mut self, name: &str, payload: &[u8]);
}

/// Supplies a render pipeline wrapper (spec.md §4.1/§9 — kept as an optional
/// indirection point for future in-process effects).
pub trait PipelineProvider {
    fn pipeline(&mut self) -> &mut dyn RenderPipeline;
}

/// Sits between the pane and the app; may transform cells before compositing.
pub trait RenderPipeline: Send {
    fn resize(&mut self, cols: u16, rows: u16);
    fn render(&mut self) -> Buffer;
    fn set_refresh_notifier(&mut self, sender: mpsc::Sender<()>);
    fn as_mouse_handler(&mut self) -> Option<&mut dyn MouseHandler> {
        None
    }
}
