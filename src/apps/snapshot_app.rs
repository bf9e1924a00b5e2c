//! A read-only app wrapping a captured buffer, used when a restored pane's
//! `app_type` has no matching snapshot factory (spec.md §4.5, §9 open
//! question: preservation over liveness).

use crate::app::{App, KeyEvent};
use crate::buffer::Buffer;
use crate::cell::Style;

pub struct SnapshotApp {
    buffer: Buffer,
    title: String,
}

impl SnapshotApp {
    pub fn new(title: String, buffer: Buffer) -> Self {
        Self { buffer, title }
    }

    /// The "Loading..." placeholder for an orphaned leaf with no captured
    /// app at all (spec.md §4.5 orphan handling).
    pub fn placeholder(cols: u16, rows: u16) -> Self {
        let mut buffer = Buffer::blank(cols, rows);
        if rows > 0 {
            buffer.set_str(0, 0, "Loading...", Style::default());
        }
        Self { buffer, title: "Loading...".into() }
    }

    /// The "Error: Missing Pane" placeholder for a `TreeNodeCapture::Leaf`
    /// whose `pane_index` is out of range (spec.md §4.5 restore step 2).
    pub fn missing_pane(cols: u16, rows: u16) -> Self {
        let mut buffer = Buffer::blank(cols, rows);
        if rows > 0 {
            buffer.set_str(0, 0, "Error: Missing Pane", Style::default());
        }
        Self { buffer, title: "Error: Missing Pane".into() }
    }
}

impl App for SnapshotApp {
    fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) != (self.buffer.width(), self.buffer.height()) {
            let mut fresh = Buffer::blank(cols, rows);
            fresh.blit(&self.buffer, 0, 0);
            self.buffer = fresh;
        }
    }

    fn render(&mut self) -> Buffer {
        self.buffer.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn handle_key(&mut self, _key: KeyEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_captured_buffer_verbatim() {
        let mut src = Buffer::blank(4, 2);
        src.set_str(0, 0, "hi", Style::default());
        let mut app = SnapshotApp::new("x".into(), src.clone());
        assert_eq!(app.render(), src);
    }

    #[test]
    fn ignores_key_input() {
        let mut app = SnapshotApp::placeholder(4, 2);
        let before = app.render();
        app.handle_key(KeyEvent {
            code: crate::app::KeyCode::Char,
            ch: Some('x'),
            mods: Default::default(),
        });
        assert_eq!(app.render(), before);
    }
}
