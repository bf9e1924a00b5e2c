//! A minimal built-in status-pane app: renders a single separator-joined
//! line from whatever text segments it's given. Content is pushed in by the
//! desktop's state broadcast rather than pulled, so it never reads tree
//! state directly.

use tokio::sync::mpsc;

use crate::app::{App, KeyEvent};
use crate::buffer::Buffer;
use crate::cell::Style;

/// A built-in status-pane app. Segments are set externally (typically from
/// the desktop's `StatePayload`) via [`StatusBarApp::set_segments`].
pub struct StatusBarApp {
    cols: u16,
    rows: u16,
    segments: Vec<String>,
    separator: String,
    style: Style,
    refresh: Option<mpsc::Sender<()>>,
}

impl StatusBarApp {
    pub fn new() -> Self {
        Self {
            cols: 0,
            rows: 1,
            segments: Vec::new(),
            separator: " | ".into(),
            style: Style::default(),
            refresh: None,
        }
    }

    pub fn set_segments(&mut self, segments: Vec<String>) {
        self.segments = segments;
        if let Some(tx) = &self.refresh {
            let _ = tx.try_send(());
        }
    }
}

impl Default for StatusBarApp {
    fn default() -> Self {
        Self::new()
    }
}

impl App for StatusBarApp {
    fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
    }

    fn render(&mut self) -> Buffer {
        let mut buf = Buffer::filled(self.cols, self.rows, self.style);
        let line = self.segments.join(&self.separator);
        buf.set_str(0, 0, &line, self.style);
        buf
    }

    fn title(&self) -> String {
        "status".into()
    }

    fn handle_key(&mut self, _key: KeyEvent) {}

    fn set_refresh_notifier(&mut self, sender: mpsc::Sender<()>) {
        self.refresh = Some(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_segments_with_separator() {
        let mut app = StatusBarApp::new();
        app.resize(40, 1);
        app.set_segments(vec!["ws1".into(), "control".into()]);
        let buf = app.render();
        let row: String = buf.rows().next().unwrap().iter().map(|c| c.ch).collect();
        assert!(row.starts_with("ws1 | control"));
    }
}
