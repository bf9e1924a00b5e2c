//! The app a workspace falls back to when its last pane closes (spec.md
//! §4.1: "the workspace is responsible for spawning a replacement").

use crate::app::{App, KeyEvent};
use crate::buffer::Buffer;
use crate::cell::Style;

const MESSAGE: &str = "no panes open — press Ctrl+b | to split";

/// A static placeholder app. Ignores all input.
pub struct WelcomeApp {
    cols: u16,
    rows: u16,
}

impl WelcomeApp {
    pub fn new() -> Self {
        Self { cols: 0, rows: 0 }
    }
}

impl Default for WelcomeApp {
    fn default() -> Self {
        Self::new()
    }
}

impl App for WelcomeApp {
    fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
    }

    fn render(&mut self) -> Buffer {
        let mut buf = Buffer::blank(self.cols, self.rows);
        if self.rows > 0 {
            let y = self.rows / 2;
            let x = (self.cols as usize).saturating_sub(MESSAGE.len()) as u16 / 2;
            buf.set_str(x, y, MESSAGE, Style::default());
        }
        buf
    }

    fn title(&self) -> String {
        "welcome".into()
    }

    fn handle_key(&mut self, _key: KeyEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_within_bounds_at_any_size() {
        let mut app = WelcomeApp::new();
        app.resize(10, 3);
        let buf = app.render();
        assert_eq!((buf.width(), buf.height()), (10, 3));
    }

    #[test]
    fn zero_size_does_not_panic() {
        let mut app = WelcomeApp::new();
        app.resize(0, 0);
        let buf = app.render();
        assert_eq!((buf.width(), buf.height()), (0, 0));
    }
}
