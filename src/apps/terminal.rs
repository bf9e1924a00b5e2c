//! The built-in terminal app: spawns a shell under a PTY, feeds its output
//! through a `vt100` parser, and renders the parser's screen as a
//! [`Buffer`]. Generalized cross-platform from the pane-spawn pattern this
//! engine's PTY handling is grounded on (reader thread notifying the pane's
//! refresh channel on new output; terminal emulation itself is out of scope,
//! vt100 owns it).

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, PtySystemSelection};
use tokio::sync::mpsc;

use crate::app::{App, KeyCode, KeyEvent, PasteHandler};
use crate::buffer::Buffer;
use crate::cell::{Cell, Color, Style};
use crate::config::DEFAULT_HISTORY_LIMIT;
use crate::error::{Error, Result};

/// `portable_pty`'s master/child trait objects aren't declared `Send`, even
/// though the concrete OS-handle types backing them are. The core serializes
/// all calls into a given app (spec.md §6), so nothing ever touches these
/// concurrently; the wrapper just asserts that to the compiler.
struct SendMaster(Box<dyn MasterPty>);
unsafe impl Send for SendMaster {}

impl Write for SendMaster {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

struct SendChild(Box<dyn Child>);
unsafe impl Send for SendChild {}

/// Spawns a shell (or `command`, if given) under a PTY.
pub struct TerminalApp {
    parser: Arc<Mutex<vt100::Parser>>,
    writer: SendMaster,
    child: SendChild,
    cols: u16,
    rows: u16,
    refresh: Arc<Mutex<Option<mpsc::Sender<()>>>>,
    command: String,
}

impl TerminalApp {
    /// Spawns `command` (or the user's `$SHELL`/platform default if `None`)
    /// under a fresh PTY of size `cols` x `rows`.
    pub fn spawn(command: Option<&str>, cols: u16, rows: u16) -> Result<Self> {
        let pty_system = PtySystemSelection::default()
            .get()
            .map_err(|e| Error::Driver(format!("pty system: {e}")))?;
        let size = PtySize {
            rows: rows.max(1),
            cols: cols.max(1),
            pixel_width: 0,
            pixel_height: 0,
        };
        let pair = pty_system
            .openpty(size)
            .map_err(|e| Error::Driver(format!("openpty: {e}")))?;

        let mut cmd = build_command(command);
        let child = pair
            .slave
            .spawn_command(cmd.take_or_default())
            .map_err(|e| Error::Driver(format!("spawn: {e}")))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::Driver(format!("try_clone_reader: {e}")))?;

        let parser = Arc::new(Mutex::new(vt100::Parser::new(size.rows, size.cols, DEFAULT_HISTORY_LIMIT)));
        let refresh = Arc::new(Mutex::new(None));
        spawn_reader(reader, parser.clone(), refresh.clone());

        Ok(Self {
            parser,
            writer: SendMaster(pair.master),
            child: SendChild(child),
            cols: size.cols,
            rows: size.rows,
            refresh,
            command: command.unwrap_or("shell").to_string(),
        })
    }
}

fn spawn_reader(mut reader: Box<dyn Read + Send>, parser: Arc<Mutex<vt100::Parser>>, refresh: Arc<Mutex<Option<mpsc::Sender<()>>>>) {
    thread::spawn(move || {
        let mut buf = [0u8; 65536];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    parser.lock().unwrap().process(&buf[..n]);
                    if let Some(tx) = refresh.lock().unwrap().as_ref() {
                        let _ = tx.try_send(());
                    }
                }
                Err(_) => break,
            }
        }
    });
}

fn build_command(command: Option<&str>) -> CommandHolder {
    match command {
        Some(cmd) => {
            let mut parts = cmd.split_whitespace();
            let program = parts.next().unwrap_or(cmd);
            let mut builder = CommandBuilder::new(program);
            builder.args(parts);
            CommandHolder(Some(builder))
        }
        None => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            CommandHolder(Some(CommandBuilder::new(shell)))
        }
    }
}

struct CommandHolder(Option<CommandBuilder>);

impl CommandHolder {
    fn take_or_default(&mut self) -> CommandBuilder {
        self.0.take().unwrap_or_else(|| CommandBuilder::new("/bin/sh"))
    }
}

impl App for TerminalApp {
    fn stop(&mut self) {
        let _ = self.child.0.kill();
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) == (self.cols, self.rows) || cols == 0 || rows == 0 {
            self.cols = cols;
            self.rows = rows;
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.parser.lock().unwrap().screen_mut().set_size(rows, cols);
    }

    fn render(&mut self) -> Buffer {
        let parser = self.parser.lock().unwrap();
        let screen = parser.screen();
        let mut buf = Buffer::blank(self.cols, self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                if let Some(cell) = screen.cell(y, x) {
                    let style = Style {
                        fg: to_color(cell.fgcolor()),
                        bg: to_color(cell.bgcolor()),
                        bold: cell.bold(),
                        italic: cell.italic(),
                        underline: cell.underline(),
                        reverse: cell.inverse(),
                        dim: false,
                    };
                    let ch = cell.contents().chars().next().unwrap_or(' ');
                    buf.set(x, y, Cell::new(ch, style));
                }
            }
        }
        buf
    }

    fn title(&self) -> String {
        self.command.clone()
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let bytes: Vec<u8> = match key.code {
            KeyCode::Char => key.ch.map(|c| c.to_string().into_bytes()).unwrap_or_default(),
            KeyCode::Enter => vec![b'\r'],
            KeyCode::Tab => vec![b'\t'],
            KeyCode::Backspace => vec![0x7f],
            KeyCode::Esc => vec![0x1b],
            KeyCode::Up => b"\x1b[A".to_vec(),
            KeyCode::Down => b"\x1b[B".to_vec(),
            KeyCode::Right => b"\x1b[C".to_vec(),
            KeyCode::Left => b"\x1b[D".to_vec(),
            _ => Vec::new(),
        };
        if bytes.is_empty() {
            return;
        }
        let _ = self.writer.write_all(&bytes);
    }

    fn set_refresh_notifier(&mut self, sender: mpsc::Sender<()>) {
        *self.refresh.lock().unwrap() = Some(sender);
    }

    fn as_paste_handler(&mut self) -> Option<&mut dyn PasteHandler> {
        Some(self)
    }
}

impl PasteHandler for TerminalApp {
    fn handle_paste(&mut self, bytes: &[u8]) {
        let _ = self.writer.write_all(bytes);
    }
}

fn to_color(c: vt100::Color) -> Color {
    match c {
        vt100::Color::Default => Color::Default,
        vt100::Color::Idx(i) if i < 16 => Color::Standard(i),
        vt100::Color::Idx(i) => Color::Indexed256(i),
        vt100::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_shell_renders_a_buffer_of_requested_size() {
        let mut app = TerminalApp::spawn(Some("true"), 20, 5).expect("pty spawn should succeed in test env");
        let buf = app.render();
        assert_eq!((buf.width(), buf.height()), (20, 5));
    }
}
