//! Thin abstraction over the output device (spec.md §6), plus a concrete
//! crossterm-backed implementation.

use crossterm::event::{self, Event as CtEvent, KeyCode as CtKeyCode, KeyModifiers, MouseEventKind};
use crossterm::terminal;
use crossterm::ExecutableCommand;
use std::io::{self, Write};
use std::time::Duration;

use crate::app::{KeyCode, KeyEvent, Modifiers, MouseButtons};
use crate::cell::Style;
use crate::error::{Error, Result};

/// The tagged union of input events a driver can produce.
#[derive(Debug, Clone)]
pub enum Event {
    Resize(u16, u16),
    Key(KeyEvent),
    Mouse { x: u16, y: u16, buttons: MouseButtons, mods: Modifiers },
    MouseWheel { x: u16, y: u16, delta: i32, mods: Modifiers },
    Paste(Vec<u8>),
    Tick,
}

/// Operations the compositor core needs from the output device.
pub trait ScreenDriver: Send {
    fn init(&mut self) -> Result<()>;
    fn fini(&mut self);
    fn size(&self) -> (u16, u16);
    fn set_style(&mut self, style: Style);
    fn hide_cursor(&mut self) -> Result<()>;
    fn show(&mut self) -> Result<()>;
    /// Blocks (up to `timeout`) for the next input event, returning
    /// [`Event::Tick`] on timeout so the draw loop can still poll its other
    /// suspension points (spec.md §5).
    fn poll_event(&mut self, timeout: Duration) -> Result<Event>;
    fn set_content(&mut self, x: u16, y: u16, ch: char, style: Style);
}

/// A crossterm-backed driver writing directly to stdout.
pub struct CrosstermDriver {
    out: io::Stdout,
    current_style: Style,
}

impl CrosstermDriver {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            current_style: Style::default(),
        }
    }
}

impl Default for CrosstermDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenDriver for CrosstermDriver {
    fn init(&mut self) -> Result<()> {
        terminal::enable_raw_mode().map_err(|e| Error::Driver(e.to_string()))?;
        self.out
            .execute(crossterm::terminal::EnterAlternateScreen)
            .map_err(|e| Error::Driver(e.to_string()))?;
        self.out
            .execute(crossterm::event::EnableMouseCapture)
            .map_err(|e| Error::Driver(e.to_string()))?;
        Ok(())
    }

    fn fini(&mut self) {
        let _ = self.out.execute(crossterm::event::DisableMouseCapture);
        let _ = self.out.execute(crossterm::terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }

    fn size(&self) -> (u16, u16) {
        terminal::size().unwrap_or((80, 24))
    }

    fn set_style(&mut self, style: Style) {
        self.current_style = style;
    }

    fn hide_cursor(&mut self) -> Result<()> {
        self.out
            .execute(crossterm::cursor::Hide)
            .map(|_| ())
            .map_err(|e| Error::Driver(e.to_string()))
    }

    fn show(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| Error::Driver(e.to_string()))
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Event> {
        if !event::poll(timeout).map_err(|e| Error::Driver(e.to_string()))? {
            return Ok(Event::Tick);
        }
        match event::read().map_err(|e| Error::Driver(e.to_string()))? {
            CtEvent::Resize(cols, rows) => Ok(Event::Resize(cols, rows)),
            CtEvent::Key(key) => Ok(Event::Key(translate_key(key))),
            CtEvent::Mouse(m) => Ok(translate_mouse(m)),
            CtEvent::Paste(text) => Ok(Event::Paste(text.into_bytes())),
            CtEvent::FocusGained | CtEvent::FocusLost => Ok(Event::Tick),
        }
    }

    fn set_content(&mut self, x: u16, y: u16, ch: char, style: Style) {
        use crossterm::style::{SetBackgroundColor, SetForegroundColor};
        let _ = self.out.execute(crossterm::cursor::MoveTo(x, y));
        let _ = self.out.execute(SetForegroundColor(to_ct_color(style.fg)));
        let _ = self.out.execute(SetBackgroundColor(to_ct_color(style.bg)));
        let _ = write!(self.out, "{ch}");
    }
}

fn to_ct_color(c: crate::cell::Color) -> crossterm::style::Color {
    use crate::cell::Color;
    use crossterm::style::Color as CtColor;
    match c {
        Color::Default => CtColor::Reset,
        Color::Standard(n) => CtColor::AnsiValue(n),
        Color::Indexed256(n) => CtColor::AnsiValue(n),
        Color::Rgb(r, g, b) => CtColor::Rgb { r, g, b },
    }
}

fn translate_key(key: crossterm::event::KeyEvent) -> KeyEvent {
    let mods = Modifiers {
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
    };
    let (code, ch) = match key.code {
        CtKeyCode::Char(c) => (KeyCode::Char, Some(c)),
        CtKeyCode::Enter => (KeyCode::Enter, None),
        CtKeyCode::Tab => (KeyCode::Tab, None),
        CtKeyCode::Backspace => (KeyCode::Backspace, None),
        CtKeyCode::Esc => (KeyCode::Esc, None),
        CtKeyCode::Up => (KeyCode::Up, None),
        CtKeyCode::Down => (KeyCode::Down, None),
        CtKeyCode::Left => (KeyCode::Left, None),
        CtKeyCode::Right => (KeyCode::Right, None),
        CtKeyCode::Delete => (KeyCode::Delete, None),
        CtKeyCode::Home => (KeyCode::Home, None),
        CtKeyCode::End => (KeyCode::End, None),
        CtKeyCode::PageUp => (KeyCode::PageUp, None),
        CtKeyCode::PageDown => (KeyCode::PageDown, None),
        CtKeyCode::F(n) => (KeyCode::F(n), None),
        _ => (KeyCode::Esc, None),
    };
    KeyEvent { code, ch, mods }
}

fn translate_mouse(m: crossterm::event::MouseEvent) -> Event {
    let mods = Modifiers {
        ctrl: m.modifiers.contains(KeyModifiers::CONTROL),
        alt: m.modifiers.contains(KeyModifiers::ALT),
        shift: m.modifiers.contains(KeyModifiers::SHIFT),
    };
    match m.kind {
        MouseEventKind::ScrollUp => Event::MouseWheel { x: m.column, y: m.row, delta: -1, mods },
        MouseEventKind::ScrollDown => Event::MouseWheel { x: m.column, y: m.row, delta: 1, mods },
        MouseEventKind::Down(btn) | MouseEventKind::Drag(btn) => Event::Mouse {
            x: m.column,
            y: m.row,
            buttons: buttons_for(btn, true),
            mods,
        },
        MouseEventKind::Up(btn) => Event::Mouse {
            x: m.column,
            y: m.row,
            buttons: buttons_for(btn, false),
            mods,
        },
        MouseEventKind::Moved => Event::Mouse {
            x: m.column,
            y: m.row,
            buttons: MouseButtons { left: false, right: false, middle: false },
            mods,
        },
        _ => Event::Tick,
    }
}

fn buttons_for(btn: crossterm::event::MouseButton, down: bool) -> MouseButtons {
    use crossterm::event::MouseButton;
    MouseButtons {
        left: down && btn == MouseButton::Left,
        right: down && btn == MouseButton::Right,
        middle: down && btn == MouseButton::Middle,
    }
}
