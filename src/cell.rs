//! The atomic unit of the screen: a character plus a style.

use std::collections::HashMap;

/// A color, tagged by how it should be resolved against the driver's palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Color {
    #[default]
    Default,
    Standard(u8),
    Indexed256(u8),
    Rgb(u8, u8, u8),
}

/// Text attributes plus foreground/background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub reverse: bool,
    pub dim: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Default,
            bold: false,
            italic: false,
            underline: false,
            reverse: false,
            dim: false,
        }
    }
}

impl Style {
    pub fn fg(mut self, c: Color) -> Self {
        self.fg = c;
        self
    }

    pub fn bg(mut self, c: Color) -> Self {
        self.bg = c;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// A single screen cell. Self-contained — no combining-character state is
/// shared across cells.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

impl Cell {
    pub fn new(ch: char, style: Style) -> Self {
        Self { ch, style }
    }
}

/// A driver-native style handle, opaque to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleHandle(pub u32);

/// Caches `(fg, bg, attrs)` -> driver-native style handle so the render path
/// doesn't reallocate a style object per cell.
#[derive(Debug, Default)]
pub struct StyleCache {
    map: HashMap<Style, StyleHandle>,
    next: u32,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `style`, allocating one on first use.
    pub fn handle_for(&mut self, style: Style) -> StyleHandle {
        if let Some(h) = self.map.get(&style) {
            return *h;
        }
        let h = StyleHandle(self.next);
        self.next += 1;
        self.map.insert(style, h);
        h
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_cache_reuses_handles_for_equal_styles() {
        let mut cache = StyleCache::new();
        let a = Style::default().fg(Color::Standard(2)).bold();
        let b = Style::default().fg(Color::Standard(2)).bold();
        let ha = cache.handle_for(a);
        let hb = cache.handle_for(b);
        assert_eq!(ha, hb);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn style_cache_distinguishes_differing_styles() {
        let mut cache = StyleCache::new();
        let ha = cache.handle_for(Style::default().fg(Color::Standard(1)));
        let hb = cache.handle_for(Style::default().fg(Color::Standard(2)));
        assert_ne!(ha, hb);
    }

    #[test]
    fn empty_cell_is_space_with_default_style() {
        let c = Cell::default();
        assert_eq!(c.ch, ' ');
        assert_eq!(c.style, Style::default());
    }
}
