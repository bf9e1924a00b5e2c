//! Ambient, typed configuration. Not a file-format reader — loading
//! configuration from disk is explicitly out of scope (spec.md §1); these
//! are the constants and theme values the engine needs to run, constructed
//! in-process and passed to [`crate::desktop::Desktop::new`].

use crate::cell::{Color, Style};

/// Minimum split ratio any sibling in a split node may hold.
pub const MIN_RATIO: f64 = 0.1;
/// Minimum pane content width before a vertical split is rejected.
pub const MIN_PANE_WIDTH: i32 = 20;
/// Minimum pane content height before a horizontal split is rejected.
pub const MIN_PANE_HEIGHT: i32 = 8;
/// Ratio transferred between shrinker/grower on one interactive resize step.
pub const RESIZE_STEP: f64 = 0.05;
/// Default storage flush debounce.
pub const DEFAULT_FLUSH_DEBOUNCE_MS: u64 = 2000;
/// Default scrollback for the built-in terminal app.
pub const DEFAULT_HISTORY_LIMIT: usize = 2000;

/// Tunable engine-wide knobs. Constructed programmatically (no config file).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub min_ratio: f64,
    pub min_pane_width: i32,
    pub min_pane_height: i32,
    pub resize_step: f64,
    pub flush_debounce_ms: u64,
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_ratio: MIN_RATIO,
            min_pane_width: MIN_PANE_WIDTH,
            min_pane_height: MIN_PANE_HEIGHT,
            resize_step: RESIZE_STEP,
            flush_debounce_ms: DEFAULT_FLUSH_DEBOUNCE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Border/default colors. Lives on the Desktop, not a global — required for
/// testability (spec.md §9 design notes).
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub default_fg: Color,
    pub default_bg: Color,
    pub border_inactive: Color,
    pub border_active: Color,
    pub border_resizing: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            default_fg: Color::Default,
            default_bg: Color::Default,
            border_inactive: Color::Standard(8),
            border_active: Color::Standard(2),
            border_resizing: Color::Standard(3),
        }
    }
}

impl Theme {
    pub fn default_style(&self) -> Style {
        Style::default().fg(self.default_fg).bg(self.default_bg)
    }

    pub fn border_color(&self, is_active: bool, is_resizing: bool) -> Color {
        if is_resizing {
            self.border_resizing
        } else if is_active {
            self.border_active
        } else {
            self.border_inactive
        }
    }
}
