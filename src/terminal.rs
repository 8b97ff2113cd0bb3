//! The terminal contract: events the Coordinator consumes, cells it draws.
//!
//! Actual rendering, the keyboard driver, and widget drawing are external
//! collaborators (spec §1 scope); this module defines only the data the
//! core exchanges with them.

/// Modifier keys held during a [`KeyEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// A logical key, independent of the terminal driver that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Tab,
    BackTab,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    Function(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn plain(code: KeyCode) -> Self {
        Self { code, modifiers: Modifiers::default() }
    }
}

/// Events originating outside the keyboard (spec §4.9 "System events").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    Resize { cols: u16, rows: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    System(SystemEvent),
}

/// Text attributes a [`Cell`] may carry; bitflags kept plain for
/// simplicity since the core never needs to combine more than a handful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Attrs {
    pub bold: bool,
    pub reverse: bool,
    pub underline: bool,
}

/// A color as understood by the renderer; the core is agnostic to
/// whether the terminal ultimately renders 256-color or true-color, but
/// tracks when a fallback palette must be used (spec §6: color-pair
/// ceiling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Indexed(u8),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

/// Draw surface the Coordinator writes into; implemented by the external
/// renderer. `rows`/`cols` let the core clamp dialog dimensions (spec
/// §4.13: "dialogs clamp their own dimensions to the terminal bounds").
pub trait Renderer {
    fn rows(&self) -> u16;
    fn cols(&self) -> u16;
    fn set_cell(&mut self, row: u16, col: u16, cell: Cell);

    /// True once the platform's color-pair ceiling (observed at 32767,
    /// spec §6) has been exceeded, at which point the core switches to
    /// a fallback palette.
    fn color_pairs_exhausted(&self) -> bool {
        false
    }
}

pub const COLOR_PAIR_CEILING: u32 = 32767;
