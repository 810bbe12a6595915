// SPDX-License-Identifier: MIT
//
// Cell — the atomic unit of terminal rendering.
//
// Every character position on screen is a Cell: a character, foreground
// and background colors, and a set of text attributes. The entire
// rendering pipeline exists to produce, diff, and output these.
//
// Cells are Copy and totally comparable — every field is always fully
// specified, so equality never has to reason about "unset" state. That
// property is what makes the differential renderer's cell comparison a
// plain `==`.
//
// Wide characters (CJK, some emoji) occupy two columns. The first cell
// holds the character; the second is a continuation cell (ch = '\0').
// The renderer skips continuation cells when emitting characters but
// still applies their colors for correct background fill.

// ─── Text Attributes ─────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes stored as a compact bitfield.
    ///
    /// These map directly to SGR (Select Graphic Rendition) parameters.
    /// Combine with bitwise OR:
    ///
    /// ```
    /// use emberterm::cell::Attr;
    ///
    /// let style = Attr::BOLD | Attr::UNDERLINE;
    /// assert!(style.contains(Attr::BOLD));
    /// assert!(!style.contains(Attr::ITALIC));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1 — increased intensity.
        const BOLD          = 1 << 0;
        /// SGR 2 — decreased intensity (faint).
        const DIM           = 1 << 1;
        /// SGR 3 — italic or oblique.
        const ITALIC        = 1 << 2;
        /// SGR 4 — underline.
        const UNDERLINE     = 1 << 3;
        /// SGR 5 — blink.
        const BLINK         = 1 << 4;
        /// SGR 7 — swap foreground and background.
        const INVERSE       = 1 << 5;
        /// SGR 8 — invisible text (not widely supported).
        const HIDDEN        = 1 << 6;
        /// SGR 9 — crossed-out text.
        const STRIKETHROUGH = 1 << 7;
    }
}

impl Attr {
    /// Whether no attributes are set.
    #[inline]
    #[must_use]
    pub const fn is_empty_flags(self) -> bool {
        self.bits() == 0
    }
}

// ─── Color ───────────────────────────────────────────────────────────────────

/// One of the 16 standard ANSI palette entries.
///
/// The `Bright*` variants are the high-intensity half (SGR 90–97 / 100–107).
/// Actual rendered colors depend on the terminal's palette configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NamedColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
    BrightBlack = 8,
    BrightRed = 9,
    BrightGreen = 10,
    BrightYellow = 11,
    BrightBlue = 12,
    BrightMagenta = 13,
    BrightCyan = 14,
    BrightWhite = 15,
}

impl NamedColor {
    /// Palette index 0–15.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Whether this is a high-intensity (bright) entry.
    #[inline]
    #[must_use]
    pub const fn is_bright(self) -> bool {
        self.index() >= 8
    }
}

/// A cell color.
///
/// `Default` means "whatever the terminal's configured default is" —
/// distinct from any concrete color and essential for transparent-feeling
/// UIs that respect the user's theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Color {
    /// The terminal's default foreground/background.
    #[default]
    Default,
    /// One of the 16 standard palette entries.
    Named(NamedColor),
    /// An entry in the 256-color palette.
    Ansi256(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// Continuation marker: a cell whose `ch` is NUL belongs to the preceding
/// wide character and produces no character output of its own.
const CONTINUATION: char = '\0';

/// A single terminal cell.
///
/// ```
/// use emberterm::cell::{Attr, Cell, Color};
///
/// let cell = Cell::new('A')
///     .with_fg(Color::Rgb(255, 0, 0))
///     .with_attrs(Attr::BOLD);
/// assert_eq!(cell.ch, 'A');
/// assert!(cell.attrs.contains(Attr::BOLD));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// The character to display. `'\0'` marks a continuation cell
    /// (second column of a wide character).
    pub ch: char,
    /// Foreground (text) color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Text attributes.
    pub attrs: Attr,
}

impl Cell {
    /// An empty cell: space character, default colors, no attributes.
    pub const EMPTY: Self = Self {
        ch: ' ',
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attr::empty(),
    };

    /// Create a cell with a character and default styling.
    #[inline]
    #[must_use]
    pub const fn new(ch: char) -> Self {
        Self {
            ch,
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attr::empty(),
        }
    }

    /// Create a fully styled cell.
    #[inline]
    #[must_use]
    pub const fn styled(ch: char, fg: Color, bg: Color, attrs: Attr) -> Self {
        Self { ch, fg, bg, attrs }
    }

    /// Create a continuation cell for the second column of a wide character.
    ///
    /// Continuation cells inherit the colors and attributes of their owner
    /// so backgrounds fill correctly; the renderer skips their character.
    #[inline]
    #[must_use]
    pub const fn continuation(fg: Color, bg: Color, attrs: Attr) -> Self {
        Self {
            ch: CONTINUATION,
            fg,
            bg,
            attrs,
        }
    }

    // ─── Queries ──────────────────────────────────────────────────────────

    /// Whether this is a continuation cell.
    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// Whether this cell is visually empty (space, default colors, no attrs).
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.ch == ' '
            && self.fg == Color::Default
            && self.bg == Color::Default
            && self.attrs.is_empty_flags()
    }

    /// Whether two cells share the same styling, ignoring the character.
    ///
    /// The diff engine uses this to decide where a styled run ends.
    #[inline]
    #[must_use]
    pub fn same_style(self, other: &Self) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.attrs == other.attrs
    }

    // ─── Builders ─────────────────────────────────────────────────────────

    /// Set the foreground color.
    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    /// Set the background color.
    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    /// Set text attributes.
    #[inline]
    #[must_use]
    pub const fn with_attrs(self, attrs: Attr) -> Self {
        Self { attrs, ..self }
    }

    /// Reset this cell to empty.
    #[inline]
    pub const fn reset(&mut self) {
        *self = Self::EMPTY;
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_continuation() {
            return write!(f, "Cell(continuation)");
        }
        write!(f, "Cell({:?}", self.ch)?;
        if self.fg != Color::Default {
            write!(f, ", fg={:?}", self.fg)?;
        }
        if self.bg != Color::Default {
            write!(f, ", bg={:?}", self.bg)?;
        }
        if !self.attrs.is_empty_flags() {
            write!(f, ", {:?}", self.attrs)?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ─────────────────────────────────────────────────────────

    #[test]
    fn default_cell_is_empty() {
        let cell = Cell::default();
        assert!(cell.is_empty());
        assert_eq!(cell.ch, ' ');
        assert_eq!(cell.fg, Color::Default);
        assert_eq!(cell.bg, Color::Default);
        assert!(cell.attrs.is_empty_flags());
    }

    #[test]
    fn empty_constant_matches_default() {
        assert_eq!(Cell::EMPTY, Cell::default());
    }

    #[test]
    fn default_color_is_default_variant() {
        assert_eq!(Color::default(), Color::Default);
    }

    #[test]
    fn styled_cell_is_not_empty() {
        assert!(!Cell::EMPTY.with_fg(Color::Rgb(255, 0, 0)).is_empty());
        assert!(!Cell::EMPTY.with_bg(Color::Ansi256(236)).is_empty());
        assert!(!Cell::EMPTY.with_attrs(Attr::BOLD).is_empty());
        assert!(!Cell::new('x').is_empty());
    }

    // ── Construction ─────────────────────────────────────────────────────

    #[test]
    fn new_cell_has_default_styling() {
        let cell = Cell::new('Z');
        assert_eq!(cell.ch, 'Z');
        assert_eq!(cell.fg, Color::Default);
        assert_eq!(cell.bg, Color::Default);
    }

    #[test]
    fn styled_cell_carries_all_fields() {
        let cell = Cell::styled(
            'Q',
            Color::Named(NamedColor::Red),
            Color::Rgb(0, 0, 128),
            Attr::BOLD | Attr::UNDERLINE,
        );
        assert_eq!(cell.ch, 'Q');
        assert_eq!(cell.fg, Color::Named(NamedColor::Red));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 128));
        assert!(cell.attrs.contains(Attr::UNDERLINE));
    }

    #[test]
    fn unicode_cell() {
        assert_eq!(Cell::new('日').ch, '日');
    }

    // ── Continuation ─────────────────────────────────────────────────────

    #[test]
    fn continuation_detected() {
        let cont = Cell::continuation(Color::Default, Color::Default, Attr::empty());
        assert!(cont.is_continuation());
    }

    #[test]
    fn continuation_inherits_style() {
        let bg = Color::Rgb(10, 20, 30);
        let cont = Cell::continuation(Color::Default, bg, Attr::BOLD);
        assert_eq!(cont.bg, bg);
        assert!(cont.attrs.contains(Attr::BOLD));
    }

    #[test]
    fn regular_cell_is_not_continuation() {
        assert!(!Cell::new('x').is_continuation());
    }

    // ── Style comparison ─────────────────────────────────────────────────

    #[test]
    fn same_style_ignores_character() {
        let a = Cell::new('A').with_fg(Color::Rgb(255, 0, 0));
        let b = Cell::new('B').with_fg(Color::Rgb(255, 0, 0));
        assert!(a.same_style(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn different_fg_is_different_style() {
        let a = Cell::new('A').with_fg(Color::Named(NamedColor::Red));
        let b = Cell::new('A').with_fg(Color::Named(NamedColor::Green));
        assert!(!a.same_style(&b));
    }

    #[test]
    fn different_attrs_is_different_style() {
        let a = Cell::new('A').with_attrs(Attr::BOLD);
        let b = Cell::new('A').with_attrs(Attr::ITALIC);
        assert!(!a.same_style(&b));
    }

    // ── NamedColor ───────────────────────────────────────────────────────

    #[test]
    fn named_color_indices() {
        assert_eq!(NamedColor::Black.index(), 0);
        assert_eq!(NamedColor::White.index(), 7);
        assert_eq!(NamedColor::BrightBlack.index(), 8);
        assert_eq!(NamedColor::BrightWhite.index(), 15);
    }

    #[test]
    fn bright_split() {
        assert!(!NamedColor::Red.is_bright());
        assert!(NamedColor::BrightRed.is_bright());
    }

    // ── Attr ─────────────────────────────────────────────────────────────

    #[test]
    fn attr_all_flags_fit_in_u8() {
        let all = Attr::all();
        assert_eq!(all.bits(), 0xFF);
    }

    #[test]
    fn attr_insert_and_remove() {
        let mut style = Attr::BOLD;
        style.insert(Attr::UNDERLINE);
        assert!(style.contains(Attr::UNDERLINE));
        style.remove(Attr::BOLD);
        assert!(!style.contains(Attr::BOLD));
    }

    // ── Reset / Debug ────────────────────────────────────────────────────

    #[test]
    fn reset_clears_everything() {
        let mut cell = Cell::styled('X', Color::Rgb(1, 2, 3), Color::Ansi256(9), Attr::DIM);
        cell.reset();
        assert_eq!(cell, Cell::EMPTY);
    }

    #[test]
    fn debug_continuation() {
        let cont = Cell::continuation(Color::Default, Color::Default, Attr::empty());
        assert_eq!(format!("{cont:?}"), "Cell(continuation)");
    }

    #[test]
    fn debug_styled_cell_lists_fields() {
        let cell = Cell::new('A').with_fg(Color::Rgb(255, 0, 0)).with_attrs(Attr::BOLD);
        let dbg = format!("{cell:?}");
        assert!(dbg.contains("'A'"));
        assert!(dbg.contains("fg="));
        assert!(dbg.contains("BOLD"));
    }
}
