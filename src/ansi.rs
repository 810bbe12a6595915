// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit — that's the `RunWriter`'s job. This module
// just knows the byte-level encoding of every terminal command we need.
//
// All cursor positions are 0-indexed in our API and converted to 1-indexed
// for the terminal (the ANSI standard uses 1-based coordinates).
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (backed by a Vec).

use std::io::{self, Write};

use crate::caps::MouseProtocol;
use crate::cell::{Attr, Color};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` using the CUP (Cursor Position) sequence.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", y + 1, x + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
///
/// Clears **everything**: intensity, colors, underline. The stateful
/// run writer must invalidate its tracked state after emitting this.
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// Set the foreground (text) color.
///
/// Named colors use the compact SGR codes (30–37, 90–97), palette entries
/// the 256-color extended format, and RGB the 24-bit form.
pub fn fg(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"\x1b[39m"),
        Color::Named(n) => {
            let idx = u16::from(n.index());
            if idx < 8 {
                write!(w, "\x1b[{}m", 30 + idx)
            } else {
                write!(w, "\x1b[{}m", 82 + idx)
            }
        }
        Color::Ansi256(idx) => write!(w, "\x1b[38;5;{idx}m"),
        Color::Rgb(r, g, b) => write!(w, "\x1b[38;2;{r};{g};{b}m"),
    }
}

/// Set the background color.
///
/// Same encoding strategy as [`fg`] with the BG-specific SGR codes
/// (40–47, 100–107, 48;5;N, 48;2;R;G;B).
pub fn bg(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"\x1b[49m"),
        Color::Named(n) => {
            let idx = u16::from(n.index());
            if idx < 8 {
                write!(w, "\x1b[{}m", 40 + idx)
            } else {
                write!(w, "\x1b[{}m", 92 + idx)
            }
        }
        Color::Ansi256(idx) => write!(w, "\x1b[48;5;{idx}m"),
        Color::Rgb(r, g, b) => write!(w, "\x1b[48;2;{r};{g};{b}m"),
    }
}

// ─── Text Attributes ─────────────────────────────────────────────────────────

/// Emit SGR codes for text attributes as a single CSI sequence.
///
/// Multiple attributes are semicolon-separated: `\x1b[1;4;9m` for
/// bold + underline + strikethrough. Does nothing if no attributes are set.
pub fn attrs(w: &mut impl Write, attr: Attr) -> io::Result<()> {
    if attr.is_empty() {
        return Ok(());
    }

    w.write_all(b"\x1b[")?;
    let mut first = true;

    macro_rules! emit {
        ($flag:expr, $code:expr) => {
            if attr.contains($flag) {
                if !first {
                    w.write_all(b";")?;
                }
                w.write_all($code)?;
                first = false;
            }
        };
    }

    emit!(Attr::BOLD, b"1");
    emit!(Attr::DIM, b"2");
    emit!(Attr::ITALIC, b"3");
    emit!(Attr::UNDERLINE, b"4");
    emit!(Attr::BLINK, b"5");
    emit!(Attr::INVERSE, b"7");
    emit!(Attr::HIDDEN, b"8");
    emit!(Attr::STRIKETHROUGH, b"9");
    let _ = first; // Last expansion sets first; suppress dead-write warning.

    w.write_all(b"m")
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC Private Mode 2026).
///
/// Tells the terminal to buffer all subsequent output until [`end_sync`],
/// preventing partial frame updates from causing visible flicker.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

/// End synchronized output — the terminal renders the buffered frame.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Alternate Screen ────────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer and restore the original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Mouse Protocol ──────────────────────────────────────────────────────────

/// Enable mouse tracking for the given protocol.
///
/// All protocols enable basic button tracking (DEC 1000). The encoding
/// extension differs: SGR terminals get drag motion (1002) plus the SGR
/// coordinate format (1006); UTF-8 terminals get the 1005 extension;
/// plain X10 terminals get button tracking only. `None` is a no-op.
pub fn enable_mouse(w: &mut impl Write, protocol: MouseProtocol) -> io::Result<()> {
    match protocol {
        MouseProtocol::None => Ok(()),
        MouseProtocol::X10 => w.write_all(b"\x1b[?1000h"),
        MouseProtocol::Utf8 => {
            w.write_all(b"\x1b[?1000h")?;
            w.write_all(b"\x1b[?1005h")
        }
        MouseProtocol::Sgr => {
            w.write_all(b"\x1b[?1000h")?;
            w.write_all(b"\x1b[?1002h")?;
            w.write_all(b"\x1b[?1006h")
        }
    }
}

/// Disable all mouse tracking modes, regardless of which were enabled.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l")?;
    w.write_all(b"\x1b[?1005l")?;
    w.write_all(b"\x1b[?1002l")?;
    w.write_all(b"\x1b[?1000l")
}

// ─── Kitty Keyboard Protocol ─────────────────────────────────────────────────

/// Enable the Kitty keyboard protocol with progressive enhancement flags.
///
/// Flags (bitfield, combine with `|`):
/// - `1` — disambiguate escape codes
/// - `2` — report event types (press / repeat / release)
/// - `4` — report alternate keys
/// - `8` — report all keys as escape codes
///
/// Flag `1` is the minimum useful level for an interactive application.
#[inline]
pub fn enable_kitty_keyboard(w: &mut impl Write, flags: u8) -> io::Result<()> {
    write!(w, "\x1b[>{flags}u")
}

/// Disable the Kitty keyboard protocol (pop the enhancement stack).
#[inline]
pub fn disable_kitty_keyboard(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[<u")
}

// ─── Bracketed Paste ─────────────────────────────────────────────────────────

/// Enable bracketed paste mode (DEC 2004).
///
/// Pasted text is wrapped with `\x1b[200~` / `\x1b[201~`, letting the
/// input parser deliver it as one paste event instead of a key storm.
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

/// Disable bracketed paste mode.
#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

// ─── Focus Reporting ─────────────────────────────────────────────────────────

/// Enable terminal focus reporting (DEC 1004).
///
/// The terminal sends `\x1b[I` on focus gain and `\x1b[O` on focus loss.
#[inline]
pub fn enable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004h")
}

/// Disable terminal focus reporting.
#[inline]
pub fn disable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004l")
}

// ─── Cursor Shape ───────────────────────────────────────────────────────────

/// Terminal cursor shape (DECSCUSR — Set Cursor Style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    /// Terminal default (usually blinking block).
    #[default]
    Default,
    /// Blinking block cursor.
    BlinkBlock,
    /// Steady (non-blinking) block cursor.
    SteadyBlock,
    /// Blinking underline cursor.
    BlinkUnderline,
    /// Steady underline cursor.
    SteadyUnderline,
    /// Blinking bar (I-beam) cursor.
    BlinkBar,
    /// Steady bar (I-beam) cursor.
    SteadyBar,
}

/// Set the cursor shape using DECSCUSR.
pub fn set_cursor_shape(w: &mut impl Write, shape: CursorShape) -> io::Result<()> {
    let code: u8 = match shape {
        CursorShape::Default => 0,
        CursorShape::BlinkBlock => 1,
        CursorShape::SteadyBlock => 2,
        CursorShape::BlinkUnderline => 3,
        CursorShape::SteadyUnderline => 4,
        CursorShape::BlinkBar => 5,
        CursorShape::SteadyBar => 6,
    };
    write!(w, "\x1b[{code} q")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::NamedColor;

    fn capture(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Cursor ───────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_is_one_indexed() {
        assert_eq!(capture(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(capture(|w| cursor_to(w, 7, 4)), "\x1b[5;8H");
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(capture(cursor_hide), "\x1b[?25l");
        assert_eq!(capture(cursor_show), "\x1b[?25h");
    }

    // ── Colors ───────────────────────────────────────────────────────────

    #[test]
    fn fg_default() {
        assert_eq!(capture(|w| fg(w, Color::Default)), "\x1b[39m");
    }

    #[test]
    fn fg_named_standard() {
        assert_eq!(capture(|w| fg(w, Color::Named(NamedColor::Red))), "\x1b[31m");
    }

    #[test]
    fn fg_named_bright() {
        assert_eq!(
            capture(|w| fg(w, Color::Named(NamedColor::BrightRed))),
            "\x1b[91m"
        );
    }

    #[test]
    fn fg_ansi256() {
        assert_eq!(capture(|w| fg(w, Color::Ansi256(208))), "\x1b[38;5;208m");
    }

    #[test]
    fn fg_rgb() {
        assert_eq!(
            capture(|w| fg(w, Color::Rgb(255, 128, 0))),
            "\x1b[38;2;255;128;0m"
        );
    }

    #[test]
    fn bg_variants() {
        assert_eq!(capture(|w| bg(w, Color::Default)), "\x1b[49m");
        assert_eq!(capture(|w| bg(w, Color::Named(NamedColor::Blue))), "\x1b[44m");
        assert_eq!(
            capture(|w| bg(w, Color::Named(NamedColor::BrightBlue))),
            "\x1b[104m"
        );
        assert_eq!(capture(|w| bg(w, Color::Ansi256(17))), "\x1b[48;5;17m");
        assert_eq!(capture(|w| bg(w, Color::Rgb(1, 2, 3))), "\x1b[48;2;1;2;3m");
    }

    // ── Attributes ───────────────────────────────────────────────────────

    #[test]
    fn attrs_empty_writes_nothing() {
        assert_eq!(capture(|w| attrs(w, Attr::empty())), "");
    }

    #[test]
    fn attrs_single() {
        assert_eq!(capture(|w| attrs(w, Attr::BOLD)), "\x1b[1m");
        assert_eq!(capture(|w| attrs(w, Attr::UNDERLINE)), "\x1b[4m");
    }

    #[test]
    fn attrs_combined_semicolon_separated() {
        assert_eq!(
            capture(|w| attrs(w, Attr::BOLD | Attr::UNDERLINE | Attr::STRIKETHROUGH)),
            "\x1b[1;4;9m"
        );
    }

    // ── Modes ────────────────────────────────────────────────────────────

    #[test]
    fn sync_markers() {
        assert_eq!(capture(begin_sync), "\x1b[?2026h");
        assert_eq!(capture(end_sync), "\x1b[?2026l");
    }

    #[test]
    fn alt_screen() {
        assert_eq!(capture(enter_alt_screen), "\x1b[?1049h");
        assert_eq!(capture(exit_alt_screen), "\x1b[?1049l");
    }

    #[test]
    fn mouse_enable_per_protocol() {
        assert_eq!(capture(|w| enable_mouse(w, MouseProtocol::None)), "");
        assert_eq!(capture(|w| enable_mouse(w, MouseProtocol::X10)), "\x1b[?1000h");
        assert_eq!(
            capture(|w| enable_mouse(w, MouseProtocol::Utf8)),
            "\x1b[?1000h\x1b[?1005h"
        );
        assert_eq!(
            capture(|w| enable_mouse(w, MouseProtocol::Sgr)),
            "\x1b[?1000h\x1b[?1002h\x1b[?1006h"
        );
    }

    #[test]
    fn mouse_disable_covers_all_modes() {
        let out = capture(disable_mouse);
        for mode in ["1006", "1005", "1002", "1000"] {
            assert!(out.contains(&format!("\x1b[?{mode}l")), "missing {mode}");
        }
    }

    #[test]
    fn kitty_keyboard_modes() {
        assert_eq!(capture(|w| enable_kitty_keyboard(w, 1)), "\x1b[>1u");
        assert_eq!(capture(|w| enable_kitty_keyboard(w, 3)), "\x1b[>3u");
        assert_eq!(capture(disable_kitty_keyboard), "\x1b[<u");
    }

    #[test]
    fn paste_and_focus_modes() {
        assert_eq!(capture(enable_bracketed_paste), "\x1b[?2004h");
        assert_eq!(capture(disable_bracketed_paste), "\x1b[?2004l");
        assert_eq!(capture(enable_focus_reporting), "\x1b[?1004h");
        assert_eq!(capture(disable_focus_reporting), "\x1b[?1004l");
    }

    // ── Cursor shape ─────────────────────────────────────────────────────

    #[test]
    fn cursor_shapes() {
        assert_eq!(capture(|w| set_cursor_shape(w, CursorShape::Default)), "\x1b[0 q");
        assert_eq!(capture(|w| set_cursor_shape(w, CursorShape::SteadyBar)), "\x1b[6 q");
    }
}
