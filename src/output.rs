// SPDX-License-Identifier: MIT
//
// Output buffering and stateful run emission.
//
// Two components work together to minimize terminal I/O:
//
//   OutputBuffer — accumulates all ANSI bytes in memory so the entire
//   frame can be written in a single write() syscall. This eliminates
//   per-escape overhead and keeps the terminal's own parser happy.
//
//   RunWriter — tracks the terminal's current state (cursor position,
//   active style) across runs and skips redundant escape sequences. If
//   one run ends where the next begins with the same style, the output
//   is just the characters — no cursor move, no SGR at all.
//
// Together these turn a frame into one buffered write with minimal
// escapes instead of hundreds of small writes.

use std::io::{self, Write};

use crate::ansi;
use crate::diff::{RunStyle, StyledRun};

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// A byte buffer that accumulates ANSI output for a single `write()` syscall.
///
/// Default capacity: 16 KB — enough for most frames without reallocation.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    /// Create an empty buffer with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to stdout and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&self.buf)?;
            stdout.flush()?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Write accumulated output to an arbitrary writer and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. Real flushing via flush_stdout() / flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RunWriter ───────────────────────────────────────────────────────────────

/// Stateful run renderer that tracks terminal state to skip redundant escapes.
///
/// Optimization decisions:
///
/// - **Cursor**: skipped when a run starts exactly where the previous run
///   ended on the same row — the terminal auto-advances after character
///   output.
/// - **Style**: skipped entirely when unchanged since the last run. On an
///   attribute change where the old attributes were non-empty, a reset
///   (SGR 0) clears them first, which invalidates color tracking and
///   forces colors to be re-emitted.
pub struct RunWriter {
    last_x: i32,
    last_y: i32,
    last_style: Option<RunStyle>,
}

impl RunWriter {
    /// Create a writer with no tracked state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_x: -1,
            last_y: -1,
            last_style: None,
        }
    }

    /// Reset all tracked state. Call at the start of each frame and after
    /// any terminal reset.
    pub fn reset_state(&mut self) {
        *self = Self::new();
    }

    /// Emit one run with only the escape sequences it needs.
    pub fn render_run(&mut self, out: &mut OutputBuffer, run: &StyledRun) {
        let xi = i32::from(run.x);
        let yi = i32::from(run.y);

        // Cursor move, unless we're already there from the previous run.
        if yi != self.last_y || xi != self.last_x {
            ansi::cursor_to(out, run.x, run.y).ok();
        }

        self.apply_style(out, run.style);

        out.write_all(run.text.as_bytes()).ok();

        self.last_x = xi + i32::from(run.columns());
        self.last_y = yi;
    }

    fn apply_style(&mut self, out: &mut OutputBuffer, style: RunStyle) {
        if self.last_style == Some(style) {
            return;
        }

        match self.last_style {
            Some(prev) => {
                if prev.attrs != style.attrs && !prev.attrs.is_empty() {
                    // SGR 0 clears attributes and colors alike.
                    ansi::reset(out).ok();
                    ansi::attrs(out, style.attrs).ok();
                    ansi::fg(out, style.fg).ok();
                    ansi::bg(out, style.bg).ok();
                } else {
                    if prev.attrs != style.attrs {
                        ansi::attrs(out, style.attrs).ok();
                    }
                    if prev.fg != style.fg {
                        ansi::fg(out, style.fg).ok();
                    }
                    if prev.bg != style.bg {
                        ansi::bg(out, style.bg).ok();
                    }
                }
            }
            None => {
                // First run of the frame: emit the full style.
                ansi::attrs(out, style.attrs).ok();
                ansi::fg(out, style.fg).ok();
                ansi::bg(out, style.bg).ok();
            }
        }

        self.last_style = Some(style);
    }
}

impl Default for RunWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Attr, Color, NamedColor};

    // ── OutputBuffer ─────────────────────────────────────────────────────

    #[test]
    fn output_buffer_starts_empty() {
        let buf = OutputBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn output_buffer_write_trait() {
        let mut buf = OutputBuffer::new();
        write!(buf, "hello {}", 42).unwrap();
        assert_eq!(buf.as_bytes(), b"hello 42");
    }

    #[test]
    fn output_buffer_clear_keeps_capacity() {
        let mut buf = OutputBuffer::new();
        write!(buf, "some data").unwrap();
        let cap = buf.buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.buf.capacity(), cap);
    }

    #[test]
    fn output_buffer_flush_to() {
        let mut buf = OutputBuffer::new();
        write!(buf, "frame data").unwrap();

        let mut dest = Vec::new();
        buf.flush_to(&mut dest).unwrap();

        assert_eq!(dest, b"frame data");
        assert!(buf.is_empty());
    }

    #[test]
    fn output_buffer_flush_to_empty_is_noop() {
        let mut buf = OutputBuffer::new();
        let mut dest = Vec::new();
        buf.flush_to(&mut dest).unwrap();
        assert!(dest.is_empty());
    }

    // ── RunWriter — helpers ──────────────────────────────────────────────

    fn run(x: u16, y: u16, text: &str, style: RunStyle) -> StyledRun {
        StyledRun {
            x,
            y,
            style,
            text: text.into(),
        }
    }

    fn plain() -> RunStyle {
        RunStyle::default()
    }

    fn red_fg() -> RunStyle {
        RunStyle {
            fg: Color::Named(NamedColor::Red),
            ..RunStyle::default()
        }
    }

    fn render(runs: &[StyledRun]) -> String {
        let mut out = OutputBuffer::new();
        let mut writer = RunWriter::new();
        for r in runs {
            writer.render_run(&mut out, r);
        }
        String::from_utf8(out.as_bytes().to_vec()).unwrap()
    }

    // ── RunWriter — cursor ───────────────────────────────────────────────

    #[test]
    fn first_run_emits_cursor_move() {
        let out = render(&[run(5, 3, "A", plain())]);
        assert!(out.contains("\x1b[4;6H"));
        assert!(out.ends_with('A'));
    }

    #[test]
    fn adjacent_runs_skip_cursor_move() {
        let out = render(&[
            run(0, 0, "AB", plain()),
            run(2, 0, "CD", plain()), // starts where the previous ended
        ]);
        assert_eq!(out.matches('H').count(), 1);
        assert!(out.contains("ABCD"));
    }

    #[test]
    fn gap_between_runs_emits_cursor_move() {
        let out = render(&[run(0, 0, "A", plain()), run(5, 0, "B", plain())]);
        assert_eq!(out.matches('H').count(), 2);
    }

    #[test]
    fn new_row_emits_cursor_move() {
        let out = render(&[run(0, 0, "A", plain()), run(1, 1, "B", plain())]);
        assert_eq!(out.matches('H').count(), 2);
    }

    #[test]
    fn wide_text_advances_cursor_tracking_by_columns() {
        // "中" covers two columns, so a run at x+2 is adjacent.
        let out = render(&[run(0, 0, "中", plain()), run(2, 0, "x", plain())]);
        assert_eq!(out.matches('H').count(), 1);
    }

    // ── RunWriter — style ────────────────────────────────────────────────

    #[test]
    fn same_style_not_re_emitted() {
        let out = render(&[run(0, 0, "A", red_fg()), run(1, 0, "B", red_fg())]);
        assert_eq!(out.matches("\x1b[31m").count(), 1);
    }

    #[test]
    fn changed_fg_emitted() {
        let green = RunStyle {
            fg: Color::Named(NamedColor::Green),
            ..RunStyle::default()
        };
        let out = render(&[run(0, 0, "A", red_fg()), run(1, 0, "B", green)]);
        assert!(out.contains("\x1b[31m"));
        assert!(out.contains("\x1b[32m"));
    }

    #[test]
    fn attr_change_from_set_attrs_triggers_reset() {
        let bold = RunStyle {
            attrs: Attr::BOLD,
            ..RunStyle::default()
        };
        let italic = RunStyle {
            attrs: Attr::ITALIC,
            ..RunStyle::default()
        };
        let out = render(&[run(0, 0, "A", bold), run(1, 0, "B", italic)]);
        assert!(out.contains("\x1b[0m"));
        assert!(out.contains("\x1b[3m"));
    }

    #[test]
    fn reset_re_emits_colors() {
        let bold_red = RunStyle {
            fg: Color::Named(NamedColor::Red),
            attrs: Attr::BOLD,
            ..RunStyle::default()
        };
        let plain_red = red_fg();
        let out = render(&[run(0, 0, "A", bold_red), run(1, 0, "B", plain_red)]);
        // The attr drop resets everything, so red must appear twice.
        assert_eq!(out.matches("\x1b[31m").count(), 2);
    }

    #[test]
    fn none_to_attr_skips_reset() {
        let bold = RunStyle {
            attrs: Attr::BOLD,
            ..RunStyle::default()
        };
        let out = render(&[run(0, 0, "A", plain()), run(1, 0, "B", bold)]);
        assert!(!out.contains("\x1b[0m"));
        assert!(out.contains("\x1b[1m"));
    }

    #[test]
    fn reset_state_forgets_cursor_and_style() {
        let mut out = OutputBuffer::new();
        let mut writer = RunWriter::new();
        writer.render_run(&mut out, &run(0, 0, "A", red_fg()));
        writer.reset_state();
        writer.render_run(&mut out, &run(1, 0, "B", red_fg()));

        let s = String::from_utf8(out.as_bytes().to_vec()).unwrap();
        // After reset, both the cursor move and the color are re-emitted.
        assert_eq!(s.matches('H').count(), 2);
        assert_eq!(s.matches("\x1b[31m").count(), 2);
    }
}
