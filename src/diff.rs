// SPDX-License-Identifier: MIT
//
// Differential rendering — computing minimal terminal writes.
//
// Instead of redrawing the entire screen every frame, we compare the
// newly drawn back buffer against the front buffer (what the terminal
// currently shows) and produce a list of StyledRuns: maximal runs of
// identically-styled characters at a cursor position. The run writer
// then turns each run into one cursor move + at most one style change +
// the characters.
//
// Style changes are the expensive part of terminal output — an SGR
// color sequence is ~19 bytes against 1 byte per character — so runs
// are built to minimize style transitions first:
//
//   - A run never crosses a style boundary.
//   - Unchanged cells between two changed cells of the same style are
//     absorbed into the run (rewriting them is identical bytes on
//     screen) when the gap is short — cheaper than a cursor reposition,
//     and never costs an extra style transition.
//
// Wide characters are handled pairwise: an owner cell and its
// continuation always travel in the same run, and a changed
// continuation drags its owner in, since a terminal cannot repaint the
// second column of a wide character alone.
//
// `apply()` replays runs onto a ScreenBuffer, modeling what the
// terminal would display. `apply(diff(A, B), A) == B` is the contract
// the whole pipeline rests on, and the property tests below exercise it.

use crate::buffer::{char_width, ScreenBuffer};
use crate::cell::{Attr, Cell, Color};

/// Longest gap of unchanged same-style cells absorbed into a run.
///
/// A cursor reposition costs ~8 bytes; rewriting an unchanged cell costs
/// 1. Gaps up to this length are cheaper to write through than to jump.
const MAX_BRIDGE: usize = 4;

// ─── Run Types ───────────────────────────────────────────────────────────────

/// The style shared by every character of a [`StyledRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStyle {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attr,
}

impl RunStyle {
    /// Extract the style of a cell.
    #[inline]
    #[must_use]
    pub fn of(cell: &Cell) -> Self {
        Self {
            fg: cell.fg,
            bg: cell.bg,
            attrs: cell.attrs,
        }
    }
}

/// One minimal terminal write: identically-styled characters starting at
/// a cursor position. Produced fresh each frame, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    /// Starting column (0-indexed).
    pub x: u16,
    /// Row (0-indexed).
    pub y: u16,
    /// Style applied to every character in the run.
    pub style: RunStyle,
    /// The characters to write. Wide characters occupy two columns.
    pub text: String,
}

impl StyledRun {
    /// Number of terminal columns this run covers.
    #[must_use]
    pub fn columns(&self) -> u16 {
        let cols: usize = self.text.chars().map(|ch| char_width(ch).max(1)).sum();
        u16::try_from(cols).unwrap_or(u16::MAX)
    }
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// Whether the cell at `x` (or its wide-char continuation) differs
/// between the two rows.
fn cell_changed(front_row: &[Cell], back_row: &[Cell], x: usize) -> bool {
    if back_row[x] != front_row[x] {
        return true;
    }
    // A wide owner is also "changed" when only its continuation differs —
    // the pair can only be repainted together.
    if x + 1 < back_row.len() && back_row[x + 1].is_continuation() {
        return back_row[x + 1] != front_row[x + 1];
    }
    false
}

/// Compute the minimal run list transforming `front` into `back`.
///
/// Both buffers must have equal dimensions; the renderer reallocates
/// the pair together on resize, so a mismatch is a caller bug.
#[must_use]
pub fn diff(front: &ScreenBuffer, back: &ScreenBuffer) -> Vec<StyledRun> {
    debug_assert_eq!(front.width(), back.width());
    debug_assert_eq!(front.height(), back.height());
    if front.width() != back.width() || front.height() != back.height() {
        return full(back);
    }

    let mut runs = Vec::new();
    for y in 0..back.height() {
        let (Some(front_row), Some(back_row)) = (front.row(y), back.row(y)) else {
            continue;
        };
        // Whole-row fast path: most rows don't change between frames.
        if front_row == back_row {
            continue;
        }
        diff_row(front_row, back_row, y, &mut runs);
    }
    runs
}

/// Emit runs covering every cell of `back` (full redraw).
#[must_use]
pub fn full(back: &ScreenBuffer) -> Vec<StyledRun> {
    let mut runs = Vec::new();
    for y in 0..back.height() {
        let Some(row) = back.row(y) else { continue };
        let mut x = 0;
        while x < row.len() {
            if row[x].is_continuation() {
                x += 1;
                continue;
            }
            x = push_run(row, x, y, &mut runs, |_| true);
        }
    }
    runs
}

fn diff_row(front_row: &[Cell], back_row: &[Cell], y: u16, runs: &mut Vec<StyledRun>) {
    let w = back_row.len();
    let mut x = 0;
    while x < w {
        if !cell_changed(front_row, back_row, x) {
            x += 1;
            continue;
        }

        // A changed continuation drags its owner into the run.
        let start = if back_row[x].is_continuation() && x > 0 {
            x - 1
        } else {
            x
        };

        x = push_run(back_row, start, y, runs, |cx| {
            cell_changed(front_row, back_row, cx)
        });
    }
}

/// Build one run starting at `start` and push it. Returns the index of
/// the first cell after the run.
///
/// `changed(cx)` reports whether the cell at `cx` needs repainting; the
/// run extends over changed cells of one style, bridging short unchanged
/// gaps of the same style.
fn push_run(
    row: &[Cell],
    start: usize,
    y: u16,
    runs: &mut Vec<StyledRun>,
    changed: impl Fn(usize) -> bool,
) -> usize {
    let style = RunStyle::of(&row[start]);
    let mut text = String::new();
    let mut x = start;

    while x < row.len() {
        let cell = &row[x];

        if cell.is_continuation() {
            // Covered by the owner character already in the run.
            x += 1;
            continue;
        }
        if RunStyle::of(cell) != style {
            break;
        }

        if changed(x) {
            text.push(cell.ch);
            x += 1;
            continue;
        }

        // Unchanged cell: absorb a short same-style gap only when another
        // changed cell follows it — never pad the end of a run.
        let Some(resume) = scan_bridge(row, x, &style, &changed) else {
            break;
        };
        for cell in &row[x..resume] {
            if !cell.is_continuation() {
                text.push(cell.ch);
            }
        }
        x = resume;
    }

    // Empty only if the row started with an orphaned continuation cell.
    if !text.is_empty() {
        let run_x = u16::try_from(start).unwrap_or(u16::MAX);
        runs.push(StyledRun {
            x: run_x,
            y,
            style,
            text,
        });
    }
    x
}

/// From the unchanged cell at `x`, find the next changed same-style cell
/// within [`MAX_BRIDGE`]. Returns its index, or `None` when the run
/// should end here.
fn scan_bridge(
    row: &[Cell],
    x: usize,
    style: &RunStyle,
    changed: &impl Fn(usize) -> bool,
) -> Option<usize> {
    let mut gap = 0;
    let mut cx = x;
    while cx < row.len() && gap <= MAX_BRIDGE {
        let cell = &row[cx];
        if cell.is_continuation() || RunStyle::of(cell) != *style {
            return None;
        }
        if changed(cx) {
            return Some(cx);
        }
        gap += 1;
        cx += 1;
    }
    None
}

// ─── Apply (terminal-state model) ────────────────────────────────────────────

/// Replay runs onto a buffer, modeling what the terminal would display.
///
/// Writing a wide character fills its continuation cell with the run's
/// style, exactly as a real terminal paints both columns. Out-of-bounds
/// runs clip silently.
pub fn apply(runs: &[StyledRun], target: &mut ScreenBuffer) {
    for run in runs {
        let mut x = run.x;
        for ch in run.text.chars() {
            let wide = char_width(ch) >= 2;
            target.set(x, run.y, Cell::styled(ch, run.style.fg, run.style.bg, run.style.attrs));
            if wide {
                target.set(
                    x + 1,
                    run.y,
                    Cell::continuation(run.style.fg, run.style.bg, run.style.attrs),
                );
                x = x.saturating_add(2);
            } else {
                x = x.saturating_add(1);
            }
        }
    }
}

/// Count of changed cells between two equally sized buffers.
///
/// Used by the strategy selector to compute the change ratio without
/// materializing runs.
#[must_use]
pub fn changed_cells(front: &ScreenBuffer, back: &ScreenBuffer) -> usize {
    let mut changed = 0;
    for y in 0..back.height() {
        let (Some(front_row), Some(back_row)) = (front.row(y), back.row(y)) else {
            continue;
        };
        if front_row == back_row {
            continue;
        }
        changed += front_row
            .iter()
            .zip(back_row)
            .filter(|(a, b)| a != b)
            .count();
    }
    changed
}

// ─── Tests ───────────────────────────────────────────────────────────────────
