// SPDX-License-Identifier: MIT
//
// Renderer — frame orchestration over the double buffer.
//
// Per frame:
//
//   1. Count changed cells and let the strategy selector pick full vs.
//      differential.
//   2. Turn the choice into StyledRuns (diff or full sweep).
//   3. Emit the runs through the stateful RunWriter into the output
//      buffer, wrapped in synchronized-output markers.
//   4. Flush everything in one write, then swap front/back.
//
// Frame pacing targets a configured FPS. The renderer never sleeps and
// never drops a frame: `ready()` / `delay_until_ready()` tell the event
// loop when the next frame may start, and a frame that blew its budget
// makes the next one eligible immediately — correctness over smoothness.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::ansi;
use crate::buffer::ScreenBuffer;
use crate::diff;
use crate::double_buffer::{DoubleBufferManager, SwapStats};
use crate::output::{OutputBuffer, RunWriter};
use crate::strategy::{RenderStrategy, StrategyConfig, StrategySelector};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Renderer configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    /// Target frame rate. The frame budget is `1 / target_fps`.
    pub target_fps: u32,
    /// Strategy selection thresholds.
    pub strategy: StrategyConfig,
    /// Wrap frames in DEC 2026 synchronized-output markers.
    pub synchronized_output: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            strategy: StrategyConfig::default(),
            synchronized_output: true,
        }
    }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Statistics for a single rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Strategy chosen for this frame.
    pub strategy: RenderStrategy,
    /// Cells that differed from the displayed frame.
    pub cells_changed: usize,
    /// Total cells scanned.
    pub cells_total: usize,
    /// Number of styled runs emitted.
    pub runs_emitted: usize,
    /// Bytes of terminal output generated.
    pub bytes_written: usize,
    /// Wall-clock duration of diff + emit + flush.
    pub duration: Duration,
    /// Whether the frame exceeded the frame budget.
    pub over_budget: bool,
}

/// Cumulative counters across the renderer's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderTotals {
    /// Frames rendered.
    pub frames: u64,
    /// Frames that exceeded the budget.
    pub over_budget_frames: u64,
    /// Total bytes written to the terminal.
    pub bytes_written: u64,
}

// ─── Renderer ────────────────────────────────────────────────────────────────

/// Frame-paced renderer over a front/back buffer pair.
///
/// ```
/// use emberterm::renderer::Renderer;
/// use emberterm::cell::Cell;
///
/// let mut renderer = Renderer::new(80, 24);
/// renderer.back_buffer().set(0, 0, Cell::new('X'));
///
/// let mut out = Vec::new();
/// let stats = renderer.render_to(&mut out).unwrap();
/// assert!(stats.bytes_written > 0);
/// ```
pub struct Renderer {
    buffers: DoubleBufferManager,
    selector: StrategySelector,
    writer: RunWriter,
    out: OutputBuffer,
    config: RenderConfig,
    frame_budget: Duration,
    next_frame_at: Option<Instant>,
    totals: RenderTotals,
    force_full: bool,
}

impl Renderer {
    /// Create a renderer with default configuration.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_config(cols, rows, RenderConfig::default())
    }

    /// Create a renderer with explicit configuration.
    #[must_use]
    pub fn with_config(cols: u16, rows: u16, config: RenderConfig) -> Self {
        let fps = config.target_fps.max(1);
        Self {
            buffers: DoubleBufferManager::new(cols, rows),
            selector: StrategySelector::new(config.strategy),
            writer: RunWriter::new(),
            out: OutputBuffer::new(),
            config,
            frame_budget: Duration::from_secs(1) / fps,
            next_frame_at: None,
            totals: RenderTotals::default(),
            force_full: true, // Nothing is on screen yet.
        }
    }

    // ─── Buffer access ───────────────────────────────────────────────────

    /// The drawing surface for the current frame.
    ///
    /// This is the only mutable handle the renderer gives out; the front
    /// buffer stays private to the diff pass.
    #[inline]
    pub fn back_buffer(&mut self) -> &mut ScreenBuffer {
        self.buffers.back_buffer()
    }

    /// Read-only view of the last flushed frame.
    ///
    /// For read-side collaborators (accessibility traversal, tests) —
    /// never a drawing target.
    #[inline]
    #[must_use]
    pub const fn displayed(&self) -> &ScreenBuffer {
        self.buffers.front()
    }

    /// Whether the back buffer has been written since the last frame.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.buffers.back().has_dirty()
    }

    /// Swap diagnostics from the underlying buffer pair.
    #[must_use]
    pub const fn swap_stats(&self) -> &SwapStats {
        self.buffers.stats()
    }

    /// Cumulative render counters.
    #[must_use]
    pub const fn totals(&self) -> &RenderTotals {
        &self.totals
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// Resize both buffers, discarding content. The next frame is a full
    /// redraw and the strategy history is reset (old ratios say nothing
    /// about the new geometry).
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.buffers.resize(cols, rows);
        self.selector.reset();
        self.force_full = true;
    }

    /// Force the next frame to redraw everything (manual refresh,
    /// return from alternate screen).
    pub fn force_redraw(&mut self) {
        self.force_full = true;
    }

    // ─── Pacing ──────────────────────────────────────────────────────────

    /// The per-frame time budget (`1 / target_fps`).
    #[inline]
    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Whether the next frame may start now.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.next_frame_at.is_none_or(|t| Instant::now() >= t)
    }

    /// How long until the next frame may start (zero when ready).
    #[must_use]
    pub fn delay_until_ready(&self) -> Duration {
        self.next_frame_at
            .map_or(Duration::ZERO, |t| t.saturating_duration_since(Instant::now()))
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    /// Render the back buffer to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails.
    pub fn render(&mut self) -> io::Result<FrameStats> {
        let mut stdout = io::stdout().lock();
        self.render_to(&mut stdout)
    }

    /// Render the back buffer to an arbitrary writer, then swap.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn render_to(&mut self, w: &mut impl Write) -> io::Result<FrameStats> {
        let start = Instant::now();
        let total = self.buffers.back().total_cells();

        let (strategy, cells_changed) = if self.force_full {
            (RenderStrategy::Full, total)
        } else {
            let changed = diff::changed_cells(self.buffers.front(), self.buffers.back());
            (self.selector.select(changed, total), changed)
        };

        let runs = match strategy {
            RenderStrategy::Full => diff::full(self.buffers.back()),
            RenderStrategy::Differential => {
                diff::diff(self.buffers.front(), self.buffers.back())
            }
        };

        self.out.clear();
        self.writer.reset_state();

        if self.config.synchronized_output {
            ansi::begin_sync(&mut self.out).ok();
        }
        if strategy == RenderStrategy::Full {
            // A full frame covers every cell, but clearing first drops any
            // stale content outside the grid (resize leftovers).
            ansi::clear_screen(&mut self.out).ok();
        }
        for run in &runs {
            self.writer.render_run(&mut self.out, run);
        }
        // Leave the terminal in a neutral state between frames.
        ansi::reset(&mut self.out).ok();
        if self.config.synchronized_output {
            ansi::end_sync(&mut self.out).ok();
        }

        let bytes_written = self.out.len();
        self.out.flush_to(w)?;

        self.buffers.swap();
        self.force_full = false;

        let duration = start.elapsed();
        let over_budget = duration > self.frame_budget;
        // An over-budget frame runs the next one immediately; a frame is
        // never skipped to "catch up".
        self.next_frame_at = if over_budget {
            None
        } else {
            Some(start + self.frame_budget)
        };

        self.totals.frames += 1;
        self.totals.bytes_written += bytes_written as u64;
        if over_budget {
            self.totals.over_budget_frames += 1;
        }

        Ok(FrameStats {
            strategy,
            cells_changed,
            cells_total: total,
            runs_emitted: runs.len(),
            bytes_written,
            duration,
            over_budget,
        })
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Renderer({}x{}, {} frames)",
            self.buffers.width(),
            self.buffers.height(),
            self.totals.frames
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
