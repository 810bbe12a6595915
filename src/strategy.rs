// SPDX-License-Identifier: MIT
//
// Render strategy selection — full vs. differential vs. adaptive.
//
// Diffing pays off when little changed; when most of the screen changed,
// the cell comparisons are pure overhead on top of writing everything
// anyway. The selector picks per frame based on the changed-cell ratio:
//
//   Full         — always redraw everything
//   Differential — diff, falling back to full above a per-frame cutoff
//   Smart        — like Differential, but the full/diff decision follows
//                  a rolling average of recent ratios with separate
//                  enter/exit thresholds, so one busy frame doesn't flip
//                  the strategy back and forth
//
// The thresholds are starting points, not derived optima — they live in
// `StrategyConfig` so hosts can tune them against real workloads.

use std::collections::VecDeque;

// ─── Strategy Types ──────────────────────────────────────────────────────────

/// The redraw approach chosen for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Redraw every cell.
    Full,
    /// Emit only changed runs.
    Differential,
}

/// The configured selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyMode {
    /// Always full redraw.
    Full,
    /// Diff with a per-frame full-redraw cutoff.
    Differential,
    /// Adaptive: rolling-average hysteresis between the two.
    #[default]
    Smart,
}

/// Tunable thresholds for strategy selection.
#[derive(Debug, Clone, Copy)]
pub struct StrategyConfig {
    /// Selection policy.
    pub mode: StrategyMode,
    /// Per-frame ratio at or above which a full redraw wins outright.
    pub full_threshold: f32,
    /// Rolling average at or above which Smart switches to full redraws.
    pub smart_enter_full: f32,
    /// Rolling average at or below which Smart switches back to diffing.
    /// Kept below `smart_enter_full` so borderline frames don't thrash.
    pub smart_exit_full: f32,
    /// Number of recent frames in the rolling average.
    pub window: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            mode: StrategyMode::Smart,
            full_threshold: 0.6,
            smart_enter_full: 0.5,
            smart_exit_full: 0.3,
            window: 8,
        }
    }
}

// ─── StrategySelector ────────────────────────────────────────────────────────

/// Per-frame strategy chooser with rolling-average state.
#[derive(Debug)]
pub struct StrategySelector {
    config: StrategyConfig,
    recent: VecDeque<f32>,
    /// Smart mode's current side of the hysteresis band.
    in_full: bool,
}

impl StrategySelector {
    /// Create a selector with the given configuration.
    #[must_use]
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            recent: VecDeque::with_capacity(config.window.max(1)),
            in_full: false,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Choose the strategy for a frame with `changed` of `total` cells
    /// differing from the displayed frame.
    #[allow(clippy::cast_precision_loss)] // Cell counts are far below f32 precision loss.
    pub fn select(&mut self, changed: usize, total: usize) -> RenderStrategy {
        if total == 0 {
            return RenderStrategy::Differential;
        }
        let ratio = changed as f32 / total as f32;

        match self.config.mode {
            StrategyMode::Full => RenderStrategy::Full,
            StrategyMode::Differential => {
                if ratio >= self.config.full_threshold {
                    RenderStrategy::Full
                } else {
                    RenderStrategy::Differential
                }
            }
            StrategyMode::Smart => self.select_smart(ratio),
        }
    }

    fn select_smart(&mut self, ratio: f32) -> RenderStrategy {
        if self.recent.len() >= self.config.window.max(1) {
            self.recent.pop_front();
        }
        self.recent.push_back(ratio);

        #[allow(clippy::cast_precision_loss)]
        let avg = self.recent.iter().sum::<f32>() / self.recent.len() as f32;

        let was_full = self.in_full;
        if self.in_full {
            if avg <= self.config.smart_exit_full {
                self.in_full = false;
            }
        } else if avg >= self.config.smart_enter_full {
            self.in_full = true;
        }
        if was_full != self.in_full {
            log::trace!(
                "render strategy switched to {} (rolling avg {avg:.2})",
                if self.in_full { "full" } else { "differential" }
            );
        }

        if self.in_full || ratio >= self.config.full_threshold {
            RenderStrategy::Full
        } else {
            RenderStrategy::Differential
        }
    }

    /// Drop accumulated history (e.g. after a resize, where ratios from
    /// the old geometry say nothing about the new one).
    pub fn reset(&mut self) {
        self.recent.clear();
        self.in_full = false;
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
