//! Presentation timing.
//!
//! The format is fixed: 20 slides, 15 seconds each, 5 minutes in total.
//! `TimerClock` is the pure elapsed-time model; `TimerEngine` schedules the
//! frame-paced tick loop that publishes `TimerState` snapshots.

mod clock;
mod engine;

pub use clock::{TickOutcome, TimerClock};
pub use engine::{TimerEngine, TimerEvent};

use serde::{Deserialize, Serialize};

pub const TOTAL_SLIDES: usize = 20;
pub const SLIDE_DURATION_MS: u64 = 15_000;
pub const TOTAL_DURATION_MS: u64 = SLIDE_DURATION_MS * TOTAL_SLIDES as u64;
pub const SLIDE_SECONDS: u32 = (SLIDE_DURATION_MS / 1000) as u32;

/// Snapshot of the talk's progress, derived from the clock on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub current_slide: usize,
    pub slide_elapsed_ms: u64,
    pub total_elapsed_ms: u64,
    pub is_paused: bool,
    pub is_finished: bool,
}

impl TimerState {
    /// Derive the state for an (unclamped) elapsed time.
    pub fn from_elapsed(elapsed_ms: i64, is_paused: bool) -> Self {
        let clamped = elapsed_ms.clamp(0, TOTAL_DURATION_MS as i64) as u64;
        let current_slide = ((clamped / SLIDE_DURATION_MS) as usize).min(TOTAL_SLIDES - 1);
        let slide_elapsed_ms = clamped - current_slide as u64 * SLIDE_DURATION_MS;

        Self {
            current_slide,
            slide_elapsed_ms,
            total_elapsed_ms: clamped,
            is_paused,
            is_finished: clamped >= TOTAL_DURATION_MS,
        }
    }

    /// Whole seconds left on the current slide, counting down 15..=1, and 0 once finished.
    pub fn slide_seconds_left(&self) -> u32 {
        if self.is_finished {
            return 0;
        }
        let remaining = SLIDE_DURATION_MS.saturating_sub(self.slide_elapsed_ms);
        (remaining.div_ceil(1000) as u32).min(SLIDE_SECONDS)
    }

    /// Fraction of the whole talk elapsed, in [0, 1].
    pub fn progress(&self) -> f32 {
        self.total_elapsed_ms as f32 / TOTAL_DURATION_MS as f32
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::from_elapsed(0, true)
    }
}
