use std::time::Duration;
use tokio::time::Instant;

use super::{TimerState, SLIDE_DURATION_MS, TOTAL_SLIDES};

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub state: TimerState,
    /// True only on the first tick that observes the finish.
    pub fire_finish: bool,
}

/// Drift-free elapsed-time model.
///
/// Elapsed time is always recomputed from instants, never accumulated per
/// tick, so scheduling jitter cannot skew it. While paused, "now" is pinned to
/// the pause instant.
#[derive(Debug, Clone)]
pub struct TimerClock {
    start: Instant,
    paused_at: Option<Instant>,
    total_paused: Duration,
    manual_offset_ms: i64,
    finish_fired: bool,
}

impl TimerClock {
    pub fn new(now: Instant, auto_start: bool) -> Self {
        Self {
            start: now,
            paused_at: if auto_start { None } else { Some(now) },
            total_paused: Duration::ZERO,
            manual_offset_ms: 0,
            finish_fired: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn finish_fired(&self) -> bool {
        self.finish_fired
    }

    pub fn effective_elapsed_ms(&self, now: Instant) -> i64 {
        let reference = self.paused_at.unwrap_or(now);
        let running = reference
            .saturating_duration_since(self.start)
            .saturating_sub(self.total_paused);
        running.as_millis() as i64 + self.manual_offset_ms
    }

    pub fn state(&self, now: Instant) -> TimerState {
        TimerState::from_elapsed(self.effective_elapsed_ms(now), self.is_paused())
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let state = self.state(now);
        let fire_finish = state.is_finished && !self.finish_fired;
        if fire_finish {
            self.finish_fired = true;
        }
        TickOutcome { state, fire_finish }
    }

    /// Returns false when already paused.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Returns false when not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        match self.paused_at.take() {
            Some(paused_at) => {
                self.total_paused += now.saturating_duration_since(paused_at);
                true
            }
            None => false,
        }
    }

    /// Returns the paused flag after toggling.
    pub fn toggle_pause(&mut self, now: Instant) -> bool {
        if self.is_paused() {
            self.resume(now);
            false
        } else {
            self.pause(now);
            true
        }
    }

    /// Jump to the start of slide `index` (clamped to the deck) and re-arm the finish.
    pub fn go_to_slide(&mut self, index: i64, now: Instant) -> usize {
        let slide = index.clamp(0, TOTAL_SLIDES as i64 - 1) as usize;
        let target = slide as i64 * SLIDE_DURATION_MS as i64;
        self.manual_offset_ms += target - self.effective_elapsed_ms(now);
        self.finish_fired = false;
        slide
    }

    pub fn next_slide(&mut self, now: Instant) -> Option<usize> {
        let current = self.state(now).current_slide;
        if current + 1 >= TOTAL_SLIDES {
            return None;
        }
        Some(self.go_to_slide(current as i64 + 1, now))
    }

    pub fn prev_slide(&mut self, now: Instant) -> Option<usize> {
        let current = self.state(now).current_slide;
        if current == 0 {
            return None;
        }
        Some(self.go_to_slide(current as i64 - 1, now))
    }

    /// Start over from zero, keeping the current paused/running mode.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now, !self.is_paused());
    }
}
