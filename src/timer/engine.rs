use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{TimerClock, TimerState, TOTAL_SLIDES};

/// Published by the tick loop, in tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick(TimerState),
    Finished,
}

struct PendingTick {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Schedules the frame-paced tick loop around a shared `TimerClock`.
///
/// Every call that changes the schedule cancels the pending tick task before
/// touching the clock. The tick task re-checks its token while holding the
/// clock lock, so a stale tick can never publish over fresh state.
pub struct TimerEngine {
    clock: Arc<Mutex<TimerClock>>,
    events: mpsc::UnboundedSender<TimerEvent>,
    frame_period: Duration,
    pending: Option<PendingTick>,
}

impl TimerEngine {
    pub fn new(frame_rate_hz: u32, events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        let frame_period = Duration::from_secs_f64(1.0 / f64::from(frame_rate_hz.max(1)));
        Self {
            clock: Arc::new(Mutex::new(TimerClock::new(Instant::now(), false))),
            events,
            frame_period,
            pending: None,
        }
    }

    pub fn start(&mut self, auto_start: bool) {
        self.cancel_pending();
        {
            let mut clock = lock(&self.clock);
            *clock = TimerClock::new(Instant::now(), auto_start);
            if !auto_start {
                self.publish(&clock);
            }
        }
        info!("Timer started (auto_start: {})", auto_start);
        if auto_start {
            self.schedule();
        }
    }

    pub fn pause(&mut self) {
        if self.is_paused() {
            return;
        }
        self.cancel_pending();
        let mut clock = lock(&self.clock);
        clock.pause(Instant::now());
        debug!("Timer paused at {}ms", clock.effective_elapsed_ms(Instant::now()));
        self.publish(&clock);
    }

    pub fn resume(&mut self) {
        if !self.is_paused() {
            return;
        }
        self.cancel_pending();
        lock(&self.clock).resume(Instant::now());
        debug!("Timer resumed");
        self.schedule();
    }

    pub fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn go_to_slide(&mut self, index: i64) {
        self.cancel_pending();
        let paused = {
            let mut clock = lock(&self.clock);
            let slide = clock.go_to_slide(index, Instant::now());
            debug!("Timer seeked to slide {}", slide);
            if clock.is_paused() {
                self.publish(&clock);
            }
            clock.is_paused()
        };
        if !paused {
            self.schedule();
        }
    }

    pub fn next_slide(&mut self) {
        let current = self.state().current_slide;
        if current + 1 < TOTAL_SLIDES {
            self.go_to_slide(current as i64 + 1);
        }
    }

    pub fn prev_slide(&mut self) {
        let current = self.state().current_slide;
        if current > 0 {
            self.go_to_slide(current as i64 - 1);
        }
    }

    pub fn reset(&mut self) {
        self.cancel_pending();
        let paused = {
            let mut clock = lock(&self.clock);
            clock.reset(Instant::now());
            if clock.is_paused() {
                self.publish(&clock);
            }
            clock.is_paused()
        };
        info!("Timer reset");
        if !paused {
            self.schedule();
        }
    }

    /// Cancel any pending tick. Nothing is published afterwards.
    pub fn teardown(&mut self) {
        self.cancel_pending();
        debug!("Timer torn down");
    }

    pub fn state(&self) -> TimerState {
        lock(&self.clock).state(Instant::now())
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.clock).is_paused()
    }

    /// Whether a tick loop is currently scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.token.is_cancelled() && !pending.handle.is_finished())
    }

    fn publish(&self, clock: &TimerClock) {
        let _ = self.events.send(TimerEvent::Tick(clock.state(Instant::now())));
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }
    }

    fn schedule(&mut self) {
        self.cancel_pending();
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_ticks(
            Arc::clone(&self.clock),
            self.events.clone(),
            self.frame_period,
            token.clone(),
        ));
        self.pending = Some(PendingTick { token, handle });
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

async fn run_ticks(
    clock: Arc<Mutex<TimerClock>>,
    events: mpsc::UnboundedSender<TimerEvent>,
    frame_period: Duration,
    token: CancellationToken,
) {
    let mut frames = time::interval(frame_period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = frames.tick() => {}
        }

        let keep_running = {
            let mut clock = lock(&clock);
            if token.is_cancelled() {
                return;
            }
            let outcome = clock.tick(Instant::now());
            if events.send(TimerEvent::Tick(outcome.state)).is_err() {
                return;
            }
            if outcome.fire_finish {
                info!("Timer finished");
                let _ = events.send(TimerEvent::Finished);
            }
            !outcome.state.is_finished && !outcome.state.is_paused
        };

        if !keep_running {
            trace!("Tick loop stopped");
            return;
        }
    }
}

fn lock(clock: &Mutex<TimerClock>) -> MutexGuard<'_, TimerClock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}
