//! Talk session lifecycle.
//!
//! Waiting → Presenting → Finished, or Presenting → Exited on cancel/stop.
//! The coordinator owns the timer and the capture engine and translates
//! timer events into redraws, pause mirroring and a single finalize.

mod coordinator;
mod status;

pub use coordinator::SessionCoordinator;
pub use status::{SessionPhase, SessionStatus, SessionStatusHandle};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::MediaResult;
use crate::config::Config;
use crate::overlay::TalkInfo;
use crate::timer::TimerState;

/// Inputs from the keyboard or a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlInput {
    /// Begin a talk that is waiting for the speaker.
    Start,
    TogglePause,
    Pause,
    Resume,
    NextSlide,
    PrevSlide,
    /// Zero-based; clamped to the deck.
    GoToSlide(i64),
    Reset,
    /// Keyboard exit.
    Cancel,
    /// UI stop.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Finished,
    Cancelled,
    Stopped,
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub reason: ExitReason,
    pub media: Option<MediaResult>,
    pub mic_denied: bool,
    pub final_state: TimerState,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub talk: TalkInfo,
    pub record: bool,
    pub auto_start: bool,
    pub frame_rate_hz: u32,
    pub finish_hold: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), TalkInfo::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config, talk: TalkInfo) -> Self {
        Self {
            talk,
            record: config.capture.enabled,
            auto_start: config.session.auto_start,
            frame_rate_hz: config.timer.frame_rate_hz,
            finish_hold: config.session.finish_hold(),
        }
    }
}
