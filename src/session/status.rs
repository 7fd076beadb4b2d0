//! Session status types and shared state handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::timer::TimerState;

/// Phase of a talk session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Waiting,
    Presenting,
    Finished,
    Exited,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Presenting => "presenting",
            Self::Finished => "finished",
            Self::Exited => "exited",
        }
    }
}

/// Current session state, readable from outside the coordinator.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub timer: TimerState,
    pub recording: bool,
    pub mic_denied: bool,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            timer: TimerState::default(),
            recording: false,
            mic_denied: false,
            started_at: None,
            last_error: None,
        }
    }
}

impl SessionStatus {
    /// Wall-clock seconds since the talk started presenting.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = chrono::Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Thread-safe handle for sharing session state between the coordinator and a UI.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionStatus>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionStatus {
        self.inner.lock().await.clone()
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.inner.lock().await;
        if phase == SessionPhase::Presenting && state.started_at.is_none() {
            state.started_at = Some(chrono::Utc::now());
        }
        state.phase = phase;
    }

    pub async fn set_timer_state(&self, timer: TimerState) {
        self.inner.lock().await.timer = timer;
    }

    pub async fn start_recording(&self, mic_denied: bool) {
        let mut state = self.inner.lock().await;
        state.recording = true;
        state.mic_denied = mic_denied;
    }

    pub async fn stop_recording(&self) {
        self.inner.lock().await.recording = false;
    }

    pub async fn set_mic_denied(&self, mic_denied: bool) {
        self.inner.lock().await.mic_denied = mic_denied;
    }

    /// Record an error without changing the phase; the talk keeps going.
    pub async fn set_error(&self, error: String) {
        self.inner.lock().await.last_error = Some(error);
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = SessionStatus::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Waiting.as_str(), "waiting");
        assert_eq!(SessionPhase::Presenting.as_str(), "presenting");
        assert_eq!(SessionPhase::Finished.as_str(), "finished");
        assert_eq!(SessionPhase::Exited.as_str(), "exited");
    }

    #[test]
    fn test_session_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Presenting).unwrap();
        assert_eq!(json, "\"presenting\"");

        let parsed: SessionPhase = serde_json::from_str("\"exited\"").unwrap();
        assert_eq!(parsed, SessionPhase::Exited);
    }

    #[test]
    fn test_session_status_default() {
        let status = SessionStatus::default();
        assert_eq!(status.phase, SessionPhase::Idle);
        assert_eq!(status.timer, TimerState::default());
        assert!(!status.recording);
        assert!(!status.mic_denied);
        assert!(status.started_at.is_none());
        assert!(status.duration_seconds().is_none());
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_presenting_stamps_start_once() {
        let handle = SessionStatusHandle::default();
        handle.set_phase(SessionPhase::Presenting).await;
        let first = handle.get().await.started_at;
        assert!(first.is_some());

        handle.set_phase(SessionPhase::Finished).await;
        handle.set_phase(SessionPhase::Presenting).await;
        assert_eq!(handle.get().await.started_at, first);
    }

    #[tokio::test]
    async fn test_status_handle_recording_flags() {
        let handle = SessionStatusHandle::default();
        handle.start_recording(true).await;

        let status = handle.get().await;
        assert!(status.recording);
        assert!(status.mic_denied);

        handle.stop_recording().await;
        assert!(!handle.get().await.recording);
    }

    #[tokio::test]
    async fn test_status_handle_error_keeps_phase() {
        let handle = SessionStatusHandle::default();
        handle.set_phase(SessionPhase::Presenting).await;
        handle.set_error("capture device failed".to_string()).await;

        let status = handle.get().await;
        assert_eq!(status.phase, SessionPhase::Presenting);
        assert_eq!(status.last_error.as_deref(), Some("capture device failed"));
    }

    #[tokio::test]
    async fn test_status_handle_reset() {
        let handle = SessionStatusHandle::default();
        handle.set_phase(SessionPhase::Presenting).await;
        handle.set_timer_state(TimerState::from_elapsed(30_000, false)).await;
        handle.reset().await;

        let status = handle.get().await;
        assert_eq!(status.phase, SessionPhase::Idle);
        assert_eq!(status.timer.current_slide, 0);
    }
}
