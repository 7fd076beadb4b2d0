use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::audio::AudioSource;
use crate::capture::{CaptureEngine, MediaResult};
use crate::overlay::OverlayInfo;
use crate::slides::Deck;
use crate::timer::{TimerEngine, TimerEvent, TimerState};

use super::status::{SessionPhase, SessionStatusHandle};
use super::{ControlInput, ExitReason, SessionOptions, SessionOutcome};

/// Drives one talk: owns the timer and the capture engine.
///
/// All dependencies are injected; nothing here knows about ffmpeg, cpal or
/// the terminal.
pub struct SessionCoordinator {
    deck: Deck,
    options: SessionOptions,
    timer: TimerEngine,
    timer_events: mpsc::UnboundedReceiver<TimerEvent>,
    capture: CaptureEngine,
    pre_acquired_audio: Option<Box<dyn AudioSource>>,
    status: SessionStatusHandle,
    snapshots: watch::Sender<TimerState>,
    phase: SessionPhase,
    last_state: Option<TimerState>,
    recording: bool,
    finalized: bool,
}

impl SessionCoordinator {
    pub fn new(
        deck: Deck,
        capture: CaptureEngine,
        options: SessionOptions,
        status: SessionStatusHandle,
    ) -> Self {
        let (events_tx, timer_events) = mpsc::unbounded_channel();
        let timer = TimerEngine::new(options.frame_rate_hz, events_tx);
        let (snapshots, _) = watch::channel(TimerState::default());

        Self {
            deck,
            options,
            timer,
            timer_events,
            capture,
            pre_acquired_audio: None,
            status,
            snapshots,
            phase: SessionPhase::Idle,
            last_state: None,
            recording: false,
            finalized: false,
        }
    }

    /// Use an audio source the caller already opened instead of acquiring the microphone.
    pub fn with_audio(mut self, audio: Box<dyn AudioSource>) -> Self {
        self.pre_acquired_audio = Some(audio);
        self
    }

    /// Timer snapshots for a UI, latest value only.
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.snapshots.subscribe()
    }

    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run the talk until it finishes or is cancelled. Capture is always
    /// finalized before this returns.
    pub async fn run(&mut self, mut controls: mpsc::Receiver<ControlInput>) -> Result<SessionOutcome> {
        info!(
            "Starting talk {:?} by {:?} (record: {}, auto_start: {})",
            self.options.talk.story_name,
            self.options.talk.speaker_name,
            self.options.record,
            self.options.auto_start
        );

        self.status.reset().await;
        if self.options.auto_start {
            self.enter_presenting().await;
        } else {
            self.timer.start(false);
            self.set_phase(SessionPhase::Waiting).await;
            info!("Waiting for the speaker to start");
        }

        loop {
            tokio::select! {
                event = self.timer_events.recv() => match event {
                    Some(TimerEvent::Tick(state)) => self.on_tick(state).await,
                    Some(TimerEvent::Finished) => return Ok(self.finish(&mut controls).await),
                    None => return Ok(self.exit(ExitReason::Stopped).await),
                },
                control = controls.recv() => {
                    let Some(control) = control else {
                        debug!("Control channel closed, stopping talk");
                        return Ok(self.exit(ExitReason::Stopped).await);
                    };
                    if let Some(reason) = self.on_control(control).await {
                        return Ok(self.exit(reason).await);
                    }
                }
            }
        }
    }

    /// Tear down the timer, then stop capture. Only the first call does anything.
    pub async fn finalize(&mut self) -> Option<MediaResult> {
        if self.finalized {
            debug!("Session already finalized");
            return None;
        }
        self.finalized = true;

        self.timer.teardown();
        let media = self.capture.stop_recording().await;
        if self.recording {
            self.recording = false;
            self.status.stop_recording().await;
        }

        match &media {
            Some(media) => info!(
                "Recording finalized: {} bytes of {} ({:.1}s)",
                media.bytes.len(),
                media.format.mime_type,
                media.duration.as_secs_f64()
            ),
            None => debug!("No recording produced"),
        }
        media
    }

    /// Start capture, then the clock, so the recording opens on the first
    /// moment of the talk.
    async fn enter_presenting(&mut self) {
        let was_waiting = self.phase == SessionPhase::Waiting;
        self.set_phase(SessionPhase::Presenting).await;

        if self.options.record {
            let audio = self.pre_acquired_audio.take();
            match self.capture.start_recording(self.deck.slides(), audio).await {
                Ok(true) => {
                    self.recording = true;
                    self.status.start_recording(self.capture.mic_denied()).await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to start recording, presenting without it: {:#}", e);
                    self.status.set_error(format!("recording failed to start: {e}")).await;
                }
            }
            self.status.set_mic_denied(self.capture.mic_denied()).await;
        }

        if was_waiting {
            self.timer.resume();
        } else {
            self.timer.start(true);
        }
        let state = self.timer.state();
        if self.recording {
            self.draw_slide(&state);
        }
        self.last_state = Some(state);
    }

    async fn on_tick(&mut self, state: TimerState) {
        self.snapshots.send_replace(state);
        self.status.set_timer_state(state).await;

        let previous = self.last_state.replace(state);
        if self.phase != SessionPhase::Presenting || !self.capture.is_active() {
            return;
        }

        let pause_changed = previous.is_some_and(|p| p.is_paused != state.is_paused);
        if pause_changed && !state.is_paused {
            self.capture.set_paused(false);
        }

        match previous {
            Some(p) if p.current_slide == state.current_slide => {
                if p.slide_seconds_left() != state.slide_seconds_left() {
                    let overlay = OverlayInfo::new(&self.options.talk, &state);
                    self.capture.update_overlay(&overlay);
                }
            }
            _ => self.draw_slide(&state),
        }

        if pause_changed && state.is_paused {
            self.capture.set_paused(true);
        }

        if !self.capture.is_active() {
            error!("Capture stopped unexpectedly; the talk continues unrecorded");
            self.recording = false;
            self.status.stop_recording().await;
            self.status.set_error("capture device failed".to_string()).await;
        }
    }

    fn draw_slide(&mut self, state: &TimerState) {
        let Some(slide) = self.deck.get(state.current_slide) else {
            return;
        };
        let overlay = OverlayInfo::new(&self.options.talk, state);
        self.capture.draw_slide(slide, Some(&overlay));
    }

    async fn on_control(&mut self, control: ControlInput) -> Option<ExitReason> {
        debug!("Control input: {:?}", control);
        match control {
            ControlInput::Cancel => return Some(ExitReason::Cancelled),
            ControlInput::Stop => return Some(ExitReason::Stopped),
            ControlInput::Start | ControlInput::TogglePause | ControlInput::Resume
                if self.phase == SessionPhase::Waiting =>
            {
                self.enter_presenting().await;
            }
            ControlInput::Start => {}
            ControlInput::TogglePause => self.timer.toggle_pause(),
            ControlInput::Pause => self.timer.pause(),
            ControlInput::Resume => self.timer.resume(),
            ControlInput::NextSlide => self.timer.next_slide(),
            ControlInput::PrevSlide => self.timer.prev_slide(),
            ControlInput::GoToSlide(index) => self.timer.go_to_slide(index),
            ControlInput::Reset => self.timer.reset(),
        }
        None
    }

    async fn finish(&mut self, controls: &mut mpsc::Receiver<ControlInput>) -> SessionOutcome {
        info!("Talk finished");
        let final_state = self.timer.state();
        let media = self.finalize().await;
        self.set_phase(SessionPhase::Finished).await;

        let hold = time::sleep(self.options.finish_hold);
        tokio::pin!(hold);
        loop {
            tokio::select! {
                _ = &mut hold => break,
                control = controls.recv() => match control {
                    Some(ControlInput::Cancel) | Some(ControlInput::Stop) | None => {
                        debug!("Finish hold ended early");
                        break;
                    }
                    Some(_) => {}
                },
            }
        }

        self.outcome(ExitReason::Finished, media, final_state)
    }

    async fn exit(&mut self, reason: ExitReason) -> SessionOutcome {
        info!("Talk ended early: {:?}", reason);
        let final_state = self.timer.state();
        let media = self.finalize().await;
        self.set_phase(SessionPhase::Exited).await;
        self.outcome(reason, media, final_state)
    }

    fn outcome(
        &self,
        reason: ExitReason,
        media: Option<MediaResult>,
        final_state: TimerState,
    ) -> SessionOutcome {
        SessionOutcome {
            reason,
            media,
            mic_denied: self.capture.mic_denied(),
            final_state,
        }
    }

    async fn set_phase(&mut self, phase: SessionPhase) {
        debug!("Session phase: {}", phase.as_str());
        self.phase = phase;
        self.status.set_phase(phase).await;
    }
}
