//! Synchronized capture of the presented slides.
//!
//! `CaptureEngine` owns at most one `CaptureSession`: the compositing
//! surface, the device and audio tracks, and the encoded chunks. It never
//! looks at the timer; the session coordinator drives it with explicit calls.

mod device;
mod ffmpeg;
mod finisher;
mod format;
mod surface;

pub use device::{CaptureDevice, CaptureError, DeviceEvent, DeviceSpec};
pub use ffmpeg::{parse_listing, FfmpegCapabilities, FfmpegDevice};
pub use finisher::{write_wav, AudioTrack, FfmpegFinisher, FinishInput, MediaFinisher};
pub use format::{Container, MediaFormat, PREFERRED_FORMATS};
pub use surface::fit_within;

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioSource, MicrophoneAccess};
use crate::config::CaptureConfig;
use crate::overlay::{render_overlay, FontSet, OverlayInfo, RasterSurface};
use crate::slides::Slide;

/// Finished recording handed back on finalize.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResult {
    pub bytes: Vec<u8>,
    pub format: MediaFormat,
    pub duration: Duration,
    pub has_audio: bool,
    pub duration_corrected: bool,
}

impl MediaResult {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub nominal_fps: u32,
    pub chunk_interval: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            max_width: config.max_width,
            max_height: config.max_height,
            nominal_fps: config.nominal_fps,
            chunk_interval: config.chunk_interval(),
        }
    }
}

struct CaptureSession {
    format: MediaFormat,
    frame: RgbaImage,
    last_image: Option<RgbaImage>,
    audio: Option<Box<dyn AudioSource>>,
    chunks: Vec<Vec<u8>>,
    events: mpsc::UnboundedReceiver<DeviceEvent>,
    started_at: Instant,
    paused_since: Option<Instant>,
    paused_total: Duration,
}

impl CaptureSession {
    fn recorded_duration(&self, now: Instant) -> Duration {
        let paused_now = self
            .paused_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        now.saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total + paused_now)
    }
}

pub struct CaptureEngine {
    device: Box<dyn CaptureDevice>,
    microphone: Box<dyn MicrophoneAccess>,
    finisher: Box<dyn MediaFinisher>,
    fonts: FontSet,
    settings: CaptureSettings,
    session: Option<CaptureSession>,
    mic_denied: bool,
}

impl CaptureEngine {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        microphone: Box<dyn MicrophoneAccess>,
        finisher: Box<dyn MediaFinisher>,
        fonts: FontSet,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            device,
            microphone,
            finisher,
            fonts,
            settings,
            session: None,
            mic_denied: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn mic_denied(&self) -> bool {
        self.mic_denied
    }

    pub fn format(&self) -> Option<MediaFormat> {
        self.session.as_ref().map(|session| session.format)
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.session.as_ref().map(|session| session.frame.dimensions())
    }

    /// First preferred format the device can produce.
    pub fn select_format(&self) -> Option<MediaFormat> {
        MediaFormat::select(|format| self.device.supports(format))
    }

    /// Start a capture session. Returns `Ok(false)` when nothing could be
    /// captured (no supported format, empty deck): the talk goes on unrecorded.
    pub async fn start_recording(
        &mut self,
        slides: &[Slide],
        pre_acquired_audio: Option<Box<dyn AudioSource>>,
    ) -> Result<bool> {
        if self.session.is_some() {
            warn!("Capture already running, ignoring start request");
            return Ok(true);
        }

        let Some(format) = self.select_format() else {
            info!("No supported capture format; presenting without recording");
            return Ok(false);
        };
        let Some(first) = slides.first() else {
            warn!("No slides to capture");
            return Ok(false);
        };

        let (width, height) = fit_within(
            first.width,
            first.height,
            self.settings.max_width,
            self.settings.max_height,
        );

        self.mic_denied = false;
        let audio = self.acquire_audio(pre_acquired_audio);

        let spec = DeviceSpec {
            format,
            width,
            height,
            nominal_fps: self.settings.nominal_fps,
            chunk_interval: self.settings.chunk_interval,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if let Err(e) = self.device.start(&spec, events_tx).await {
            if let Some(mut audio) = audio {
                let _ = audio.stop();
            }
            return Err(e.into());
        }

        info!(
            "Recording {}x{} as {} ({})",
            width,
            height,
            format.mime_type,
            if audio.is_some() { "with audio" } else { "video only" }
        );

        self.session = Some(CaptureSession {
            format,
            frame: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            last_image: None,
            audio,
            chunks: Vec::new(),
            events: events_rx,
            started_at: Instant::now(),
            paused_since: None,
            paused_total: Duration::ZERO,
        });
        Ok(true)
    }

    fn acquire_audio(
        &mut self,
        pre_acquired: Option<Box<dyn AudioSource>>,
    ) -> Option<Box<dyn AudioSource>> {
        match pre_acquired {
            Some(mut audio) => {
                if audio.is_active() {
                    return Some(audio);
                }
                match audio.start() {
                    Ok(()) => Some(audio),
                    Err(e) => {
                        warn!("Pre-acquired audio failed to start ({}); recording video only", e);
                        self.mic_denied = true;
                        None
                    }
                }
            }
            None => match self.microphone.acquire() {
                Ok(audio) => Some(audio),
                Err(e) => {
                    warn!("Microphone unavailable ({}); recording video only", e);
                    self.mic_denied = true;
                    None
                }
            },
        }
    }

    /// Draw `slide` scaled to the surface, composite the overlay and push a
    /// frame. Returns whether a frame was pushed.
    pub fn draw_slide(&mut self, slide: &Slide, overlay: Option<&OverlayInfo>) -> bool {
        self.pump_events();
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let decoded = match slide.decode() {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    "Skipping redraw: slide {} failed to decode: {}",
                    slide.page_number, e
                );
                return false;
            }
        };
        let (width, height) = session.frame.dimensions();
        session.last_image = Some(imageops::resize(
            &decoded.to_rgba8(),
            width,
            height,
            FilterType::Triangle,
        ));
        debug!("Drew slide {}", slide.page_number);
        self.compose_and_push(overlay)
    }

    /// Redraw the cached slide with a fresh overlay.
    pub fn update_overlay(&mut self, overlay: &OverlayInfo) -> bool {
        self.pump_events();
        let has_image = self
            .session
            .as_ref()
            .is_some_and(|session| session.last_image.is_some());
        has_image && self.compose_and_push(Some(overlay))
    }

    fn compose_and_push(&mut self, overlay: Option<&OverlayInfo>) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(last_image) = session.last_image.as_ref() else {
            return false;
        };

        session.frame.clone_from(last_image);
        if let Some(info) = overlay {
            let (width, height) = session.frame.dimensions();
            let mut surface = RasterSurface::new(&mut session.frame, &self.fonts);
            render_overlay(&mut surface, width, height, info);
        }

        match self.device.request_frame(&session.frame) {
            Ok(()) => true,
            Err(e) => {
                error!("Capture device rejected frame: {}", e);
                self.teardown("frame push failed");
                false
            }
        }
    }

    /// Mirror the presentation's pause state. Redundant calls do nothing.
    pub fn set_paused(&mut self, paused: bool) {
        self.pump_events();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.paused_since.is_some() == paused {
            return;
        }

        let now = Instant::now();
        if paused {
            session.paused_since = Some(now);
        } else if let Some(since) = session.paused_since.take() {
            session.paused_total += now.saturating_duration_since(since);
        }
        if let Some(audio) = session.audio.as_mut() {
            audio.set_paused(paused);
        }

        let result = if paused {
            self.device.pause()
        } else {
            self.device.resume()
        };
        match result {
            Ok(()) => debug!("Capture {}", if paused { "paused" } else { "resumed" }),
            Err(e) => {
                error!("Capture device failed to {}: {}", if paused { "pause" } else { "resume" }, e);
                self.teardown("pause mirroring failed");
            }
        }
    }

    /// Finalize the session. `None` when nothing was recording or nothing usable came out.
    pub async fn stop_recording(&mut self) -> Option<MediaResult> {
        self.pump_events();
        let mut session = self.session.take()?;

        let stop_result = self.device.stop().await;
        while let Ok(event) = session.events.try_recv() {
            match event {
                DeviceEvent::Chunk(bytes) => session.chunks.push(bytes),
                DeviceEvent::Error(message) => warn!("Capture device error during stop: {}", message),
            }
        }

        let audio = session.audio.take().and_then(|mut source| {
            let sample_rate = source.sample_rate();
            match source.stop() {
                Ok(samples) if !samples.is_empty() => Some(AudioTrack {
                    samples,
                    sample_rate,
                }),
                Ok(_) => None,
                Err(e) => {
                    warn!("Failed to stop audio track: {}", e);
                    None
                }
            }
        });

        if let Err(e) = stop_result {
            warn!("Capture device failed to stop cleanly, keeping what was encoded: {}", e);
            self.device.release();
        }

        let video = session.chunks.concat();
        if video.is_empty() {
            warn!("Capture produced no output");
            return None;
        }

        let duration = session.recorded_duration(Instant::now());
        let format = session.format;
        let mut result = MediaResult {
            bytes: Vec::new(),
            format,
            duration,
            has_audio: false,
            duration_corrected: false,
        };

        if format.needs_duration_fix() || audio.is_some() {
            let input = FinishInput {
                video: &video,
                format,
                audio: audio.as_ref(),
                duration,
            };
            match self.finisher.finish(input).await {
                Ok(bytes) => {
                    result.bytes = bytes;
                    result.has_audio = audio.is_some();
                    result.duration_corrected = true;
                    return Some(result);
                }
                Err(e) => warn!("Finalize pass failed, keeping uncorrected recording: {:#}", e),
            }
        }

        result.bytes = video;
        Some(result)
    }

    fn pump_events(&mut self) {
        let mut failure = None;
        if let Some(session) = self.session.as_mut() {
            while let Ok(event) = session.events.try_recv() {
                match event {
                    DeviceEvent::Chunk(bytes) => {
                        debug!("Received capture chunk of {} bytes", bytes.len());
                        session.chunks.push(bytes);
                    }
                    DeviceEvent::Error(message) => {
                        failure = Some(message);
                        break;
                    }
                }
            }
        }
        if let Some(message) = failure {
            error!("Capture device error: {}", message);
            self.teardown("device error");
        }
    }

    /// Forced teardown after a fatal device error. The talk continues unrecorded.
    fn teardown(&mut self, reason: &str) {
        if let Some(mut session) = self.session.take() {
            warn!("Tearing down capture session: {}", reason);
            self.device.release();
            if let Some(mut audio) = session.audio.take() {
                let _ = audio.stop();
            }
        }
    }
}
