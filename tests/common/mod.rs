//! Fakes shared by the session integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use ignite_talk::audio::{AudioError, AudioSource, MicrophoneAccess};
use ignite_talk::capture::{
    CaptureDevice, CaptureEngine, CaptureError, CaptureSettings, DeviceEvent, DeviceSpec,
    FinishInput, MediaFinisher, MediaFormat,
};
use ignite_talk::overlay::{FontSet, TalkInfo};
use ignite_talk::session::{SessionCoordinator, SessionOptions, SessionStatusHandle};
use ignite_talk::slides::{Deck, Slide};
use ignite_talk::timer::TOTAL_SLIDES;

#[derive(Default)]
pub struct DeviceLog {
    pub starts: usize,
    pub frames: usize,
    pub pauses: usize,
    pub resumes: usize,
    pub stops: usize,
    pub releases: usize,
    pub spec: Option<DeviceSpec>,
    pub events: Option<mpsc::UnboundedSender<DeviceEvent>>,
}

pub type SharedLog = Arc<Mutex<DeviceLog>>;

/// Records every call; hands back one chunk per pushed frame plus a trailer on stop.
pub struct FakeDevice {
    supported: Vec<&'static str>,
    log: SharedLog,
}

impl FakeDevice {
    pub fn new(supported: Vec<&'static str>, log: SharedLog) -> Self {
        Self { supported, log }
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    fn supports(&self, format: &MediaFormat) -> bool {
        self.supported.contains(&format.video_codec)
    }

    async fn start(
        &mut self,
        spec: &DeviceSpec,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Result<(), CaptureError> {
        let mut log = self.log.lock().unwrap();
        log.starts += 1;
        log.spec = Some(*spec);
        log.events = Some(events);
        Ok(())
    }

    fn request_frame(&mut self, _frame: &RgbaImage) -> Result<(), CaptureError> {
        let mut log = self.log.lock().unwrap();
        log.frames += 1;
        if let Some(events) = &log.events {
            let _ = events.send(DeviceEvent::Chunk(vec![0u8; 4]));
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        self.log.lock().unwrap().pauses += 1;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.log.lock().unwrap().resumes += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        if let Some(events) = log.events.take() {
            let _ = events.send(DeviceEvent::Chunk(b"trailer".to_vec()));
        }
        Ok(())
    }

    fn release(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.releases += 1;
        log.events = None;
    }
}

pub struct FakeAudio {
    active: bool,
    paused: bool,
    samples: Vec<f32>,
}

impl FakeAudio {
    pub fn started() -> Self {
        Self {
            active: true,
            paused: false,
            samples: vec![0.25; 4_800],
        }
    }
}

impl AudioSource for FakeAudio {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<f32>> {
        self.active = false;
        Ok(std::mem::take(&mut self.samples))
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

pub struct GrantedMic;

impl MicrophoneAccess for GrantedMic {
    fn acquire(&self) -> Result<Box<dyn AudioSource>, AudioError> {
        Ok(Box::new(FakeAudio::started()))
    }
}

pub struct DeniedMic;

impl MicrophoneAccess for DeniedMic {
    fn acquire(&self) -> Result<Box<dyn AudioSource>, AudioError> {
        Err(AudioError::PermissionDenied("user refused".to_string()))
    }
}

/// Prefixes the video so tests can tell the finalize pass ran.
#[derive(Clone, Default)]
pub struct CountingFinisher {
    pub calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl MediaFinisher for CountingFinisher {
    async fn finish(&self, input: FinishInput<'_>) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap() += 1;
        let mut out = b"finished:".to_vec();
        out.extend_from_slice(input.video);
        Ok(out)
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A 20-slide deck; slides listed in `broken` hold bytes that fail to decode.
pub fn deck(broken: &[usize]) -> Deck {
    let good: Arc<[u8]> = png(32, 18).into();
    let slides = (0..TOTAL_SLIDES)
        .map(|index| {
            let page = index as u32 + 1;
            if broken.contains(&index) {
                Slide::from_encoded(page, vec![0xde, 0xad, 0xbe, 0xef], 32, 18)
            } else {
                Slide::from_encoded(page, Arc::clone(&good), 32, 18)
            }
        })
        .collect();
    Deck::new(slides).unwrap()
}

pub fn options() -> SessionOptions {
    SessionOptions {
        talk: TalkInfo {
            event_title: "Ignite Night".to_string(),
            story_name: "Twenty Slides".to_string(),
            speaker_name: "Sam".to_string(),
        },
        record: true,
        auto_start: true,
        frame_rate_hz: 10,
        finish_hold: Duration::from_millis(1_500),
    }
}

pub struct Harness {
    pub session: SessionCoordinator,
    pub log: SharedLog,
    pub finisher: CountingFinisher,
    pub status: SessionStatusHandle,
}

pub fn harness(
    supported: Vec<&'static str>,
    microphone: Box<dyn MicrophoneAccess>,
    deck: Deck,
) -> Harness {
    let log = SharedLog::default();
    let finisher = CountingFinisher::default();
    let capture = CaptureEngine::new(
        Box::new(FakeDevice::new(supported, Arc::clone(&log))),
        microphone,
        Box::new(finisher.clone()),
        FontSet::empty(),
        CaptureSettings {
            max_width: 32,
            max_height: 18,
            nominal_fps: 1,
            chunk_interval: Duration::from_secs(10),
        },
    );
    let status = SessionStatusHandle::default();
    let session = SessionCoordinator::new(deck, capture, options(), status.clone());
    Harness {
        session,
        log,
        finisher,
        status,
    }
}
