//! ffmpeg-backed capture device.
//!
//! Raw RGBA frames are piped into an ffmpeg child at a fixed nominal rate.
//! ffmpeg stamps raw input by frame count, so the feeder writes exactly as
//! many frames as active (unpaused) time allows; a pushed frame replaces the
//! content of the next slot instead of adding one. Encoded output is read
//! from the child's stdout and handed back in coarse chunks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::device::{CaptureDevice, CaptureError, DeviceEvent, DeviceSpec};
use super::MediaFormat;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Encoders and muxers reported by the local ffmpeg build.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCapabilities {
    pub encoders: HashSet<String>,
    pub muxers: HashSet<String>,
}

impl FfmpegCapabilities {
    /// Query `ffmpeg -encoders` and `ffmpeg -muxers`. A missing or broken
    /// ffmpeg yields empty capabilities rather than an error.
    pub async fn probe(ffmpeg_path: &str) -> Self {
        let encoders = match list(ffmpeg_path, "-encoders").await {
            Ok(output) => parse_listing(&output),
            Err(e) => {
                warn!("Could not query ffmpeg encoders: {:#}", e);
                return Self::default();
            }
        };
        let muxers = match list(ffmpeg_path, "-muxers").await {
            Ok(output) => parse_listing(&output),
            Err(e) => {
                warn!("Could not query ffmpeg muxers: {:#}", e);
                return Self::default();
            }
        };
        debug!(
            "ffmpeg reports {} encoders, {} muxers",
            encoders.len(),
            muxers.len()
        );
        Self { encoders, muxers }
    }

    pub fn supports(&self, format: &MediaFormat) -> bool {
        self.encoders.contains(format.video_codec)
            && self.encoders.contains(format.audio_codec)
            && self.muxers.contains(format.container.muxer())
    }
}

async fn list(ffmpeg_path: &str, what: &str) -> Result<String> {
    let output = Command::new(ffmpeg_path)
        .args(["-hide_banner", what])
        .output()
        .await
        .with_context(|| format!("Failed to run {ffmpeg_path} {what}"))?;
    if !output.status.success() {
        anyhow::bail!("{ffmpeg_path} {what} exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Names from an ffmpeg `-encoders`/`-muxers` table (everything after the
/// `--` separator line; second column, comma separated aliases split).
pub fn parse_listing(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("--"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .flat_map(|names| names.split(','))
        .map(str::to_string)
        .collect()
}

struct RunningEncoder {
    child: Child,
    frames: watch::Sender<Option<Arc<RgbaImage>>>,
    paused: watch::Sender<bool>,
    stopping: Arc<AtomicBool>,
    feeder: JoinHandle<()>,
    reader: JoinHandle<()>,
    stderr: JoinHandle<()>,
}

pub struct FfmpegDevice {
    ffmpeg_path: String,
    capabilities: FfmpegCapabilities,
    running: Option<RunningEncoder>,
}

impl FfmpegDevice {
    pub fn new(ffmpeg_path: impl Into<String>, capabilities: FfmpegCapabilities) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            capabilities,
            running: None,
        }
    }

    pub async fn probe(ffmpeg_path: impl Into<String>) -> Self {
        let ffmpeg_path = ffmpeg_path.into();
        let capabilities = FfmpegCapabilities::probe(&ffmpeg_path).await;
        Self::new(ffmpeg_path, capabilities)
    }

    pub fn capabilities(&self) -> &FfmpegCapabilities {
        &self.capabilities
    }

    fn encoder_args(spec: &DeviceSpec) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgba",
            "-video_size",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("{}x{}", spec.width, spec.height));
        args.push("-framerate".to_string());
        args.push(spec.nominal_fps.max(1).to_string());
        args.extend(["-i", "pipe:0", "-an", "-c:v"].map(String::from));
        args.push(spec.format.video_codec.to_string());
        args.extend(spec.format.video_args.iter().map(|s| s.to_string()));
        args.extend(spec.format.stream_args.iter().map(|s| s.to_string()));
        args.push("-f".to_string());
        args.push(spec.format.container.muxer().to_string());
        args.push("pipe:1".to_string());
        args
    }
}

#[async_trait]
impl CaptureDevice for FfmpegDevice {
    fn supports(&self, format: &MediaFormat) -> bool {
        self.capabilities.supports(format)
    }

    async fn start(
        &mut self,
        spec: &DeviceSpec,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Result<(), CaptureError> {
        if self.running.is_some() {
            return Err(CaptureError::Spawn("encoder already running".to_string()));
        }

        let args = Self::encoder_args(spec);
        debug!("Spawning {} {}", self.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Spawn(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::Spawn("encoder stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Spawn("encoder stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::Spawn("encoder stderr unavailable".to_string()))?;

        let (frames_tx, frames_rx) = watch::channel(None);
        let (paused_tx, paused_rx) = watch::channel(false);
        let stopping = Arc::new(AtomicBool::new(false));
        let pacer = FramePacer::new(spec.nominal_fps, Instant::now());

        let feeder = tokio::spawn(feed_frames(
            stdin,
            frames_rx,
            paused_rx,
            pacer,
            Arc::clone(&stopping),
            events.clone(),
        ));
        let reader = tokio::spawn(read_chunks(
            stdout,
            spec.chunk_interval,
            Arc::clone(&stopping),
            events,
        ));
        let stderr = tokio::spawn(log_stderr(stderr));

        info!(
            "Capture started: {}x{} {} ({})",
            spec.width, spec.height, spec.format.mime_type, self.ffmpeg_path
        );

        self.running = Some(RunningEncoder {
            child,
            frames: frames_tx,
            paused: paused_tx,
            stopping,
            feeder,
            reader,
            stderr,
        });
        Ok(())
    }

    fn request_frame(&mut self, frame: &RgbaImage) -> Result<(), CaptureError> {
        let running = self.running.as_ref().ok_or(CaptureError::NotRunning)?;
        running.frames.send_replace(Some(Arc::new(frame.clone())));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        let running = self.running.as_ref().ok_or(CaptureError::NotRunning)?;
        running.paused.send_replace(true);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        let running = self.running.as_ref().ok_or(CaptureError::NotRunning)?;
        running.paused.send_replace(false);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(running) = self.running.take() else {
            return Err(CaptureError::NotRunning);
        };
        let RunningEncoder {
            mut child,
            frames,
            paused,
            stopping,
            feeder,
            reader,
            stderr,
        } = running;

        stopping.store(true, Ordering::SeqCst);
        // Closing the frame channel ends the feeder, which closes ffmpeg's stdin.
        drop(frames);
        drop(paused);

        let _ = feeder.await;
        let _ = reader.await;
        let _ = stderr.await;

        let status = child.wait().await?;
        if !status.success() {
            return Err(CaptureError::Encoder(format!("ffmpeg exited with {status}")));
        }
        info!("Capture stopped");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.stopping.store(true, Ordering::SeqCst);
            running.feeder.abort();
            running.reader.abort();
            running.stderr.abort();
            if let Err(e) = running.child.start_kill() {
                debug!("ffmpeg already gone: {}", e);
            }
            warn!("Capture device released");
        }
    }
}

/// Frame-slot bookkeeping for a constant-rate raw input.
///
/// Slot `n` is shown at `n / fps` seconds of active time, so the number of
/// frames written never runs ahead of the clock.
#[derive(Debug)]
struct FramePacer {
    fps: u64,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    written: u64,
}

impl FramePacer {
    fn new(fps: u32, now: Instant) -> Self {
        Self {
            fps: u64::from(fps.max(1)),
            started: now,
            paused_at: None,
            paused_total: Duration::ZERO,
            written: 0,
        }
    }

    fn set_paused(&mut self, paused: bool, now: Instant) {
        match (paused, self.paused_at) {
            (true, None) => self.paused_at = Some(now),
            (false, Some(since)) => {
                self.paused_total += now.saturating_duration_since(since);
                self.paused_at = None;
            }
            _ => {}
        }
    }

    fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    fn active(&self, now: Instant) -> Duration {
        let end = self.paused_at.unwrap_or(now);
        end.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total)
    }

    /// Frames that should be written now to catch up with active time.
    fn owed(&self, now: Instant) -> u64 {
        if self.is_paused() {
            return 0;
        }
        let due = self.active(now).as_nanos() * u128::from(self.fps) / 1_000_000_000 + 1;
        u64::try_from(due)
            .unwrap_or(u64::MAX)
            .saturating_sub(self.written)
    }

    /// When the next unwritten slot opens.
    fn next_slot(&self) -> Instant {
        let nanos = (u128::from(self.written) * 1_000_000_000).div_ceil(u128::from(self.fps));
        let offset = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        self.started + self.paused_total + offset
    }

    fn wrote(&mut self) {
        self.written += 1;
    }
}

async fn feed_frames(
    mut stdin: ChildStdin,
    mut frames: watch::Receiver<Option<Arc<RgbaImage>>>,
    mut paused: watch::Receiver<bool>,
    mut pacer: FramePacer,
    stopping: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<DeviceEvent>,
) {
    loop {
        let idle = pacer.is_paused() || frames.borrow().is_none();
        let next_slot = pacer.next_slot();

        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_paused = *paused.borrow_and_update();
                pacer.set_paused(now_paused, Instant::now());
            }
            _ = time::sleep_until(next_slot), if !idle => {}
        }

        let frame = frames.borrow_and_update().clone();
        let Some(frame) = frame else {
            continue;
        };
        for _ in 0..pacer.owed(Instant::now()) {
            if let Err(e) = stdin.write_all(frame.as_raw()).await {
                if !stopping.load(Ordering::SeqCst) {
                    error!("Writing frame to ffmpeg failed: {}", e);
                    let _ = events.send(DeviceEvent::Error(format!("frame write failed: {e}")));
                }
                return;
            }
            pacer.wrote();
        }
    }

    if let Err(e) = stdin.shutdown().await {
        debug!("Closing ffmpeg stdin: {}", e);
    }
}

async fn read_chunks(
    mut stdout: ChildStdout,
    chunk_interval: Duration,
    stopping: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<DeviceEvent>,
) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut flush = time::interval_at(time::Instant::now() + chunk_interval, chunk_interval);

    loop {
        tokio::select! {
            read = stdout.read(&mut buffer) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buffer[..n]),
                Err(e) => {
                    error!("Reading ffmpeg output failed: {}", e);
                    let _ = events.send(DeviceEvent::Error(format!("output read failed: {e}")));
                    return;
                }
            },
            _ = flush.tick() => {
                if !pending.is_empty() {
                    debug!("Capture chunk: {} bytes", pending.len());
                    let _ = events.send(DeviceEvent::Chunk(std::mem::take(&mut pending)));
                }
            }
        }
    }

    if !pending.is_empty() {
        let _ = events.send(DeviceEvent::Chunk(pending));
    }
    if !stopping.load(Ordering::SeqCst) {
        error!("ffmpeg closed its output unexpectedly");
        let _ = events.send(DeviceEvent::Error("encoder exited unexpectedly".to_string()));
    }
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!("ffmpeg: {}", line);
    }
}
