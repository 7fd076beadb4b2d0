//! Post-capture pass: mux the audio track in and write a proper duration.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::MediaFormat;

/// Captured audio, mono `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub struct FinishInput<'a> {
    pub video: &'a [u8],
    pub format: MediaFormat,
    pub audio: Option<&'a AudioTrack>,
    /// Wall-clock recording time with pauses removed.
    pub duration: Duration,
}

#[async_trait]
pub trait MediaFinisher: Send + Sync {
    async fn finish(&self, input: FinishInput<'_>) -> Result<Vec<u8>>;
}

/// Remuxes through ffmpeg into a seekable file.
pub struct FfmpegFinisher {
    ffmpeg_path: String,
}

impl FfmpegFinisher {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl MediaFinisher for FfmpegFinisher {
    async fn finish(&self, input: FinishInput<'_>) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir().context("Failed to create temp dir for finalize")?;
        let extension = input.format.extension();
        let video_path = workdir.path().join(format!("capture.{extension}"));
        let output_path = workdir.path().join(format!("talk.{extension}"));

        tokio::fs::write(&video_path, input.video)
            .await
            .context("Failed to write captured video")?;

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i")
            .arg(&video_path);

        if let Some(audio) = input.audio {
            let wav_path = workdir.path().join("audio.wav");
            write_wav(&wav_path, &audio.samples, audio.sample_rate)?;
            command
                .arg("-i")
                .arg(&wav_path)
                .args(["-map", "0:v:0", "-map", "1:a:0", "-c:a", input.format.audio_codec]);
        }

        command
            .args(["-c:v", "copy"])
            .args(["-t", &format!("{:.3}", input.duration.as_secs_f64())]);
        if input.format.container.muxer() == "mp4" {
            command.args(["-movflags", "+faststart"]);
        }
        command
            .args(["-f", input.format.container.muxer()])
            .arg(&output_path);

        let output = command
            .output()
            .await
            .context("Failed to run ffmpeg finalize pass")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg finalize pass failed: {}", stderr.trim());
        }

        let bytes = tokio::fs::read(&output_path)
            .await
            .context("ffmpeg did not produce a finalized file")?;
        if bytes.is_empty() {
            bail!("ffmpeg produced an empty finalized file");
        }

        info!(
            "Finalized recording: {} bytes, {:.1}s{}",
            bytes.len(),
            input.duration.as_secs_f64(),
            if input.audio.is_some() { " with audio" } else { "" }
        );
        Ok(bytes)
    }
}

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    debug!("Talk audio written: {:?} ({} samples)", path, samples.len());
    Ok(())
}
