use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timer: TimerConfig,
    pub capture: CaptureConfig,
    pub audio: AudioConfig,
    pub overlay: OverlayConfig,
    pub session: SessionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Redraw cadence of the tick loop.
    pub frame_rate_hz: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
    /// Frames per second fed to the encoder between explicit pushes.
    pub nominal_fps: u32,
    /// How often encoded output is handed back as a chunk.
    pub chunk_interval_secs: u64,
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub font_regular: PathBuf,
    pub font_semibold: PathBuf,
    pub font_bold: PathBuf,
    pub font_mono: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Start the clock as soon as the talk opens instead of waiting for a key press.
    pub auto_start: bool,
    /// How long the final frame stays up after a natural finish.
    pub finish_hold_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub recordings_dir: Option<PathBuf>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { frame_rate_hz: 60 }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: 1280,
            max_height: 720,
            nominal_fps: 2,
            chunk_interval_secs: 10,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 48_000,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let dejavu = PathBuf::from("/usr/share/fonts/truetype/dejavu");
        Self {
            font_regular: dejavu.join("DejaVuSans.ttf"),
            font_semibold: dejavu.join("DejaVuSans-Bold.ttf"),
            font_bold: dejavu.join("DejaVuSans-Bold.ttf"),
            font_mono: dejavu.join("DejaVuSansMono-Bold.ttf"),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            finish_hold_ms: 1_500,
        }
    }
}

impl SessionConfig {
    pub fn finish_hold(&self) -> Duration {
        Duration::from_millis(self.finish_hold_ms)
    }
}

impl CaptureConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_secs(self.chunk_interval_secs.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config = Self::parse(&content)?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        global::ensure_parent_dir(&config_path)?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }

    pub fn recordings_dir(&self) -> Result<PathBuf> {
        match &self.output.recordings_dir {
            Some(dir) => Ok(dir.clone()),
            None => global::recordings_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timer.frame_rate_hz, 60);
        assert_eq!(config.capture.max_width, 1280);
        assert_eq!(config.capture.max_height, 720);
        assert_eq!(config.capture.chunk_interval(), Duration::from_secs(10));
        assert!(config.session.auto_start);
        assert_eq!(config.session.finish_hold(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [capture]
            enabled = false
            max_width = 640

            [session]
            finish_hold_ms = 0
            "#,
        )
        .unwrap();
        assert!(!config.capture.enabled);
        assert_eq!(config.capture.max_width, 640);
        assert_eq!(config.capture.max_height, 720);
        assert_eq!(config.capture.ffmpeg_path, "ffmpeg");
        assert_eq!(config.session.finish_hold_ms, 0);
        assert!(config.session.auto_start);
        assert!(config.audio.enabled);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.output.recordings_dir = Some(PathBuf::from("/tmp/talks"));
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.recordings_dir().unwrap(), PathBuf::from("/tmp/talks"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[capture\nenabled = ").is_err());
    }

    #[test]
    fn test_zero_chunk_interval_is_raised() {
        let config = Config::parse("[capture]\nchunk_interval_secs = 0").unwrap();
        assert_eq!(config.capture.chunk_interval(), Duration::from_secs(1));
    }
}
