pub mod audio_source;
pub mod mic_source;

pub use audio_source::AudioSource;
pub use mic_source::MicAudioSource;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("no audio input device available")]
    NoDevice,
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    #[error("audio stream failed: {0}")]
    Stream(String),
}

impl AudioError {
    /// Map a backend error message onto a typed error.
    pub fn classify(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
        {
            Self::PermissionDenied(message)
        } else {
            Self::Stream(message)
        }
    }
}

/// Acquires a live, already started, audio source.
pub trait MicrophoneAccess {
    fn acquire(&self) -> Result<Box<dyn AudioSource>, AudioError>;
}

/// Default input device through cpal.
pub struct CpalMicrophone {
    sample_rate: u32,
}

impl CpalMicrophone {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl MicrophoneAccess for CpalMicrophone {
    fn acquire(&self) -> Result<Box<dyn AudioSource>, AudioError> {
        let mut source = MicAudioSource::new(self.sample_rate)?;
        source.start().map_err(|e| match e.downcast::<AudioError>() {
            Ok(audio) => audio,
            Err(other) => AudioError::classify(other.to_string()),
        })?;
        info!("Microphone acquired at {}Hz", self.sample_rate);
        Ok(Box::new(source))
    }
}

/// Microphone access that is always refused, for talks recorded without audio.
pub struct NoMicrophone;

impl MicrophoneAccess for NoMicrophone {
    fn acquire(&self) -> Result<Box<dyn AudioSource>, AudioError> {
        Err(AudioError::PermissionDenied("audio disabled in config".to_string()))
    }
}
