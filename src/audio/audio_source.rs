//! Audio source abstraction for the recording's audio track.

use anyhow::Result;

/// Trait for audio capture sources.
///
/// A source captures independently of the video device and hands back all
/// samples (mono `f32`) when stopped. While paused, incoming audio is dropped
/// so the track lines up with the paused video.
pub trait AudioSource {
    /// Start capturing audio.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and return all captured samples.
    fn stop(&mut self) -> Result<Vec<f32>>;

    /// Whether this source is currently capturing.
    fn is_active(&self) -> bool;

    /// The sample rate of captured audio.
    fn sample_rate(&self) -> u32;

    /// Drop incoming audio while `paused` is true.
    fn set_paused(&mut self, paused: bool);
}
