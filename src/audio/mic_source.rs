//! Microphone audio capture via cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

use super::audio_source::AudioSource;
use super::AudioError;

pub struct MicAudioSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    paused: Arc<AtomicBool>,
    stream: Option<cpal::Stream>,
    active: bool,
    target_sample_rate: u32,
}

impl MicAudioSource {
    /// Create a new mic source using the default input device.
    ///
    /// # Arguments
    /// * `sample_rate` - Target sample rate (e.g., 48000)
    pub fn new(sample_rate: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice)?;

        info!(
            "Talk mic source using device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            config,
            samples: Arc::new(Mutex::new(Vec::new())),
            paused: Arc::new(AtomicBool::new(false)),
            stream: None,
            active: false,
            target_sample_rate: sample_rate,
        })
    }
}

impl AudioSource for MicAudioSource {
    fn start(&mut self) -> anyhow::Result<()> {
        if self.active {
            return Err(anyhow::anyhow!("Mic source already recording"));
        }

        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.paused.store(false, Ordering::SeqCst);

        let samples_clone = self.samples.clone();
        let paused = self.paused.clone();
        let err_fn = |err| error!("Talk mic stream error: {}", err);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    if let Ok(mut samples) = samples_clone.lock() {
                        samples.extend_from_slice(data);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::classify(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::classify(e.to_string()))?;
        self.stream = Some(stream);
        self.active = true;

        info!("Talk mic recording started");
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<Vec<f32>> {
        if !self.active {
            return Err(anyhow::anyhow!("Mic source not recording"));
        }

        if let Some(stream) = self.stream.take() {
            debug!("Stopping talk mic stream");
            drop(stream);
        }

        self.active = false;

        let samples = std::mem::take(
            &mut *self.samples.lock().unwrap_or_else(PoisonError::into_inner),
        );

        info!("Talk mic stopped, {} samples captured", samples.len());
        Ok(samples)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }
}

impl Drop for MicAudioSource {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active MicAudioSource, cleaning up");
            let _ = self.stop();
        }
    }
}
