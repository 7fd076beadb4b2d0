//! Capture device abstraction.
//!
//! The device owns encode timing. The engine only pushes frames when
//! something visible changed and receives encoded output as coarse chunks.

use async_trait::async_trait;
use image::RgbaImage;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use super::MediaFormat;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to start capture device: {0}")]
    Spawn(String),
    #[error("capture device is not running")]
    NotRunning,
    #[error("encoder failed: {0}")]
    Encoder(String),
    #[error("capture io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for one capture session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSpec {
    pub format: MediaFormat,
    pub width: u32,
    pub height: u32,
    /// Baseline frame rate between explicit frame pushes.
    pub nominal_fps: u32,
    pub chunk_interval: Duration,
}

/// Callbacks from a running device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Chunk(Vec<u8>),
    /// Runtime failure. The session is unusable after this.
    Error(String),
}

#[async_trait]
pub trait CaptureDevice: Send {
    fn supports(&self, format: &MediaFormat) -> bool;

    async fn start(
        &mut self,
        spec: &DeviceSpec,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Result<(), CaptureError>;

    /// Ask the device to encode `frame` now.
    fn request_frame(&mut self, frame: &RgbaImage) -> Result<(), CaptureError>;

    fn pause(&mut self) -> Result<(), CaptureError>;

    fn resume(&mut self) -> Result<(), CaptureError>;

    /// Flush and stop. All remaining output is delivered as `Chunk` events
    /// before this returns.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Tear down immediately, discarding pending output.
    fn release(&mut self);
}
