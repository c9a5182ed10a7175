use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Samples delivered per microphone block.
pub const AUDIO_BLOCK_SIZE: usize = 4096;

/// One fixed-size block of microphone audio (mono f32 samples).
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Normalized samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// One uncompressed still image of the captured screen (RGB8).
#[derive(Debug, Clone)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8 pixels, row-major
    pub pixels: Vec<u8>,
}

/// Microphone capture backend.
///
/// Implementations wrap a platform audio stack and deliver fixed-size
/// sample blocks at the hardware's own cadence. The channel closing means
/// the track ended (device gone or permission revoked).
#[async_trait::async_trait]
pub trait AudioCapture: Send {
    /// Start capturing; returns the block stream.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>>;

    /// Release the device.
    async fn stop(&mut self) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Screen capture backend.
///
/// Frames are pulled, not pushed: the pipeline asks for the current frame
/// on its own timer. `Ok(None)` means no frame is available right now and
/// the tick should be skipped.
#[async_trait::async_trait]
pub trait VideoCapture: Send {
    /// Acquire the display stream.
    async fn start(&mut self) -> Result<()>;

    /// Grab the most recent frame, if one is available.
    async fn frame(&mut self) -> Result<Option<RasterFrame>>;

    /// Release the display stream.
    async fn stop(&mut self) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Configuration for the capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Microphone sample rate in Hz
    pub input_sample_rate: u32,
    /// Screen frames per second
    pub frame_rate: u32,
    /// JPEG quality factor (1-100)
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000, // The live API ingests 16kHz PCM
            frame_rate: 2,
            jpeg_quality: 70,
        }
    }
}
