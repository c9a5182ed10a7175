// Audio codec adapter
//
// Converts between raw f32 PCM sample buffers and the transport encoding
// used by the live API (16-bit little-endian PCM wrapped in base64), and
// decodes received audio bytes back into playable segments.

use anyhow::{bail, Context, Result};
use base64::Engine;

/// A decoded, playable audio segment (normalized f32 samples, interleaved).
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Normalized samples in [-1.0, 1.0], interleaved when multi-channel
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioSegment {
    /// Playback duration in seconds (frames / sample rate)
    pub fn duration(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// Convert f32 samples to 16-bit signed little-endian PCM bytes.
///
/// Each sample is multiplied by 32768 and truncated. There is no clamping:
/// input outside [-1.0, 1.0) wraps around silently (1.0 becomes i16::MIN),
/// which matches what the live API already tolerates on ingest.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        // Truncate via i32 so out-of-range values wrap instead of saturating
        let v = (s * 32768.0) as i32 as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Encode bytes for embedding in a text-based protocol message.
pub fn transport_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Inverse of [`transport_encode`].
pub fn transport_decode(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Failed to decode transport-encoded payload")
}

/// Interpret bytes as 16-bit LE PCM and produce a playable segment.
pub fn decode_audio_segment(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioSegment> {
    if sample_rate == 0 || channels == 0 {
        bail!("Invalid audio format: {}Hz, {} channels", sample_rate, channels);
    }
    if bytes.len() % 2 != 0 {
        bail!("PCM payload has odd length ({} bytes)", bytes.len());
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioSegment {
        samples,
        sample_rate,
        channels,
    })
}
