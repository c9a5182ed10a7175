use crate::capture::CaptureConfig;
use serde::{Deserialize, Serialize};

/// Default live model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// System instruction passed verbatim at session start.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant. Analyze the user's screen and voice to help them solve technical problems with code, applications, or general computer issues. Use Google Search to find documentation or recent information when needed. If the user provides a URL and asks you to analyze it, use Google Search with the `site:` operator to search within that specific URL or domain to find relevant information and answer their question. When the user asks where to click or what to look at, use the `showClickMarker` tool to point to the exact location on the screen. Be concise and clear in your spoken responses.";

/// Configuration for one assistant session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g. "assist-<uuid>")
    pub session_id: String,

    /// Live model to talk to
    pub model: String,

    /// System instruction, sent verbatim with the setup message
    pub system_instruction: String,

    /// Sample rate of audio received from the model (Hz)
    pub output_sample_rate: u32,

    /// Capture-side settings (microphone rate, frame rate, JPEG quality)
    pub capture: CaptureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("assist-{}", uuid::Uuid::new_v4()),
            model: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            output_sample_rate: 24000, // The model speaks 24kHz PCM
            capture: CaptureConfig::default(),
        }
    }
}
