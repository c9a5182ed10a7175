use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about an assistant session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether the session is currently active
    pub is_active: bool,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio chunks sent upstream
    pub audio_chunks_sent: usize,

    /// Number of video frames sent upstream
    pub image_chunks_sent: usize,

    /// Number of transcript entries accumulated
    pub transcript_entries: usize,
}
