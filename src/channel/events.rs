// Domain-level message shapes exchanged with the live session.
//
// Outbound media and inbound server information are explicit sum types so
// dispatch in the session channel stays exhaustive.

use crate::transcript::Speaker;

/// One discrete unit of outbound media, already transport-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaChunk {
    /// 16-bit PCM audio at the given sample rate
    Audio { sample_rate: u32, data: String },
    /// A compressed still image (e.g. "image/jpeg")
    Image { mime_type: String, data: String },
}

impl MediaChunk {
    /// Wire mime type for this chunk.
    pub fn mime_type(&self) -> String {
        match self {
            MediaChunk::Audio { sample_rate, .. } => format!("audio/pcm;rate={}", sample_rate),
            MediaChunk::Image { mime_type, .. } => mime_type.clone(),
        }
    }

    /// Transport-encoded payload.
    pub fn into_data(self) -> String {
        match self {
            MediaChunk::Audio { data, .. } => data,
            MediaChunk::Image { data, .. } => data,
        }
    }
}

/// One discrete unit of parsed server-originated information.
///
/// A single inbound wire message may fan out into several of these;
/// arrival order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Partial transcription text for one side of the conversation
    TranscriptDelta { source: Speaker, text: String },
    /// Transport-encoded PCM audio from the model's spoken response
    AudioChunk { data: String },
    /// A model-initiated tool invocation; must be acknowledged
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    /// Web citation attached to the model's current response
    Citation { uri: String, title: Option<String> },
    /// The model finished its response cycle
    TurnComplete,
}
