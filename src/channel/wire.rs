// Wire schema for the live inference service.
//
// The service owns this contract; the shapes below mirror it field for
// field (camelCase on the wire). Outbound messages are externally tagged,
// inbound messages may carry several kinds of content at once.

use super::events::InboundEvent;
use crate::transcript::Speaker;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Messages sent to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

/// Session configuration, sent once when the connection opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Tool>,
    pub input_audio_transcription: TranscriptionConfig,
    pub output_audio_transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

/// Empty on the wire; presence alone enables live transcription.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionConfig {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<MediaBlob>,
}

/// A mime-tagged, transport-encoded binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One realtime-input message carries exactly one media chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaBlob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

/// Messages received from the service. Any combination of fields may be
/// present in one message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<TranscriptionDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<TranscriptionDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionDelta {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ServerMessage {
    /// Extract every event carried by this message, in arrival order:
    /// user transcription, model transcription, citations, inline audio,
    /// turn-complete, then tool calls. Nothing is dropped.
    pub fn into_events(self) -> Vec<InboundEvent> {
        let mut events = Vec::new();

        if let Some(content) = self.server_content {
            if let Some(delta) = content.input_transcription {
                events.push(InboundEvent::TranscriptDelta {
                    source: Speaker::User,
                    text: delta.text,
                });
            }
            if let Some(delta) = content.output_transcription {
                events.push(InboundEvent::TranscriptDelta {
                    source: Speaker::Ai,
                    text: delta.text,
                });
            }
            if let Some(grounding) = content.grounding_metadata {
                for chunk in grounding.grounding_chunks {
                    if let Some(web) = chunk.web {
                        events.push(InboundEvent::Citation {
                            uri: web.uri,
                            title: web.title,
                        });
                    }
                }
            }
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(blob) = part.inline_data {
                        events.push(InboundEvent::AudioChunk { data: blob.data });
                    }
                }
            }
            if content.turn_complete {
                events.push(InboundEvent::TurnComplete);
            }
        }

        if let Some(tool_call) = self.tool_call {
            for call in tool_call.function_calls {
                events.push(InboundEvent::ToolCall {
                    id: call.id,
                    name: call.name,
                    args: call.args,
                });
            }
        }

        events
    }
}

/// Build the setup message for a session: audio responses, live
/// transcription both ways, the click-marker tool, search augmentation,
/// and the system instruction passed verbatim.
pub fn setup(model: &str, system_instruction: &str) -> ClientMessage {
    ClientMessage::Setup(Setup {
        model: model.to_string(),
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
        },
        system_instruction: Content {
            parts: vec![Part {
                text: Some(system_instruction.to_string()),
                inline_data: None,
            }],
        },
        tools: vec![
            Tool {
                function_declarations: Some(vec![click_marker_declaration()]),
                google_search: None,
            },
            Tool {
                function_declarations: None,
                google_search: Some(json!({})),
            },
        ],
        input_audio_transcription: TranscriptionConfig {},
        output_audio_transcription: TranscriptionConfig {},
    })
}

/// Schema for the one client-side capability exposed to the model.
pub fn click_marker_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: crate::marker::SHOW_CLICK_MARKER.to_string(),
        description: "Displays a marker on the screen to show the user where to click. \
                      Use this to point to UI elements."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "x": {
                    "type": "NUMBER",
                    "description": "The normalized horizontal coordinate (from 0.0 to 1.0), \
                                    where 0.0 is the far left of the screen."
                },
                "y": {
                    "type": "NUMBER",
                    "description": "The normalized vertical coordinate (from 0.0 to 1.0), \
                                    where 0.0 is the very top of the screen."
                }
            },
            "required": ["x", "y"]
        }),
    }
}
