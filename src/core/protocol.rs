//! Typed messages carried inside envelopes.
//!
//! Envelopes are converted to these variants right after decode so session and collaborator
//! code never pattern-match on raw JSON. Kinds outside the reserved set stay open through
//! [`InboundMessage::Custom`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sonic_rs::{JsonValueTrait, Value};

use super::codec::Envelope;
use super::types::CodecError;

/// Reserved message kinds.
pub mod kinds {
    pub const CHAT: &str = "chat";
    pub const TRANSCRIBE: &str = "transcribe";
    pub const ANALYZE_IMAGE: &str = "analyze_image";
    pub const PING: &str = "ping";

    pub const CHAT_START: &str = "chat_start";
    pub const CHAT_CHUNK: &str = "chat_chunk";
    pub const CHAT_COMPLETE: &str = "chat_complete";
    pub const PROCESSING: &str = "processing";
    pub const ERROR: &str = "error";
    pub const PONG: &str = "pong";
    pub const TRANSCRIPTION_START: &str = "transcription_start";
    pub const TRANSCRIPTION_COMPLETE: &str = "transcription_complete";
    pub const ANALYSIS_START: &str = "analysis_start";
    pub const ANALYSIS_COMPLETE: &str = "analysis_complete";
}

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeImageRequest {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Empty {}

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Chat(ChatRequest),
    Transcribe(TranscribeRequest),
    AnalyzeImage(AnalyzeImageRequest),
    Ping,
}

impl OutboundMessage {
    pub fn chat(message: impl Into<String>, conversation_id: Option<i64>) -> Self {
        Self::Chat(ChatRequest {
            message: message.into(),
            conversation_id,
            model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Chat(_) => kinds::CHAT,
            OutboundMessage::Transcribe(_) => kinds::TRANSCRIBE,
            OutboundMessage::AnalyzeImage(_) => kinds::ANALYZE_IMAGE,
            OutboundMessage::Ping => kinds::PING,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, CodecError> {
        match self {
            OutboundMessage::Chat(req) => Envelope::from_payload(self.kind(), req),
            OutboundMessage::Transcribe(req) => Envelope::from_payload(self.kind(), req),
            OutboundMessage::AnalyzeImage(req) => Envelope::from_payload(self.kind(), req),
            OutboundMessage::Ping => Envelope::from_payload(self.kind(), &Empty {}),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStart {
    #[serde(default)]
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatComplete {
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub response: Option<String>,
}

/// Progress notice for long-running operations (`processing`, `*_start`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub analysis: String,
    #[serde(default)]
    pub model_used: Option<String>,
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ChatStart(ChatStart),
    ChatChunk(ChatChunk),
    ChatComplete(ChatComplete),
    Processing(Notice),
    Error(ErrorNotice),
    Pong,
    TranscriptionStart(Notice),
    TranscriptionComplete(Transcription),
    AnalysisStart(Notice),
    AnalysisComplete(ImageAnalysis),
    /// A kind outside the reserved set, passed through untouched.
    Custom { kind: String, data: Value },
}

impl InboundMessage {
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::ChatStart(_) => kinds::CHAT_START,
            InboundMessage::ChatChunk(_) => kinds::CHAT_CHUNK,
            InboundMessage::ChatComplete(_) => kinds::CHAT_COMPLETE,
            InboundMessage::Processing(_) => kinds::PROCESSING,
            InboundMessage::Error(_) => kinds::ERROR,
            InboundMessage::Pong => kinds::PONG,
            InboundMessage::TranscriptionStart(_) => kinds::TRANSCRIPTION_START,
            InboundMessage::TranscriptionComplete(_) => kinds::TRANSCRIPTION_COMPLETE,
            InboundMessage::AnalysisStart(_) => kinds::ANALYSIS_START,
            InboundMessage::AnalysisComplete(_) => kinds::ANALYSIS_COMPLETE,
            InboundMessage::Custom { kind, .. } => kind,
        }
    }

    /// Convert a decoded envelope into its typed variant.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, CodecError> {
        let Envelope { kind, data, .. } = envelope;
        let message = match kind.as_str() {
            kinds::CHAT_START => Self::ChatStart(payload(&kind, &data)?),
            kinds::CHAT_CHUNK => Self::ChatChunk(payload(&kind, &data)?),
            kinds::CHAT_COMPLETE => Self::ChatComplete(payload(&kind, &data)?),
            kinds::PROCESSING => Self::Processing(payload(&kind, &data)?),
            kinds::ERROR => Self::Error(payload(&kind, &data)?),
            kinds::PONG => Self::Pong,
            kinds::TRANSCRIPTION_START => Self::TranscriptionStart(payload(&kind, &data)?),
            kinds::TRANSCRIPTION_COMPLETE => Self::TranscriptionComplete(payload(&kind, &data)?),
            kinds::ANALYSIS_START => Self::AnalysisStart(payload(&kind, &data)?),
            kinds::ANALYSIS_COMPLETE => Self::AnalysisComplete(payload(&kind, &data)?),
            "" => return Err(CodecError::MissingType),
            _ => Self::Custom { kind, data },
        };
        Ok(message)
    }
}

impl TryFrom<Envelope> for InboundMessage {
    type Error = CodecError;

    fn try_from(envelope: Envelope) -> Result<Self, CodecError> {
        Self::from_envelope(envelope)
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: &Value) -> Result<T, CodecError> {
    let result = if data.is_null() {
        sonic_rs::from_str("{}")
    } else {
        sonic_rs::from_value(data)
    };
    result.map_err(|e| CodecError::Schema {
        kind: kind.to_string(),
        error: e.to_string(),
    })
}
