//! Chat flow on top of a [`ChatSession`].
//!
//! Streamed replies arrive over the session as `chat_start` / `chat_chunk` / `chat_complete`;
//! [`ChatStream`] turns them into ordered [`ChatEvent`]s, [`ChatView`] folds the events into
//! UI-facing state and [`ChatController`] ties both to the HTTP side ([`ConversationApi`]) that
//! stores history and serves the non-streaming calls.

use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::{
    DEFAULT_CHAT_MODEL, ImageAnalysis, InboundMessage, SendOutcome, SessionResult, Transcription,
    kinds,
};
use crate::transport::{WsTransport, tungstenite::TungsteniteTransport};
use crate::ws::ChatSession;

/// Failure notice shown for any failed send or receive in the chat flow.
pub const GENERIC_FAILURE: &str = "Failed to send message";

/// Inbound kinds a [`ChatStream`] listens to.
pub const CHAT_KINDS: [&str; 9] = [
    kinds::CHAT_START,
    kinds::CHAT_CHUNK,
    kinds::CHAT_COMPLETE,
    kinds::PROCESSING,
    kinds::ERROR,
    kinds::TRANSCRIPTION_START,
    kinds::TRANSCRIPTION_COMPLETE,
    kinds::ANALYSIS_START,
    kinds::ANALYSIS_COMPLETE,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// Reply to a non-streaming chat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: i64,
    pub message_id: i64,
    pub model_used: String,
    #[serde(default)]
    pub tokens_used: Option<u32>,
}

/// Multipart upload: a message plus one attached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub message: String,
    pub conversation_id: Option<i64>,
    pub model: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn message_type(&self) -> MessageType {
        match self.content_type.split('/').next() {
            Some("image") => MessageType::Image,
            Some("audio") => MessageType::Audio,
            Some("video") => MessageType::Video,
            _ => MessageType::Text,
        }
    }
}

/// Optional server-side features for a chat turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatFeatures {
    pub use_memory: bool,
    pub use_rag: bool,
    pub knowledge_base_ids: Vec<i64>,
    pub agent_collaboration: bool,
    pub collaboration_type: Option<String>,
    pub agents: Vec<i64>,
}

impl ChatFeatures {
    /// Enhanced turns go over HTTP; plain turns stream over the session.
    pub fn any_enabled(&self) -> bool {
        self.use_memory || self.use_rag || self.agent_collaboration
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    pub message_type: MessageType,
    pub model: String,
    pub use_memory: bool,
    pub use_rag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_ids: Option<Vec<i64>>,
    pub agent_collaboration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<i64>>,
}

impl EnhancedChatRequest {
    pub fn new(
        message: impl Into<String>,
        conversation_id: Option<i64>,
        model: impl Into<String>,
        features: &ChatFeatures,
    ) -> Self {
        let non_empty = |ids: &Vec<i64>| (!ids.is_empty()).then(|| ids.clone());
        Self {
            message: message.into(),
            conversation_id,
            message_type: MessageType::Text,
            model: model.into(),
            use_memory: features.use_memory,
            use_rag: features.use_rag,
            knowledge_base_ids: non_empty(&features.knowledge_base_ids),
            agent_collaboration: features.agent_collaboration,
            collaboration_type: features.collaboration_type.clone(),
            agents: non_empty(&features.agents),
        }
    }
}

/// HTTP side of the chat backend. Calls are not retried.
pub trait ConversationApi: Send + Sync + 'static {
    fn get_conversation_messages(
        &self,
        conversation_id: i64,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, ApiError>> + Send;

    fn get_conversation(
        &self,
        conversation_id: i64,
    ) -> impl Future<Output = Result<Conversation, ApiError>> + Send;

    fn send_message_with_file(
        &self,
        upload: FileUpload,
    ) -> impl Future<Output = Result<ChatReply, ApiError>> + Send;

    fn send_enhanced_message(
        &self,
        request: EnhancedChatRequest,
    ) -> impl Future<Output = Result<ChatReply, ApiError>> + Send;
}

/// Chat-relevant inbound traffic, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Started { conversation_id: Option<i64> },
    Chunk(String),
    Completed {
        conversation_id: Option<i64>,
        response: Option<String>,
    },
    Processing(Option<String>),
    Failed(String),
    TranscriptionStarted,
    Transcribed(Transcription),
    AnalysisStarted,
    Analyzed(ImageAnalysis),
}

impl ChatEvent {
    pub fn from_inbound(message: &InboundMessage) -> Option<Self> {
        let event = match message {
            InboundMessage::ChatStart(start) => ChatEvent::Started {
                conversation_id: start.conversation_id,
            },
            InboundMessage::ChatChunk(chunk) => ChatEvent::Chunk(chunk.content.clone()),
            InboundMessage::ChatComplete(done) => ChatEvent::Completed {
                conversation_id: done.conversation_id,
                response: done.response.clone(),
            },
            InboundMessage::Processing(notice) => ChatEvent::Processing(notice.message.clone()),
            InboundMessage::Error(err) => ChatEvent::Failed(err.message.clone()),
            InboundMessage::TranscriptionStart(_) => ChatEvent::TranscriptionStarted,
            InboundMessage::TranscriptionComplete(t) => ChatEvent::Transcribed(t.clone()),
            InboundMessage::AnalysisStart(_) => ChatEvent::AnalysisStarted,
            InboundMessage::AnalysisComplete(a) => ChatEvent::Analyzed(a.clone()),
            InboundMessage::Pong | InboundMessage::Custom { .. } => return None,
        };
        Some(event)
    }
}

/// Receiver side of the chat handlers registered on a session.
pub struct ChatStream {
    rx: mpsc::UnboundedReceiver<ChatEvent>,
}

impl ChatStream {
    /// Register handlers for [`CHAT_KINDS`], replacing whatever was registered for them.
    pub async fn attach<T: WsTransport>(session: &ChatSession<T>) -> SessionResult<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in CHAT_KINDS {
            let tx = tx.clone();
            session
                .on_message(kind, move |message: &InboundMessage| {
                    if let Some(event) = ChatEvent::from_inbound(message) {
                        let _ = tx.send(event);
                    }
                })
                .await?;
        }
        Ok(Self { rx })
    }

    /// Remove the chat handlers. The session keeps running.
    pub async fn detach<T: WsTransport>(session: &ChatSession<T>) -> SessionResult<()> {
        for kind in CHAT_KINDS {
            session.off_message(kind).await?;
        }
        Ok(())
    }

    /// Next event; `None` once the handlers are gone.
    pub async fn next(&mut self) -> Option<ChatEvent> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<ChatEvent> {
        self.rx.try_recv().ok()
    }
}

/// UI-facing chat state.
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    pub messages: Vec<StoredMessage>,
    pub is_typing: bool,
    pub is_loading: bool,
    /// Reply being streamed right now.
    pub current_response: String,
    /// Last completed streamed reply.
    pub last_reply: Option<String>,
    pub last_error: Option<String>,
}

impl ChatView {
    pub fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Started { .. } => {
                self.is_typing = true;
                self.current_response.clear();
            }
            ChatEvent::Chunk(content) => self.current_response.push_str(content),
            ChatEvent::Completed { response, .. } => {
                self.is_typing = false;
                let streamed = std::mem::take(&mut self.current_response);
                self.last_reply = Some(response.clone().unwrap_or(streamed));
            }
            ChatEvent::Processing(_)
            | ChatEvent::TranscriptionStarted
            | ChatEvent::AnalysisStarted => self.is_loading = true,
            ChatEvent::Transcribed(_) | ChatEvent::Analyzed(_) => self.is_loading = false,
            ChatEvent::Failed(message) => self.fail(message.clone()),
        }
    }

    /// Stop spinners and surface `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.is_loading = false;
        self.is_typing = false;
        self.last_error = Some(message.into());
    }

    fn push(&mut self, role: Role, content: &str, conversation_id: Option<i64>, id: i64) {
        self.messages.push(StoredMessage {
            id,
            conversation_id: conversation_id.unwrap_or_default(),
            role,
            content: content.to_string(),
            message_type: MessageType::Text,
            media_url: None,
            created_at: Utc::now(),
        });
    }
}

/// Drives one conversation: sends turns, applies inbound events, refreshes history.
pub struct ChatController<A: ConversationApi, T: WsTransport = TungsteniteTransport> {
    session: ChatSession<T>,
    api: A,
    view: ChatView,
    conversation_id: Option<i64>,
    model: String,
    features: ChatFeatures,
}

impl<A: ConversationApi, T: WsTransport> ChatController<A, T> {
    pub fn new(session: ChatSession<T>, api: A) -> Self {
        Self {
            session,
            api,
            view: ChatView::default(),
            conversation_id: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            features: ChatFeatures::default(),
        }
    }

    pub fn with_conversation(mut self, conversation_id: i64) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_features(mut self, features: ChatFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn session(&self) -> &ChatSession<T> {
        &self.session
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Load persisted history for the current conversation, if any.
    pub async fn load_history(&mut self) {
        if let Some(id) = self.conversation_id {
            self.refresh_history(id).await;
        }
    }

    /// Apply one inbound event. A completed reply with a conversation id refreshes history.
    pub async fn handle_event(&mut self, event: ChatEvent) {
        self.view.apply(&event);
        if let ChatEvent::Completed {
            conversation_id: Some(id),
            ..
        } = event
        {
            self.conversation_id = Some(id);
            self.refresh_history(id).await;
        }
    }

    /// Send one user turn: over HTTP when enhanced features are on, streamed otherwise.
    pub async fn send(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if self.features.any_enabled() {
            self.send_enhanced(text).await
        } else {
            self.send_streaming(text).await
        }
    }

    /// Stream a reply over the session. The reply arrives as [`ChatEvent`]s.
    pub async fn send_streaming(&mut self, text: &str) -> bool {
        self.push_user(text);
        let outcome = self
            .session
            .send_chat_message(text, self.conversation_id, Some(&self.model))
            .await;
        if outcome != SendOutcome::Sent {
            warn!(outcome = ?outcome, "chat message not sent");
            self.view.fail(GENERIC_FAILURE);
            return false;
        }
        true
    }

    pub async fn send_enhanced(&mut self, text: &str) -> bool {
        self.push_user(text);
        let request =
            EnhancedChatRequest::new(text, self.conversation_id, &self.model, &self.features);
        self.view.is_loading = true;
        let result = self.api.send_enhanced_message(request).await;
        self.view.is_loading = false;
        self.accept_reply(result)
    }

    pub async fn send_with_file(&mut self, mut upload: FileUpload) -> bool {
        self.push_user(&upload.message);
        upload.conversation_id = upload.conversation_id.or(self.conversation_id);
        let result = self.api.send_message_with_file(upload).await;
        self.accept_reply(result)
    }

    fn accept_reply(&mut self, result: Result<ChatReply, ApiError>) -> bool {
        match result {
            Ok(reply) => {
                self.conversation_id = Some(reply.conversation_id);
                self.view.push(
                    Role::Assistant,
                    &reply.response,
                    Some(reply.conversation_id),
                    reply.message_id,
                );
                true
            }
            Err(err) => {
                warn!(error = %err, "chat request failed");
                self.view.fail(GENERIC_FAILURE);
                false
            }
        }
    }

    async fn refresh_history(&mut self, conversation_id: i64) {
        match self.api.get_conversation_messages(conversation_id).await {
            Ok(messages) => {
                debug!(conversation_id, count = messages.len(), "history refreshed");
                self.view.messages = messages;
            }
            Err(err) => {
                warn!(conversation_id, error = %err, "failed to load conversation messages");
                self.view.fail(GENERIC_FAILURE);
            }
        }
    }

    fn push_user(&mut self, text: &str) {
        let id = Utc::now().timestamp_millis();
        self.view.push(Role::User, text, self.conversation_id, id);
    }
}
