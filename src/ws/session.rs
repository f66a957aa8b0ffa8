//! Caller-facing session handle.

use std::time::Duration;

use kameo::error::SendError;
use kameo::prelude::{Actor, ActorRef};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::actor::{
    Connect, Disconnect, GetConnectionState, GetReconnectAttempts, GetSessionStats,
    RegisterHandler, SendEnvelope, SessionActor, SessionActorArgs, StartKeepalive, StopKeepalive,
    Subscribe, UnregisterHandler, Unsubscribe,
};
use crate::config::{SessionConfig, session_address};
use crate::core::{
    AnalyzeImageRequest, ChatRequest, ClientIdentity, ConnectionObserver, ConnectionState,
    DEFAULT_CHAT_MODEL, Envelope, MessageHandler, ObserverId, OutboundMessage, SendOutcome,
    SessionError, SessionResult, SessionStats, TranscribeRequest,
};
use crate::transport::{WsTransport, tungstenite::TungsteniteTransport};

/// Handle to one logical chat session.
///
/// Built once by the process entry point and cloned into whatever needs it. All state lives in
/// the session actor; the handle only sends it messages, so clones are cheap and share the one
/// connection. Must be constructed inside a tokio runtime.
pub struct ChatSession<T: WsTransport = TungsteniteTransport> {
    actor: ActorRef<SessionActor<T>>,
    identity: ClientIdentity,
    config: SessionConfig,
}

impl<T: WsTransport> Clone for ChatSession<T> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            identity: self.identity.clone(),
            config: self.config.clone(),
        }
    }
}

impl ChatSession<TungsteniteTransport> {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(config, TungsteniteTransport::default())
    }
}

impl<T: WsTransport> ChatSession<T> {
    pub fn with_transport(config: SessionConfig, transport: T) -> Self {
        let identity = config.identity();
        let actor = SessionActor::spawn(SessionActorArgs {
            identity: identity.clone(),
            origin: config.origin.clone(),
            transport,
            reconnect: Box::new(config.reconnect.strategy()),
            ws_buffers: config.ws_buffers,
            tls: config.tls,
        });
        Self {
            actor,
            identity,
            config,
        }
    }

    pub fn client_id(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Address derived from the configured origin and this session's identity.
    pub fn address(&self) -> String {
        session_address(&self.config.origin, &self.identity)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the session on its derived address. Resolves once connected.
    pub async fn connect(&self) -> SessionResult<()> {
        self.open(None).await
    }

    /// Open the session on an explicit `ws://` or `wss://` address.
    pub async fn connect_to(&self, address: impl Into<String>) -> SessionResult<()> {
        self.open(Some(address.into())).await
    }

    async fn open(&self, address: Option<String>) -> SessionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.actor
            .tell(Connect { address, reply })
            .send()
            .await
            .map_err(|_| SessionError::SessionStopped)?;
        rx.await.map_err(|_| SessionError::SessionStopped)?
    }

    /// Close the connection. Terminal: no automatic reconnect follows.
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.actor.ask(Disconnect).await.map_err(map_send_error)
    }

    /// Disconnect and stop the session actor. Every handle becomes inert.
    pub async fn shutdown(&self) -> SessionResult<()> {
        let _ = self.disconnect().await;
        if self.actor.stop_gracefully().await.is_err() {
            debug!(client_id = %self.identity, "session actor already stopped");
        }
        self.actor.wait_for_shutdown().await;
        Ok(())
    }

    /// Encode `data` under `kind` and hand it to the connection.
    ///
    /// Never fails the caller: a disconnected session or an unserializable payload is logged
    /// and reported through the outcome.
    pub async fn send<P>(&self, kind: &str, data: &P) -> SendOutcome
    where
        P: Serialize + ?Sized,
    {
        match Envelope::from_payload(kind, data) {
            Ok(envelope) => self.send_envelope(envelope).await,
            Err(err) => {
                warn!(client_id = %self.identity, kind, error = %err, "failed to encode payload");
                SendOutcome::EncodeFailed
            }
        }
    }

    pub async fn send_message(&self, message: &OutboundMessage) -> SendOutcome {
        match message.to_envelope() {
            Ok(envelope) => self.send_envelope(envelope).await,
            Err(err) => {
                warn!(
                    client_id = %self.identity,
                    kind = message.kind(),
                    error = %err,
                    "failed to encode payload"
                );
                SendOutcome::EncodeFailed
            }
        }
    }

    pub async fn send_envelope(&self, envelope: Envelope) -> SendOutcome {
        match self.actor.ask(SendEnvelope { envelope }).await {
            Ok(outcome) => outcome,
            Err(_) => SendOutcome::SessionStopped,
        }
    }

    pub async fn send_chat_message(
        &self,
        message: impl Into<String>,
        conversation_id: Option<i64>,
        model: Option<&str>,
    ) -> SendOutcome {
        let request = ChatRequest {
            message: message.into(),
            conversation_id,
            model: model.unwrap_or(DEFAULT_CHAT_MODEL).to_string(),
        };
        self.send_message(&OutboundMessage::Chat(request)).await
    }

    pub async fn send_audio_for_transcription(
        &self,
        audio_url: impl Into<String>,
        language: Option<String>,
    ) -> SendOutcome {
        let request = TranscribeRequest {
            audio_url: audio_url.into(),
            language,
        };
        self.send_message(&OutboundMessage::Transcribe(request)).await
    }

    pub async fn send_image_for_analysis(
        &self,
        image_url: impl Into<String>,
        prompt: Option<String>,
    ) -> SendOutcome {
        let request = AnalyzeImageRequest {
            image_url: image_url.into(),
            prompt,
        };
        self.send_message(&OutboundMessage::AnalyzeImage(request)).await
    }

    pub async fn ping(&self) -> SendOutcome {
        self.send_message(&OutboundMessage::Ping).await
    }

    /// Register the handler for `kind`, replacing any previous one. Returns whether one was
    /// replaced.
    pub async fn on_message<H>(&self, kind: impl Into<String>, handler: H) -> SessionResult<bool>
    where
        H: MessageHandler,
    {
        self.actor
            .ask(RegisterHandler {
                kind: kind.into(),
                handler: Box::new(handler),
            })
            .await
            .map_err(map_send_error)
    }

    pub async fn off_message(&self, kind: impl Into<String>) -> SessionResult<bool> {
        self.actor
            .ask(UnregisterHandler { kind: kind.into() })
            .await
            .map_err(map_send_error)
    }

    pub async fn on_connection<O>(&self, observer: O) -> SessionResult<ObserverId>
    where
        O: ConnectionObserver,
    {
        self.actor
            .ask(Subscribe {
                observer: Box::new(observer),
            })
            .await
            .map_err(map_send_error)
    }

    pub async fn off_connection(&self, id: ObserverId) -> SessionResult<bool> {
        self.actor
            .ask(Unsubscribe { id })
            .await
            .map_err(map_send_error)
    }

    /// Current state; a stopped session reads as `Disconnected`.
    pub async fn state(&self) -> ConnectionState {
        self.actor
            .ask(GetConnectionState)
            .await
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await.is_connected()
    }

    pub async fn reconnect_attempts(&self) -> SessionResult<u32> {
        self.actor
            .ask(GetReconnectAttempts)
            .await
            .map_err(map_send_error)
    }

    pub async fn stats(&self) -> SessionResult<SessionStats> {
        self.actor.ask(GetSessionStats).await.map_err(map_send_error)
    }

    /// Send `ping` every `interval` while connected.
    pub async fn start_periodic_ping(&self, interval: Duration) -> SessionResult<()> {
        self.actor
            .ask(StartKeepalive { interval })
            .await
            .map_err(map_send_error)
    }

    /// [`Self::start_periodic_ping`] with the configured interval.
    pub async fn start_keepalive(&self) -> SessionResult<()> {
        self.start_periodic_ping(self.config.keepalive_interval).await
    }

    pub async fn stop_periodic_ping(&self) -> SessionResult<()> {
        self.actor.ask(StopKeepalive).await.map_err(map_send_error)
    }
}

fn map_send_error<M>(err: SendError<M, SessionError>) -> SessionError {
    match err {
        SendError::HandlerError(err) => err,
        SendError::ActorNotRunning(_) | SendError::ActorStopped => SessionError::SessionStopped,
        SendError::MailboxFull(_) => SessionError::ActorError("session mailbox full".to_string()),
        _ => SessionError::ActorError("session request timed out".to_string()),
    }
}
