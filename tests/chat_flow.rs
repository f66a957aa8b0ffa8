use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_ws::chat::{
    ApiError, ChatController, ChatEvent, ChatFeatures, ChatReply, ChatStream, ChatView,
    Conversation, ConversationApi, EnhancedChatRequest, FileUpload, GENERIC_FAILURE, Role,
    StoredMessage,
};
use chat_ws::testing::MockTransport;
use chat_ws::{ChatSession, SessionConfig};
use chrono::Utc;
use sonic_rs::{JsonValueTrait, json};

#[derive(Clone, Default)]
struct FakeApi {
    history_requests: Arc<Mutex<Vec<i64>>>,
    enhanced: Arc<Mutex<Vec<EnhancedChatRequest>>>,
    fail: bool,
}

impl FakeApi {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.fail {
            Err(ApiError::Http {
                status: 500,
                message: "internal".into(),
            })
        } else {
            Ok(())
        }
    }
}

fn stored(id: i64, conversation_id: i64, role: Role, content: &str) -> StoredMessage {
    StoredMessage {
        id,
        conversation_id,
        role,
        content: content.into(),
        message_type: Default::default(),
        media_url: None,
        created_at: Utc::now(),
    }
}

fn reply(conversation_id: i64, response: &str) -> ChatReply {
    ChatReply {
        response: response.into(),
        conversation_id,
        message_id: 99,
        model_used: "gpt-3.5-turbo".into(),
        tokens_used: None,
    }
}

impl ConversationApi for FakeApi {
    async fn get_conversation_messages(&self, id: i64) -> Result<Vec<StoredMessage>, ApiError> {
        self.history_requests.lock().unwrap().push(id);
        self.check()?;
        Ok(vec![
            stored(1, id, Role::User, "hello"),
            stored(2, id, Role::Assistant, "Hi there!"),
        ])
    }

    async fn get_conversation(&self, id: i64) -> Result<Conversation, ApiError> {
        self.check()?;
        Ok(Conversation {
            id,
            user_id: None,
            title: "New Conversation".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: Vec::new(),
        })
    }

    async fn send_message_with_file(&self, upload: FileUpload) -> Result<ChatReply, ApiError> {
        self.check()?;
        Ok(reply(upload.conversation_id.unwrap_or(7), "a cat"))
    }

    async fn send_enhanced_message(
        &self,
        request: EnhancedChatRequest,
    ) -> Result<ChatReply, ApiError> {
        self.enhanced.lock().unwrap().push(request);
        self.check()?;
        Ok(reply(8, "remembered"))
    }
}

async fn next_event(stream: &mut ChatStream) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("no chat event in time")
        .expect("chat stream closed")
}

#[tokio::test]
async fn streamed_reply_is_observed_in_order() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let mut stream = ChatStream::attach(&session).await.unwrap();
    session.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();

    conn.send_envelope("chat_start", &json!({})).unwrap();
    for piece in ["Hi", " there", "!"] {
        conn.send_envelope("chat_chunk", &json!({ "content": piece }))
            .unwrap();
    }
    conn.send_envelope("chat_complete", &json!({"conversation_id": 42}))
        .unwrap();

    let mut events = Vec::new();
    for _ in 0..5 {
        events.push(next_event(&mut stream).await);
    }
    assert_eq!(
        events,
        vec![
            ChatEvent::Started {
                conversation_id: None
            },
            ChatEvent::Chunk("Hi".into()),
            ChatEvent::Chunk(" there".into()),
            ChatEvent::Chunk("!".into()),
            ChatEvent::Completed {
                conversation_id: Some(42),
                response: None
            },
        ]
    );

    let mut view = ChatView::default();
    for event in &events[..4] {
        view.apply(event);
    }
    assert_eq!(view.current_response, "Hi there!");
    view.apply(&events[4]);
    assert_eq!(view.last_reply.as_deref(), Some("Hi there!"));
}

#[tokio::test]
async fn detach_removes_the_chat_handlers() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let mut stream = ChatStream::attach(&session).await.unwrap();
    session.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();

    ChatStream::detach(&session).await.unwrap();
    conn.send_envelope("chat_start", &json!({})).unwrap();

    assert_eq!(stream.next().await, None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.stats().await.unwrap().route_misses, 1);
}

#[tokio::test]
async fn completion_refreshes_history_through_the_api() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let mut stream = ChatStream::attach(&session).await.unwrap();
    let api = FakeApi::default();
    let mut controller = ChatController::new(session.clone(), api.clone());

    session.connect().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();

    assert!(controller.send("hello").await);
    let sent = conn.recv_envelope().await.unwrap().unwrap();
    assert_eq!(sent.kind, "chat");
    assert_eq!(sent.data["message"].as_str(), Some("hello"));

    conn.send_envelope("chat_start", &json!({})).unwrap();
    conn.send_envelope("chat_chunk", &json!({"content": "Hi there!"}))
        .unwrap();
    conn.send_envelope("chat_complete", &json!({"conversation_id": 42}))
        .unwrap();
    for _ in 0..3 {
        let event = next_event(&mut stream).await;
        controller.handle_event(event).await;
    }

    assert_eq!(*api.history_requests.lock().unwrap(), vec![42]);
    assert_eq!(controller.conversation_id(), Some(42));
    let view = controller.view();
    assert!(!view.is_typing);
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[1].content, "Hi there!");
    assert!(view.last_error.is_none());
}

#[tokio::test]
async fn api_failures_surface_a_generic_notice() {
    let (transport, _server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let mut controller = ChatController::new(session.clone(), FakeApi::failing());

    controller
        .handle_event(ChatEvent::Completed {
            conversation_id: Some(5),
            response: None,
        })
        .await;
    assert_eq!(controller.view().last_error.as_deref(), Some(GENERIC_FAILURE));
    assert!(session.state().await == chat_ws::ConnectionState::Disconnected);
}

#[tokio::test]
async fn sending_while_disconnected_fails_the_turn() {
    let (transport, _server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let mut controller = ChatController::new(session, FakeApi::default());

    assert!(!controller.send("anyone there?").await);
    assert_eq!(controller.view().last_error.as_deref(), Some(GENERIC_FAILURE));
    assert_eq!(controller.view().messages.len(), 1);
    assert!(!controller.send("   ").await);
}

#[tokio::test]
async fn enhanced_features_go_over_http() {
    let (transport, server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let api = FakeApi::default();
    let mut controller = ChatController::new(session, api.clone())
        .with_conversation(3)
        .with_features(ChatFeatures {
            use_memory: true,
            knowledge_base_ids: vec![1, 2],
            ..ChatFeatures::default()
        });

    assert!(controller.send("what did I say yesterday?").await);
    assert_eq!(server.attempt_count().await, 0);

    let requests = api.enhanced.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].conversation_id, Some(3));
    assert_eq!(requests[0].knowledge_base_ids, Some(vec![1, 2]));

    let view = controller.view();
    assert!(!view.is_loading);
    assert_eq!(view.messages.last().map(|m| m.content.as_str()), Some("remembered"));
    assert_eq!(controller.conversation_id(), Some(8));
}
