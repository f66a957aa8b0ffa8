use std::time::Duration;

use chat_ws::core::{ConnectionObserver, InboundMessage, MessageHandler};
use chat_ws::testing::{MockConnection, MockServer, MockTransport};
use chat_ws::{ChatSession, ConnectionState, SessionConfig};
use sonic_rs::json;
use tokio::sync::mpsc;

async fn connected() -> (ChatSession<MockTransport>, MockServer, MockConnection) {
    let (transport, mut server) = MockTransport::channel_pair();
    let session =
        ChatSession::with_transport(SessionConfig::default().with_client_id("client_d"), transport);
    session.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();
    (session, server, conn)
}

fn forward(tx: mpsc::UnboundedSender<InboundMessage>) -> impl FnMut(&InboundMessage) + Send + 'static {
    move |message: &InboundMessage| {
        let _ = tx.send(message.clone());
    }
}

struct FaultyHandler;

impl MessageHandler for FaultyHandler {
    fn handle(&mut self, _message: &InboundMessage) {
        panic!("handler bug");
    }
}

struct FaultyObserver;

impl ConnectionObserver for FaultyObserver {
    fn on_connection_change(&mut self, _connected: bool) {
        panic!("observer bug");
    }
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<InboundMessage>) -> InboundMessage {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("handler not invoked in time")
        .expect("handler dropped")
}

#[tokio::test]
async fn registered_handler_sees_each_message_once() {
    let (session, _server, conn) = connected().await;
    let (chunk_tx, mut chunks) = mpsc::unbounded_channel();
    let (start_tx, mut starts) = mpsc::unbounded_channel();
    session.on_message("chat_chunk", forward(chunk_tx)).await.unwrap();
    session.on_message("chat_start", forward(start_tx)).await.unwrap();

    conn.send_envelope("chat_chunk", &json!({"content": "Hi"})).unwrap();

    match recv(&mut chunks).await {
        InboundMessage::ChatChunk(chunk) => assert_eq!(chunk.content, "Hi"),
        other => panic!("unexpected message {other:?}"),
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(chunks.try_recv().is_err());
    assert!(starts.try_recv().is_err());
}

#[tokio::test]
async fn last_registration_wins() {
    let (session, _server, conn) = connected().await;
    let (old_tx, mut old) = mpsc::unbounded_channel();
    let (new_tx, mut new) = mpsc::unbounded_channel();

    assert!(!session.on_message("processing", forward(old_tx)).await.unwrap());
    assert!(session.on_message("processing", forward(new_tx)).await.unwrap());

    conn.send_envelope("processing", &json!({"message": "thinking"})).unwrap();
    assert!(matches!(recv(&mut new).await, InboundMessage::Processing(_)));
    // The replaced handler was dropped along with its sender.
    assert_eq!(old.recv().await, None);
}

#[tokio::test]
async fn unroutable_and_undecodable_frames_keep_the_connection() {
    let (session, _server, conn) = connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.on_message("chat_chunk", forward(tx)).await.unwrap();

    conn.send_text("{not json").unwrap();
    conn.send_text(r#"{"data":{"content":"no type"}}"#).unwrap();
    conn.send_envelope("chat_chunk", &json!({"wrong": "shape"})).unwrap();
    conn.send_envelope("presence", &json!({"online": 3})).unwrap();
    conn.send_envelope("chat_chunk", &json!({"content": "still here"})).unwrap();

    match recv(&mut rx).await {
        InboundMessage::ChatChunk(chunk) => assert_eq!(chunk.content, "still here"),
        other => panic!("unexpected message {other:?}"),
    }
    assert_eq!(session.state().await, ConnectionState::Connected);

    let stats = session.stats().await.unwrap();
    assert_eq!(stats.decode_failures, 3);
    assert_eq!(stats.route_misses, 1);
    assert_eq!(stats.inbound, 3);
}

#[tokio::test]
async fn unregistered_kind_is_dropped() {
    let (session, _server, conn) = connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.on_message("chat_start", forward(tx)).await.unwrap();
    assert!(session.off_message("chat_start").await.unwrap());
    assert!(!session.off_message("chat_start").await.unwrap());

    conn.send_envelope("chat_start", &json!({})).unwrap();
    assert_eq!(rx.recv().await, None);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.stats().await.unwrap().route_misses, 1);
}

#[tokio::test]
async fn custom_kinds_route_with_raw_data() {
    let (session, _server, conn) = connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.on_message("presence", forward(tx)).await.unwrap();

    conn.send_envelope("presence", &json!({"online": 3})).unwrap();
    match recv(&mut rx).await {
        InboundMessage::Custom { kind, data } => {
            assert_eq!(kind, "presence");
            assert_eq!(data, json!({"online": 3}));
        }
        other => panic!("unexpected message {other:?}"),
    }
}

#[tokio::test]
async fn panicking_handler_does_not_stop_the_read_loop() {
    let (session, _server, conn) = connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .on_message("chat_start", FaultyHandler)
        .await
        .unwrap();
    session.on_message("chat_chunk", forward(tx)).await.unwrap();

    conn.send_envelope("chat_start", &json!({})).unwrap();
    conn.send_envelope("chat_chunk", &json!({"content": "after"})).unwrap();

    assert!(matches!(recv(&mut rx).await, InboundMessage::ChatChunk(_)));
    assert_eq!(session.state().await, ConnectionState::Connected);
    assert_eq!(session.stats().await.unwrap().handler_failures, 1);
}

#[tokio::test]
async fn panicking_observer_does_not_starve_later_observers() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(SessionConfig::default(), transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session
        .on_connection(FaultyObserver)
        .await
        .unwrap();
    let id = session
        .on_connection(move |connected: bool| {
            let _ = tx.send(connected);
        })
        .await
        .unwrap();

    session.connect().await.unwrap();
    let _conn = server.next_connection().await.unwrap();
    assert_eq!(rx.recv().await, Some(true));

    let stats = session.stats().await.unwrap();
    assert_eq!(stats.observer_failures, 1);
    assert_eq!(stats.handler_failures, 0);
    assert_eq!(stats.last_error.as_deref(), Some("observer: connected"));

    assert!(session.off_connection(id).await.unwrap());
    assert!(!session.off_connection(id).await.unwrap());
    session.disconnect().await.unwrap();
    assert_eq!(rx.recv().await, None);
    assert_eq!(session.stats().await.unwrap().observer_failures, 2);
}

#[tokio::test]
async fn handlers_survive_a_reconnect() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(
        SessionConfig::default().with_reconnect(5, Duration::from_millis(10)),
        transport,
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.on_message("chat_chunk", forward(tx)).await.unwrap();

    session.connect().await.unwrap();
    let mut first = server.next_connection().await.unwrap();
    first.drop_socket();

    let second = server.next_connection().await.unwrap();
    for _ in 0..200 {
        if session.is_connected().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    second
        .send_envelope("chat_chunk", &json!({"content": "again"}))
        .unwrap();
    match recv(&mut rx).await {
        InboundMessage::ChatChunk(chunk) => assert_eq!(chunk.content, "again"),
        other => panic!("unexpected message {other:?}"),
    }
}
