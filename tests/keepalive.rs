use std::time::Duration;

use chat_ws::core::{InboundMessage, SessionError};
use chat_ws::testing::MockTransport;
use chat_ws::{ChatSession, SessionConfig};
use sonic_rs::json;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn no_reconnect() -> SessionConfig {
    SessionConfig::default()
        .with_client_id("client_k")
        .with_reconnect(0, Duration::from_millis(1000))
}

fn assert_elapsed(since: Instant, secs: u64) {
    let elapsed = since.elapsed();
    let expected = Duration::from_secs(secs);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected ~{secs}s, got {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn pings_flow_only_while_connected() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(no_reconnect(), transport);
    session
        .start_periodic_ping(Duration::from_secs(30))
        .await
        .unwrap();

    // Nothing is sent while disconnected, however long we wait.
    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(server.attempt_count().await, 0);

    session.connect().await.unwrap();
    let opened = Instant::now();
    let mut conn = server.next_connection().await.unwrap();

    let first = conn.recv_envelope().await.unwrap().unwrap();
    assert_eq!(first.kind, "ping");
    assert_eq!(first.data, json!({}));
    assert_elapsed(opened, 30);

    let second = conn.recv_envelope().await.unwrap().unwrap();
    assert_eq!(second.kind, "ping");
    assert_elapsed(opened, 60);

    conn.drop_socket();
    // The writer is closed on teardown, so no further ping can arrive.
    assert!(conn.recv_envelope().await.is_none());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(server.attempt_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn keepalive_survives_reconnects() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(
        SessionConfig::default().with_reconnect(5, Duration::from_millis(100)),
        transport,
    );
    session.start_periodic_ping(Duration::from_secs(10)).await.unwrap();
    session.connect().await.unwrap();

    let mut first = server.next_connection().await.unwrap();
    first.drop_socket();

    let mut second = server.next_connection().await.unwrap();
    let ping = second.recv_envelope().await.unwrap().unwrap();
    assert_eq!(ping.kind, "ping");
}

#[tokio::test(start_paused = true)]
async fn stop_periodic_ping_silences_the_ticker() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(no_reconnect(), transport);
    session.start_periodic_ping(Duration::from_secs(5)).await.unwrap();
    session.connect().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();

    assert_eq!(conn.recv_envelope().await.unwrap().unwrap().kind, "ping");
    session.stop_periodic_ping().await.unwrap();
    assert!(conn.recv_outbound_timeout(Duration::from_secs(60)).await.is_none());
    assert!(session.is_connected().await);
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let (transport, _server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(no_reconnect(), transport);
    let err = session.start_periodic_ping(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
}

#[tokio::test(start_paused = true)]
async fn pong_records_a_round_trip_without_a_route_miss() {
    let (transport, mut server) = MockTransport::channel_pair();
    let session = ChatSession::with_transport(no_reconnect(), transport);
    session.start_periodic_ping(Duration::from_secs(30)).await.unwrap();
    session.connect().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();

    assert_eq!(conn.recv_envelope().await.unwrap().unwrap().kind, "ping");
    tokio::time::sleep(Duration::from_millis(40)).await;
    conn.send_envelope("pong", &json!({})).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let stats = session.stats().await.unwrap();
    assert_eq!(stats.keepalive_samples, 1);
    assert!(stats.keepalive_p50_us >= 40_000, "{stats:?}");
    assert_eq!(stats.route_misses, 0);

    // With a handler registered, pong is delivered too.
    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .on_message("pong", move |message: &InboundMessage| {
            let _ = tx.send(message.clone());
        })
        .await
        .unwrap();
    conn.send_text(r#"{"type":"pong"}"#).unwrap();
    assert_eq!(rx.recv().await, Some(InboundMessage::Pong));
}
