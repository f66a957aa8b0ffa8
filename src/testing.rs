//! In-memory transport for driving a [`crate::ChatSession`] without a real socket.
//!
//! [`MockTransport::channel_pair`] returns the transport plus a [`MockServer`] handle. Each connect
//! attempt consumes one [`ConnectScript`] step (accepting once the script runs out), is recorded
//! with its url and tokio instant, and every accepted attempt surfaces as a [`MockConnection`]
//! the test can push frames into, read outbound frames from, or drop.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Sink, Stream};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use crate::core::{
    CodecError, Envelope, SessionError, WebSocketBufferConfig, WsFrame, WsTlsConfig, decode,
    encode, frame_bytes,
};
use crate::transport::{WsTransport, WsTransportConnectFuture};

/// What the next connect attempt does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectScript {
    Accept,
    /// Accept after the given delay; the session stays `Connecting` meanwhile.
    AcceptAfter(Duration),
    Fail(String),
}

/// One recorded connect attempt.
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub url: String,
    pub at: Instant,
    pub accepted: bool,
}

struct Shared {
    script: Mutex<VecDeque<ConnectScript>>,
    attempts: Mutex<Vec<ConnectAttempt>>,
    connections_tx: mpsc::UnboundedSender<MockConnection>,
}

#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Build a transport + server control pair.
    pub fn channel_pair() -> (Self, MockServer) {
        let (connections_tx, connections_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            script: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            connections_tx,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockServer {
                shared,
                connections_rx,
            },
        )
    }
}

impl WsTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(
        &self,
        url: String,
        _buffers: WebSocketBufferConfig,
        _tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let step = shared
                .script
                .lock()
                .await
                .pop_front()
                .unwrap_or(ConnectScript::Accept);
            let accepted = !matches!(step, ConnectScript::Fail(_));
            shared.attempts.lock().await.push(ConnectAttempt {
                url: url.clone(),
                at: Instant::now(),
                accepted,
            });

            match step {
                ConnectScript::Fail(message) => return Err(SessionError::ConnectFailed(message)),
                ConnectScript::AcceptAfter(delay) => tokio::time::sleep(delay).await,
                ConnectScript::Accept => {}
            }

            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let connection = MockConnection {
                url,
                outbound_rx,
                inbound_tx: Some(inbound_tx),
            };
            shared.connections_tx.send(connection).map_err(|_| {
                SessionError::ConnectFailed("mock server handle dropped".to_string())
            })?;
            Ok((
                MockReader { rx: inbound_rx },
                MockWriter {
                    sent_tx: Some(outbound_tx),
                },
            ))
        })
    }
}

/// Error surface for operations on [`MockConnection`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MockServerError {
    /// The inbound socket side was intentionally dropped.
    SocketDropped,
    /// The session side is no longer reading this connection.
    ChannelClosed,
    Encode,
}

impl std::fmt::Display for MockServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockServerError::SocketDropped => f.write_str("mock socket already dropped"),
            MockServerError::ChannelClosed => f.write_str("mock session channel is closed"),
            MockServerError::Encode => f.write_str("mock payload could not be encoded"),
        }
    }
}

impl std::error::Error for MockServerError {}

/// Test-side control of a [`MockTransport`].
pub struct MockServer {
    shared: Arc<Shared>,
    connections_rx: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockServer {
    /// Queue the behaviour of upcoming connect attempts.
    pub async fn script(&self, steps: impl IntoIterator<Item = ConnectScript>) {
        self.shared.script.lock().await.extend(steps);
    }

    /// Queue `n` failing attempts.
    pub async fn fail_next(&self, n: usize) {
        self.script((0..n).map(|i| ConnectScript::Fail(format!("scripted failure {}", i + 1))))
            .await;
    }

    pub async fn attempts(&self) -> Vec<ConnectAttempt> {
        self.shared.attempts.lock().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.shared.attempts.lock().await.len()
    }

    /// Wait for the next accepted connection.
    pub async fn next_connection(&mut self) -> Option<MockConnection> {
        self.connections_rx.recv().await
    }

    pub async fn next_connection_timeout(&mut self, timeout: Duration) -> Option<MockConnection> {
        tokio::time::timeout(timeout, self.connections_rx.recv())
            .await
            .unwrap_or_default()
    }
}

/// Server side of one accepted connection.
pub struct MockConnection {
    url: String,
    outbound_rx: mpsc::UnboundedReceiver<WsFrame>,
    inbound_tx: Option<mpsc::UnboundedSender<WsFrame>>,
}

impl MockConnection {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Receive a frame written by the session. `None` once the session closed its writer.
    pub async fn recv_outbound(&mut self) -> Option<WsFrame> {
        self.outbound_rx.recv().await
    }

    pub async fn recv_outbound_timeout(&mut self, timeout: Duration) -> Option<WsFrame> {
        tokio::time::timeout(timeout, self.outbound_rx.recv())
            .await
            .unwrap_or_default()
    }

    /// Receive the next data frame and decode it. Control frames are skipped.
    pub async fn recv_envelope(&mut self) -> Option<Result<Envelope, CodecError>> {
        loop {
            let frame = self.outbound_rx.recv().await?;
            if let (true, Some(bytes)) = (frame.is_data(), frame_bytes(&frame)) {
                return Some(decode(bytes));
            }
        }
    }

    /// Push an inbound frame to the session.
    pub fn send_inbound(&self, frame: WsFrame) -> Result<(), MockServerError> {
        let Some(tx) = self.inbound_tx.as_ref() else {
            return Err(MockServerError::SocketDropped);
        };
        tx.send(frame).map_err(|_| MockServerError::ChannelClosed)
    }

    /// Push raw text, well-formed or not.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), MockServerError> {
        self.send_inbound(WsFrame::text(text))
    }

    /// Push one envelope of `kind` carrying `data`.
    pub fn send_envelope<P>(&self, kind: &str, data: &P) -> Result<(), MockServerError>
    where
        P: Serialize + ?Sized,
    {
        let wire = encode(kind, data).map_err(|_| MockServerError::Encode)?;
        self.send_text(wire)
    }

    pub fn send_close(&self, code: u16, reason: &'static str) -> Result<(), MockServerError> {
        self.send_inbound(WsFrame::close(code, reason))
    }

    /// Simulate a server-side socket drop: the session's reader sees end of stream.
    pub fn drop_socket(&mut self) {
        self.inbound_tx = None;
    }
}

pub struct MockReader {
    rx: mpsc::UnboundedReceiver<WsFrame>,
}

impl Stream for MockReader {
    type Item = Result<WsFrame, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.rx).poll_recv(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct MockWriter {
    sent_tx: Option<mpsc::UnboundedSender<WsFrame>>,
}

impl Sink<WsFrame> for MockWriter {
    type Error = SessionError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        let closed = || SessionError::TransportError {
            context: "mock_transport_write",
            error: "mock outbound channel closed".to_string(),
        };
        self.get_mut()
            .sent_tx
            .as_ref()
            .ok_or_else(closed)?
            .send(item)
            .map_err(|_| closed())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut().sent_tx = None;
        Poll::Ready(Ok(()))
    }
}
