//! Server-side socket helper for running a session against a real local websocket endpoint.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async as tungstenite_accept};

use crate::core::{Envelope, SessionError, WsFrame, decode, frame_bytes};
use crate::transport::tungstenite::{frame_to_msg, map_ws_error, msg_to_frame};

/// Accepted websocket connection speaking [`WsFrame`]s.
pub struct WsClient {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send(&mut self, msg: WsFrame) -> Result<(), SessionError> {
        self.inner
            .send(frame_to_msg(msg))
            .await
            .map_err(|e| map_ws_error("write", e))
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(WsFrame::text(text)).await
    }

    pub async fn next(&mut self) -> Option<Result<WsFrame, SessionError>> {
        self.inner
            .next()
            .await
            .map(|res| res.map(msg_to_frame).map_err(|e| map_ws_error("read", e)))
    }

    /// Read until the next data frame and decode it as an envelope.
    ///
    /// Control frames are skipped. Returns `None` once the peer is gone.
    pub async fn next_envelope(&mut self) -> Option<Result<Envelope, SessionError>> {
        loop {
            let frame = match self.next().await? {
                Ok(frame) => frame,
                Err(err) => return Some(Err(err)),
            };
            match frame {
                WsFrame::Close(_) => return None,
                frame if frame.is_data() => {
                    let bytes = frame_bytes(&frame).unwrap_or_default();
                    return Some(decode(bytes).map_err(SessionError::from));
                }
                _ => continue,
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.inner
            .close(None)
            .await
            .map_err(|e| map_ws_error("close", e))
    }
}

/// Accept an incoming websocket connection.
pub async fn accept_async(stream: TcpStream) -> Result<WsClient, SessionError> {
    let ws = tungstenite_accept(MaybeTlsStream::Plain(stream))
        .await
        .map_err(|err| SessionError::ConnectFailed(err.to_string()))?;
    Ok(WsClient { inner: ws })
}
