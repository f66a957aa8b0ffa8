use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::core::{SessionError, WebSocketBufferConfig, WsFrame, WsTlsConfig};

pub mod tungstenite;

/// Future returned by [`WsTransport::connect`].
pub type WsTransportConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), SessionError>> + Send>>;

/// Transport boundary for websocket IO.
///
/// The session actor owns state and policy; reading and writing happen on the halves returned
/// here, outside the actor. Tests swap in [`crate::testing::MockTransport`].
pub trait WsTransport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<WsFrame, SessionError>> + Send + Unpin + 'static;
    type Writer: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
        tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer>;
}
