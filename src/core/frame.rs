use bytes::Bytes;

/// Transport-neutral websocket frame type.
///
/// Transports convert their native frame representation into/from `WsFrame`; the session never
/// sees tungstenite types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<WsCloseFrame>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: Bytes,
}

/// Normal closure status code.
pub const CLOSE_NORMAL: u16 = 1000;

impl WsFrame {
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Bytes::from(s.into()))
    }

    #[inline]
    pub fn close(code: u16, reason: &'static str) -> Self {
        Self::Close(Some(WsCloseFrame {
            code,
            reason: Bytes::from_static(reason.as_bytes()),
        }))
    }

    /// Data frames carry envelopes; control frames never do.
    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(self, WsFrame::Text(_) | WsFrame::Binary(_))
    }
}

/// Borrow the underlying bytes from frames without allocation.
#[inline]
pub fn frame_bytes(frame: &WsFrame) -> Option<&[u8]> {
    match frame {
        WsFrame::Text(bytes) => Some(bytes.as_ref()),
        WsFrame::Binary(bytes) => Some(bytes.as_ref()),
        WsFrame::Ping(bytes) => Some(bytes.as_ref()),
        WsFrame::Pong(bytes) => Some(bytes.as_ref()),
        WsFrame::Close(_) => None,
    }
}
