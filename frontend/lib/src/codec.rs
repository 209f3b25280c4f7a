//! Channel frames over websocket messages. The JSON serializer only speaks
//! text frames, so binary messages are rejected.
use arcade_core::{error::ProtocolError, net::Frame};
use ws_stream_wasm::WsMessage;

#[derive(Debug)]
pub enum CodecError {
    Binary(usize),
    Protocol(ProtocolError),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary(len) => write!(f, "unexpected binary message ({len} bytes)"),
            Self::Protocol(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Binary(_) => None,
            Self::Protocol(ref e) => Some(e),
        }
    }
}

impl From<ProtocolError> for CodecError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

pub fn encode(frame: &Frame) -> Result<WsMessage, CodecError> {
    Ok(WsMessage::Text(frame.encode()?))
}

pub fn decode(message: WsMessage) -> Result<Frame, CodecError> {
    match message {
        WsMessage::Text(text) => Ok(Frame::decode(&text)?),
        WsMessage::Binary(bytes) => Err(CodecError::Binary(bytes.len())),
    }
}
