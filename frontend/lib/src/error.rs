use std::fmt;

use arcade_core::error::{ConfigError, HookError, ProtocolError};
use wasm_bindgen::JsValue;
use ws_stream_wasm::WsErr;

#[derive(Debug)]
pub enum LiveError {
    Config(ConfigError),
    Hook(HookError),
    Protocol(ProtocolError),
    Socket(WsErr),
    /// A browser API threw or was unavailable.
    Dom(String),
}

impl fmt::Display for LiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Hook(e) => write!(f, "hook error: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Socket(e) => write!(f, "socket error: {e}"),
            Self::Dom(e) => write!(f, "DOM error: {e}"),
        }
    }
}

impl std::error::Error for LiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(ref e) => Some(e),
            Self::Hook(ref e) => Some(e),
            Self::Protocol(ref e) => Some(e),
            Self::Socket(ref e) => Some(e),
            Self::Dom(_) => None,
        }
    }
}

impl From<ConfigError> for LiveError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<HookError> for LiveError {
    fn from(e: HookError) -> Self {
        Self::Hook(e)
    }
}

impl From<ProtocolError> for LiveError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<WsErr> for LiveError {
    fn from(e: WsErr) -> Self {
        Self::Socket(e)
    }
}

impl From<JsValue> for LiveError {
    fn from(value: JsValue) -> Self {
        Self::Dom(
            value
                .as_string()
                .unwrap_or_else(|| format!("{value:?}")),
        )
    }
}

impl From<LiveError> for JsValue {
    fn from(e: LiveError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}
