use std::fmt;

use serde_json::Error as JsonError;

/// Problems a hook runs into while mounting or handling a single event.
#[derive(Debug)]
pub enum HookError {
    UnknownHook(String),
    MissingId,
    MissingAttribute(&'static str),
    InvalidCoordinate {
        attribute: &'static str,
        value: String,
    },
    NotACanvas,
    MissingContext,
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHook(name) => write!(f, "unknown hook \"{name}\""),
            Self::MissingId => write!(f, "hook element has no DOM id"),
            Self::MissingAttribute(name) => write!(f, "missing attribute {name}"),
            Self::InvalidCoordinate { attribute, value } => {
                write!(f, "attribute {attribute} is not a board coordinate: {value:?}")
            }
            Self::NotACanvas => write!(f, "hook element is not a <canvas>"),
            Self::MissingContext => write!(f, "canvas has no 2d context"),
        }
    }
}

impl std::error::Error for HookError {}

/// Malformed frames or payloads seen at the connection boundary.
#[derive(Debug)]
pub enum ProtocolError {
    Json(JsonError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
        }
    }
}

impl From<JsonError> for ProtocolError {
    fn from(e: JsonError) -> Self {
        Self::Json(e)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingCsrfToken,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCsrfToken => {
                write!(f, "page has no <meta name=\"csrf-token\"> with content")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
