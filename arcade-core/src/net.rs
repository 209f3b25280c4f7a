//! Events exchanged with the server and the channel frames that carry them.
//!
//! Frames use the Phoenix v2 JSON layout, one per websocket text message:
//! `[join_ref, ref, topic, event, payload]`.
use std::cell::Cell as Counter;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::ProtocolError,
    games::{light_cycles::DrawPayload, minesweeper::Cell},
};

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const SERIALIZER_VSN: &str = "2.0.0";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_DIFF: &str = "diff";
pub const EVENT_HOOK: &str = "event";

/// Key of the pushed-events list inside a rendered diff.
const DIFF_EVENTS: &str = "e";

/// Events a hook sends to the server.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum ClientEvent {
    Flag(Cell),
}

impl ClientEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Flag(_) => "flag",
        }
    }
}

/// Events the server pushes to hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Draw(DrawPayload),
}

impl ServerEvent {
    pub const DRAW: &'static str = "draw";

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Draw(_) => Self::DRAW,
        }
    }

    /// Parses a pushed event. Names no hook listens to yield `Ok(None)`.
    pub fn parse(name: &str, payload: Value) -> Result<Option<Self>, ProtocolError> {
        match name {
            Self::DRAW => Ok(Some(Self::Draw(serde_json::from_value(payload)?))),
            _ => Ok(None),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawFrame(Option<String>, Option<String>, String, String, Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFrame", into = "RawFrame")]
pub struct Frame {
    pub join_ref: Option<String>,
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

impl From<RawFrame> for Frame {
    fn from(RawFrame(join_ref, msg_ref, topic, event, payload): RawFrame) -> Self {
        Self {
            join_ref,
            msg_ref,
            topic,
            event,
            payload,
        }
    }
}

impl From<Frame> for RawFrame {
    fn from(frame: Frame) -> Self {
        Self(
            frame.join_ref,
            frame.msg_ref,
            frame.topic,
            frame.event,
            frame.payload,
        )
    }
}

impl Frame {
    pub fn join(join_ref: String, topic: &str, params: &JoinParams) -> Self {
        Self {
            msg_ref: Some(join_ref.clone()),
            join_ref: Some(join_ref),
            topic: topic.to_owned(),
            event: EVENT_JOIN.to_owned(),
            payload: params.to_payload(),
        }
    }

    pub fn heartbeat(msg_ref: String) -> Self {
        Self {
            join_ref: None,
            msg_ref: Some(msg_ref),
            topic: PHOENIX_TOPIC.to_owned(),
            event: EVENT_HEARTBEAT.to_owned(),
            payload: json!({}),
        }
    }

    pub fn hook_event(
        join_ref: String,
        msg_ref: String,
        topic: &str,
        event: &ClientEvent,
    ) -> Result<Self, ProtocolError> {
        let mut payload = serde_json::to_value(event)?;
        payload["type"] = Value::from("hook");
        Ok(Self {
            join_ref: Some(join_ref),
            msg_ref: Some(msg_ref),
            topic: topic.to_owned(),
            event: EVENT_HOOK.to_owned(),
            payload,
        })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// `status` of a `phx_reply`.
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != EVENT_REPLY {
            return None;
        }
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Events pushed by the server, in the order they were queued.
    ///
    /// They ride along in a `diff`, or in the `diff`/`rendered` of a reply.
    /// Entries that aren't a `[name, payload]` pair are skipped.
    pub fn push_events(&self) -> Vec<(String, Value)> {
        let events = match self.event.as_str() {
            EVENT_DIFF => self.payload.get(DIFF_EVENTS),
            EVENT_REPLY => self.payload.get("response").and_then(|response| {
                response
                    .get("diff")
                    .or_else(|| response.get("rendered"))
                    .and_then(|diff| diff.get(DIFF_EVENTS))
            }),
            _ => None,
        };
        let Some(events) = events else {
            return Vec::new();
        };
        let Some(entries) = events.as_array() else {
            warn!("pushed events on {} are not a list: {events}", self.topic);
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("skipping pushed event {entry}: {e}");
                    None
                }
            })
            .collect()
    }
}

/// What the main live view needs to join its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    pub url: String,
    pub csrf_token: String,
    pub session: String,
    pub static_token: Option<String>,
}

impl JoinParams {
    pub fn topic(view_id: &str) -> String {
        format!("lv:{view_id}")
    }

    fn to_payload(&self) -> Value {
        json!({
            "url": self.url,
            "params": {
                "_csrf_token": self.csrf_token,
                "_mounts": 0,
            },
            "session": self.session,
            "static": self.static_token,
        })
    }
}

/// Source of message refs, unique for the lifetime of the page.
#[derive(Debug, Default)]
pub struct RefCounter {
    next: Counter<u64>,
}

impl RefCounter {
    pub const fn new() -> Self {
        Self {
            next: Counter::new(0),
        }
    }

    pub fn next(&self) -> String {
        let current = self.next.get() + 1;
        self.next.set(current);
        current.to_string()
    }
}
