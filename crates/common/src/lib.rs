// ================
// crates/common/src/lib.rs
// ================
//! Wire protocol shared between the Huddle signaling server and its clients.
//!
//! Every WebSocket text frame carries one event encoded as
//! `{"event": "<name>", "data": <payload>}`. Event names are camelCase
//! (`joinRoom`, `hostAssigned`, ...) so browser clients can dispatch on them
//! directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Name of a call room. Any string is accepted as a room id.
pub type RoomId = String;

/// Identity of one connected participant, valid from connect to disconnect.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocate a fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// WebRTC negotiation message kinds relayed between two sessions
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::Candidate => "candidate",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque negotiation record (`{room, to, ...}`).
///
/// Only `to` (routing) and `from` (sender stamp) are interpreted by the
/// server; every other field passes through untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct NegotiationPayload(Map<String, Value>);

impl NegotiationPayload {
    pub const TO: &'static str = "to";
    pub const FROM: &'static str = "from";
    pub const ROOM: &'static str = "room";

    /// The addressed recipient, if `to` holds a well-formed session id
    pub fn target(&self) -> Option<SessionId> {
        self.0.get(Self::TO)?.as_str()?.parse().ok()
    }

    /// Raw `to` value, for diagnostics when it does not parse
    pub fn raw_target(&self) -> Option<&Value> {
        self.0.get(Self::TO)
    }

    /// Informational only; never used for routing
    pub fn room(&self) -> Option<&str> {
        self.0.get(Self::ROOM)?.as_str()
    }

    pub fn sender(&self) -> Option<SessionId> {
        self.0.get(Self::FROM)?.as_str()?.parse().ok()
    }

    /// Overwrite `from` with the true sender
    pub fn stamp_sender(&mut self, sender: SessionId) {
        self.0
            .insert(Self::FROM.to_string(), Value::String(sender.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Events sent from a client to the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join (or move to) the named room
    JoinRoom(RoomId),
    Offer(NegotiationPayload),
    Answer(NegotiationPayload),
    Candidate(NegotiationPayload),
}

/// Events sent from the server to a client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Sent once after connect; carries the receiver's own session id
    Connected(SessionId),
    /// Join rejected because the room is at capacity
    Full(RoomId),
    /// Current host of the receiver's room
    HostAssigned(SessionId),
    /// Full membership of the receiver's room, in join order
    RoomUsers(Vec<SessionId>),
    /// A member left the receiver's room
    UserDisconnected(SessionId),
    Offer(NegotiationPayload),
    Answer(NegotiationPayload),
    Candidate(NegotiationPayload),
    /// Recoverable failure of a request made by the receiver
    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn signal(kind: SignalKind, payload: NegotiationPayload) -> Self {
        match kind {
            SignalKind::Offer => ServerEvent::Offer(payload),
            SignalKind::Answer => ServerEvent::Answer(payload),
            SignalKind::Candidate => ServerEvent::Candidate(payload),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::Full(_) => "full",
            ServerEvent::HostAssigned(_) => "hostAssigned",
            ServerEvent::RoomUsers(_) => "roomUsers",
            ServerEvent::UserDisconnected(_) => "userDisconnected",
            ServerEvent::Offer(_) => "offer",
            ServerEvent::Answer(_) => "answer",
            ServerEvent::Candidate(_) => "candidate",
            ServerEvent::Error { .. } => "error",
        }
    }
}
