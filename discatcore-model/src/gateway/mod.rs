//! Gateway wire envelope: opcodes and the outbound/inbound payload shapes
//! the session state machine sends and matches on.

pub mod payload;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// The protocol role tag carried by every Gateway frame's `op` field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    VoiceStateUpdate = 4,
    Resume = 6,
    Reconnect = 7,
    RequestGuildMembers = 8,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

/// A raw inbound frame, decoded just enough to route on `op`/`t`/`s` without
/// committing to the shape of `d`.
///
/// `d` is left as a [`serde_json::Value`] here; the session state machine
/// re-parses it into a concrete payload type once it knows which one applies.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GatewayEvent {
    pub op: OpCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}
