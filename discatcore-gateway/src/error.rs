//! Gateway error types and the internal `GatewayReconnect` signal.
//!
//! Follows the `{kind: ErrorType, source}` idiom used throughout
//! `twilight-gateway`'s and `twilight-http`'s `error.rs` modules.
//! `GatewayReconnect` is deliberately *not* an [`Error`](std::error::Error):
//! per spec §9's redesign note, a protocol-directed reconnect is a control
//! signal, not a failure, so it's carried as its own result-type variant
//! (see [`CloseOutcome`]) rather than raised like the source's exception.

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

#[derive(Debug)]
pub struct Error {
    pub(crate) kind: ErrorType,
    pub(crate) source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorType, source: Option<Box<dyn StdError + Send + Sync>>) -> Self {
        Self { kind, source }
    }

    pub const fn kind(&self) -> &ErrorType {
        &self.kind
    }

    pub fn into_parts(self) -> (ErrorType, Option<Box<dyn StdError + Send + Sync>>) {
        (self.kind, self.source)
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorType {
    /// Retrieving the Gateway URL via `/gateway/bot` failed.
    RetrievingGatewayUrl,
    /// The WebSocket handshake failed.
    Establishing,
    /// Sending a frame over the WebSocket failed.
    Sending,
    /// A payload failed to serialize to JSON.
    Serializing,
    /// A frame's body failed to parse as JSON, or didn't decode as UTF-8.
    Deserializing,
    /// The zlib stream failed to decompress a frame.
    Decompressing,
    /// The first frame of a new connection wasn't opcode 10 (HELLO).
    ExpectedHello,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ErrorType::RetrievingGatewayUrl => f.write_str("failed to retrieve the gateway url"),
            ErrorType::Establishing => f.write_str("failed to establish the websocket connection"),
            ErrorType::Sending => f.write_str("failed to send a frame over the websocket"),
            ErrorType::Serializing => f.write_str("failed to serialize a payload"),
            ErrorType::Deserializing => f.write_str("failed to deserialize a frame"),
            ErrorType::Decompressing => f.write_str("failed to decompress a frame"),
            ErrorType::ExpectedHello => f.write_str("first frame of a new connection was not HELLO"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

/// Carried by a protocol-directed close (`RECONNECT`, `INVALID_SESSION`,
/// heartbeat-ack timeout) so the caller driving the connection loop knows to
/// re-enter [`connect`](crate::Shard::connect) rather than give up.
#[derive(Clone, Debug)]
pub struct GatewayReconnect {
    pub resume_url: Option<Box<str>>,
    pub can_resume: bool,
}

/// What a closed connection should do next.
#[derive(Clone, Debug)]
pub enum CloseOutcome {
    /// `reconnect = false`: the shard will not run again.
    Terminated,
    /// `reconnect = true`: re-enter `connect` with the carried details.
    Reconnect(GatewayReconnect),
}
