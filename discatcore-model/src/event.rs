//! The typed event hierarchy the dispatcher fans events out through.
//!
//! [`Event`] is a sealed tagged union rather than a dynamically inspected
//! callback parameter: every variant has a compile-time-known [`EventType`],
//! and [`EventType::dispatch_ancestors`] is a `const fn` returning the tuple
//! of types a listener subscribed to that ancestor would receive it under.

use crate::id::Id;
use std::fmt;

/// The type tag of an [`Event`], used as the key listeners subscribe by.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum EventType {
    /// Every event is a descendant of `Any`.
    Any,
    /// Connection lifecycle events (not raw Discord dispatch payloads).
    Connection,
    Connecting,
    Connected,
    Disconnected,
    Identifying,
    Reconnecting,
    Resuming,
    /// Raw Discord dispatch payloads.
    Dispatch,
    Ready,
    Resumed,
    MessageCreate,
    MessageDelete,
    GuildCreate,
    InteractionCreate,
    Unknown,
    /// A listener raised an error while handling some other event.
    Exception,
}

impl EventType {
    /// Itself plus every declared ancestor, broadest last. A listener
    /// registered under any of these receives the event.
    pub const fn dispatch_ancestors(self) -> &'static [EventType] {
        use EventType::*;

        match self {
            Any => &[Any],
            Connection => &[Connection, Any],
            Connecting => &[Connecting, Connection, Any],
            Connected => &[Connected, Connection, Any],
            Disconnected => &[Disconnected, Connection, Any],
            Identifying => &[Identifying, Connection, Any],
            Reconnecting => &[Reconnecting, Connection, Any],
            Resuming => &[Resuming, Connection, Any],
            Dispatch => &[Dispatch, Any],
            Ready => &[Ready, Dispatch, Any],
            Resumed => &[Resumed, Dispatch, Any],
            MessageCreate => &[MessageCreate, Dispatch, Any],
            MessageDelete => &[MessageDelete, Dispatch, Any],
            GuildCreate => &[GuildCreate, Dispatch, Any],
            InteractionCreate => &[InteractionCreate, Dispatch, Any],
            Unknown => &[Unknown, Dispatch, Any],
            Exception => &[Exception, Any],
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug)]
pub struct Ready {
    pub session_id: String,
    pub resume_gateway_url: String,
    pub application_id: Id,
    pub raw: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct MessageCreate {
    pub id: Id,
    pub channel_id: Id,
    pub content: String,
    pub raw: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct MessageDelete {
    pub id: Id,
    pub channel_id: Id,
    pub raw: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct GuildCreate {
    pub id: Id,
    pub raw: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct InteractionCreate {
    pub id: Id,
    pub raw: serde_json::Value,
}

/// A value tagged by an [`EventType`], dispatched to any listener subscribed
/// to one of [`EventType::dispatch_ancestors`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    Connecting,
    Connected,
    Disconnected { reconnect: bool },
    Identifying,
    Reconnecting,
    Resuming,
    Ready(Ready),
    Resumed,
    MessageCreate(MessageCreate),
    MessageDelete(MessageDelete),
    GuildCreate(GuildCreate),
    InteractionCreate(InteractionCreate),
    /// A dispatch payload with a `t` the dispatcher has no typed consumer
    /// for. Carries the raw event name and body so nothing is silently
    /// dropped.
    Unknown(String, serde_json::Value),
    Exception(ExceptionEvent),
}

impl Event {
    pub const fn kind(&self) -> EventType {
        match self {
            Self::Connecting => EventType::Connecting,
            Self::Connected => EventType::Connected,
            Self::Disconnected { .. } => EventType::Disconnected,
            Self::Identifying => EventType::Identifying,
            Self::Reconnecting => EventType::Reconnecting,
            Self::Resuming => EventType::Resuming,
            Self::Ready(_) => EventType::Ready,
            Self::Resumed => EventType::Resumed,
            Self::MessageCreate(_) => EventType::MessageCreate,
            Self::MessageDelete(_) => EventType::MessageDelete,
            Self::GuildCreate(_) => EventType::GuildCreate,
            Self::InteractionCreate(_) => EventType::InteractionCreate,
            Self::Unknown(..) => EventType::Unknown,
            Self::Exception(_) => EventType::Exception,
        }
    }

    /// The types a listener can be registered under to receive this event.
    pub const fn dispatches(&self) -> &'static [EventType] {
        self.kind().dispatch_ancestors()
    }
}

/// Raised by the dispatcher when a listener's callback returns an error or
/// panics; carried as its own [`Event`] rather than propagated back into the
/// gateway receive loop, so one broken listener can't take down the
/// connection.
#[derive(Clone, Debug)]
pub struct ExceptionEvent {
    pub exception: String,
    pub failed_event: EventType,
    pub failed_listener: u64,
}

impl fmt::Display for ExceptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener {} failed while handling {}: {}",
            self.failed_listener, self.failed_event, self.exception
        )
    }
}

#[cfg(test)]
mod tests {
    use super::EventType;

    #[test]
    fn message_create_ancestors_include_dispatch_and_any() {
        let ancestors = EventType::MessageCreate.dispatch_ancestors();
        assert_eq!(
            ancestors,
            &[EventType::MessageCreate, EventType::Dispatch, EventType::Any]
        );
    }

    #[test]
    fn connecting_ancestors_include_connection_and_any() {
        let ancestors = EventType::Connecting.dispatch_ancestors();
        assert_eq!(
            ancestors,
            &[EventType::Connecting, EventType::Connection, EventType::Any]
        );
    }
}
