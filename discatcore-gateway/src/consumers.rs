//! Built-in [`Consumer`]s that turn a handful of well-known raw dispatch
//! payloads into typed [`Event`]s, per spec §4.3.5's ready-capture
//! requirement and SPEC_FULL's supplemented typed-dispatch set.
//!
//! Every other dispatch name reaching [`Shard`](crate::Shard) with no
//! registered consumer is dispatched directly as `Event::Unknown` by the
//! shard itself (see `shard.rs`), rather than through
//! [`Dispatcher::consume`] — `consume` silently logging a miss is correct
//! for genuinely unregistered names, but Discord sends dozens of dispatch
//! types this crate doesn't model, and those still deserve an event.

use crate::session::Session;
use async_trait::async_trait;
use discatcore_dispatch::{BoxError, Consumer, Dispatcher};
use discatcore_model::{
    event::{Event, GuildCreate, InteractionCreate, MessageCreate, MessageDelete, Ready},
    id::Id,
};
use serde_json::Value;
use std::sync::Arc;

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key)
}

fn id_field(value: &Value, key: &str) -> Id {
    field(value, key)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Id::new)
        .unwrap_or_default()
}

fn str_field(value: &Value, key: &str) -> String {
    field(value, key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Captures `session_id`/`resume_gateway_url` onto the shared [`Session`]
/// before dispatching the typed `Ready` event, per spec §4.3.5.
pub struct ReadyConsumer {
    pub session: Arc<Session>,
}

#[async_trait]
impl Consumer for ReadyConsumer {
    async fn consume(&self, dispatcher: &Dispatcher, payload: Value) -> Result<(), BoxError> {
        let session_id = str_field(&payload, "session_id");
        let resume_gateway_url = str_field(&payload, "resume_gateway_url");

        self.session.set_session_id(session_id.clone());
        self.session.set_resume_url(resume_gateway_url.clone());
        self.session.set_can_resume(true);

        let application_id = field(&payload, "application")
            .map(|application| id_field(application, "id"))
            .unwrap_or_default();

        dispatcher
            .dispatch(Event::Ready(Ready {
                session_id,
                resume_gateway_url,
                application_id,
                raw: payload,
            }))
            .await;

        Ok(())
    }
}

pub struct ResumedConsumer;

#[async_trait]
impl Consumer for ResumedConsumer {
    async fn consume(&self, dispatcher: &Dispatcher, _payload: Value) -> Result<(), BoxError> {
        dispatcher.dispatch(Event::Resumed).await;
        Ok(())
    }
}

pub struct MessageCreateConsumer;

#[async_trait]
impl Consumer for MessageCreateConsumer {
    async fn consume(&self, dispatcher: &Dispatcher, payload: Value) -> Result<(), BoxError> {
        dispatcher
            .dispatch(Event::MessageCreate(MessageCreate {
                id: id_field(&payload, "id"),
                channel_id: id_field(&payload, "channel_id"),
                content: str_field(&payload, "content"),
                raw: payload,
            }))
            .await;
        Ok(())
    }
}

pub struct MessageDeleteConsumer;

#[async_trait]
impl Consumer for MessageDeleteConsumer {
    async fn consume(&self, dispatcher: &Dispatcher, payload: Value) -> Result<(), BoxError> {
        dispatcher
            .dispatch(Event::MessageDelete(MessageDelete {
                id: id_field(&payload, "id"),
                channel_id: id_field(&payload, "channel_id"),
                raw: payload,
            }))
            .await;
        Ok(())
    }
}

pub struct GuildCreateConsumer;

#[async_trait]
impl Consumer for GuildCreateConsumer {
    async fn consume(&self, dispatcher: &Dispatcher, payload: Value) -> Result<(), BoxError> {
        dispatcher
            .dispatch(Event::GuildCreate(GuildCreate {
                id: id_field(&payload, "id"),
                raw: payload,
            }))
            .await;
        Ok(())
    }
}

pub struct InteractionCreateConsumer;

#[async_trait]
impl Consumer for InteractionCreateConsumer {
    async fn consume(&self, dispatcher: &Dispatcher, payload: Value) -> Result<(), BoxError> {
        dispatcher
            .dispatch(Event::InteractionCreate(InteractionCreate {
                id: id_field(&payload, "id"),
                raw: payload,
            }))
            .await;
        Ok(())
    }
}

/// Registers every built-in consumer above under its raw (lowercase)
/// dispatch name.
pub fn register_all(dispatcher: &Dispatcher, session: Arc<Session>) {
    dispatcher.register_consumer("ready", Arc::new(ReadyConsumer { session }));
    dispatcher.register_consumer("resumed", Arc::new(ResumedConsumer));
    dispatcher.register_consumer("message_create", Arc::new(MessageCreateConsumer));
    dispatcher.register_consumer("message_delete", Arc::new(MessageDeleteConsumer));
    dispatcher.register_consumer("guild_create", Arc::new(GuildCreateConsumer));
    dispatcher.register_consumer("interaction_create", Arc::new(InteractionCreateConsumer));
}

/// The raw dispatch names a built-in consumer is registered for — used by
/// the shard to decide whether a `DISPATCH` frame with no consumer match
/// should still produce `Event::Unknown` rather than being silently logged.
pub const KNOWN_DISPATCH_NAMES: [&str; 6] = [
    "ready",
    "resumed",
    "message_create",
    "message_delete",
    "guild_create",
    "interaction_create",
];

#[cfg(test)]
mod tests {
    use super::*;
    use discatcore_dispatch::{BoxError, Listener, ListenerId};
    use discatcore_model::event::EventType;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(Arc<AtomicBool>);

    #[async_trait]
    impl Listener for Flag {
        async fn call(&self, event: Arc<Event>) -> Result<(), BoxError> {
            if matches!(event.as_ref(), Event::Ready(_)) {
                self.0.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn ready_consumer_captures_session_state_and_dispatches() {
        let session = Arc::new(Session::new());
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(AtomicBool::new(false));
        let _: ListenerId = dispatcher.subscribe(EventType::Ready, Arc::new(Flag(Arc::clone(&seen))));

        register_all(&dispatcher, Arc::clone(&session));
        dispatcher.consume(
            "READY",
            serde_json::json!({
                "session_id": "abc123",
                "resume_gateway_url": "wss://gateway.discord.gg",
                "application": {"id": "1"},
            }),
        );

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(session.session_id().as_deref(), Some("abc123"));
        assert_eq!(session.resume_url().as_deref(), Some("wss://gateway.discord.gg"));
        assert!(session.can_resume());
        assert!(seen.load(Ordering::SeqCst));
    }
}
