#![deny(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    unsafe_code,
    unused
)]
#![allow(clippy::module_name_repetitions)]

//! Typed publish/subscribe event fanout: one spawned task per listener per
//! dispatched event, with listener failures re-routed through
//! [`ExceptionEvent`] instead of ever reaching the task that produced the
//! event.
//!
//! Grounded on `discatcore`'s original Python `Dispatcher`/`Event`
//! (`_schedule_task` spawning one `asyncio.Task` per callback, catching
//! everything but cancellation and routing it to an error handler) and on
//! `twilight-gateway`'s `listener.rs` `ListenersRef<T>` shape
//! (atomically-assigned listener ids keyed in a `DashMap`), generalized from
//! "one channel per listener" to "one task per dispatched event per
//! listener" to match the isolated-task-execution requirement.

use async_trait::async_trait;
use dashmap::DashMap;
use discatcore_model::event::{Event, EventType, ExceptionEvent};
use std::{
    error::Error as StdError,
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An async callback subscribed under one or more [`EventType`]s.
///
/// `async fn(&self, event: Arc<Event>) -> Result<(), BoxError>` rather than a
/// bare `Fn` pointer: `async_trait` is how the wider ecosystem (e.g.
/// `serenity`'s `EventHandler`) gives listeners a real `async fn` instead of
/// a closure returning a boxed future by hand.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn call(&self, event: Arc<Event>) -> Result<(), BoxError>;
}

/// Parses a raw, already-lowercased Gateway dispatch name's payload into a
/// typed [`Event`] and dispatches it.
///
/// Registered per raw event name (`"ready"`, `"message_create"`, ...) rather
/// than per [`EventType`]: the Gateway client only knows the wire name `t`
/// carries, not which [`EventType`] it maps to, until a consumer is looked
/// up for it.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(&self, dispatcher: &Dispatcher, payload: serde_json::Value) -> Result<(), BoxError>;
}

/// Opaque handle returned by [`Dispatcher::subscribe`], used to
/// [`Dispatcher::unsubscribe`] later.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerId(u64);

struct Inner {
    next_id: AtomicU64,
    listeners: DashMap<EventType, Vec<(ListenerId, Arc<dyn Listener>)>>,
    consumers: DashMap<Box<str>, Arc<dyn Consumer>>,
}

impl Debug for Inner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("listener_types", &self.listeners.len())
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

/// A mapping from [`EventType`] to an ordered list of listeners, plus a
/// mapping from raw Gateway event name to the [`Consumer`] that turns its
/// payload into a typed [`Event`].
///
/// Cheap to clone: the shared state lives behind an [`Arc`], matching
/// `twilight-gateway`'s `Listeners<T>` clone-a-handle idiom.
#[derive(Clone, Debug)]
pub struct Dispatcher(Arc<Inner>);

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            next_id: AtomicU64::new(0),
            listeners: DashMap::new(),
            consumers: DashMap::new(),
        }))
    }

    /// Appends `listener` to the list for `event_type`. Returns a handle
    /// usable with [`Dispatcher::unsubscribe`].
    pub fn subscribe(&self, event_type: EventType, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.0.next_id.fetch_add(1, Ordering::Relaxed));
        self.0.listeners.entry(event_type).or_default().push((id, listener));
        id
    }

    /// Removes a previously subscribed listener. Removes the `event_type`
    /// entry entirely once its listener list is empty.
    pub fn unsubscribe(&self, event_type: EventType, id: ListenerId) -> bool {
        let Some(mut listeners) = self.0.listeners.get_mut(&event_type) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            drop(listeners);
            self.0.listeners.remove(&event_type);
        }

        removed
    }

    /// Registers the [`Consumer`] for a raw, lowercased Gateway dispatch
    /// name. Replaces any previously registered consumer for that name.
    pub fn register_consumer(&self, raw_name: impl Into<String>, consumer: Arc<dyn Consumer>) {
        self.0.consumers.insert(raw_name.into().into_boxed_str(), consumer);
    }

    /// Looks up the consumer for `raw_name` (case-insensitively) and spawns
    /// a task invoking it with `payload`. Logs and returns if no consumer is
    /// registered; invariant 4 (every listener scheduled exactly once) still
    /// holds trivially since nothing is scheduled.
    pub fn consume(&self, raw_name: &str, payload: serde_json::Value) {
        let lowered = raw_name.to_ascii_lowercase();

        let Some(consumer) = self.0.consumers.get(lowered.as_str()).map(|entry| Arc::clone(&entry)) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(name = %lowered, "no consumer registered for dispatch event");
            return;
        };

        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(error) = consumer.consume(&dispatcher, payload).await {
                #[cfg(feature = "tracing")]
                tracing::error!(name = %lowered, %error, "consumer failed while parsing a dispatch payload");
                #[cfg(not(feature = "tracing"))]
                let _ = &lowered;

                dispatcher
                    .dispatch(Event::Exception(ExceptionEvent {
                        exception: error.to_string(),
                        failed_event: EventType::Dispatch,
                        failed_listener: 0,
                    }))
                    .await;
            }
        });
    }

    /// Schedules every listener subscribed to any of `event.dispatches()`
    /// on its own task and returns a future resolving once all of them have
    /// completed. Listeners for a given event type are *scheduled* in
    /// subscription order; completion order across tasks is unspecified.
    pub fn dispatch(&self, event: Event) -> impl std::future::Future<Output = ()> {
        let event = Arc::new(event);
        let mut handles = Vec::new();

        for event_type in event.dispatches() {
            let Some(listeners) = self.0.listeners.get(event_type) else {
                continue;
            };

            for (id, listener) in listeners.iter() {
                let listener = Arc::clone(listener);
                let event = Arc::clone(&event);
                let dispatcher = self.clone();
                let id = *id;

                handles.push(tokio::spawn(async move {
                    run_listener(&dispatcher, id, listener, event).await;
                }));
            }
        }

        async move {
            for handle in handles {
                // A listener panicking must not take down the caller driving
                // `dispatch`; swallow the join error the same way cancellation
                // is swallowed inside `run_listener`.
                let _ = handle.await;
            }
        }
    }
}

/// Runs one listener's callback in isolation: a panic or returned error
/// never propagates past this function, it's turned into an
/// [`ExceptionEvent`] (unless the failing event already *is* one, which
/// would recurse).
async fn run_listener(dispatcher: &Dispatcher, id: ListenerId, listener: Arc<dyn Listener>, event: Arc<Event>) {
    let result = listener.call(Arc::clone(&event)).await;

    let Err(error) = result else {
        return;
    };

    if let Event::Exception(existing) = event.as_ref() {
        #[cfg(feature = "tracing")]
        tracing::error!(
            listener = id.0,
            original = %existing,
            %error,
            "listener handling an ExceptionEvent itself failed; not re-dispatching to avoid recursion"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = existing;
        return;
    }

    dispatcher
        .dispatch(Event::Exception(ExceptionEvent {
            exception: error.to_string(),
            failed_event: event.kind(),
            failed_listener: id.0,
        }))
        .await;
}

#[cfg(test)]
mod tests {
    use super::{BoxError, Dispatcher, Listener, ListenerId};
    use async_trait::async_trait;
    use discatcore_model::event::{Event, EventType};
    use static_assertions::assert_impl_all;
    use std::{
        fmt::Debug,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    assert_impl_all!(Dispatcher: Clone, Debug, Send, Sync);
    assert_impl_all!(ListenerId: Clone, Copy, Debug, Send, Sync);

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Listener for Counting {
        async fn call(&self, _event: Arc<Event>) -> Result<(), BoxError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Listener for Failing {
        async fn call(&self, _event: Arc<Event>) -> Result<(), BoxError> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn listener_on_ancestor_type_receives_descendant_events() {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(EventType::Dispatch, Arc::new(Counting(Arc::clone(&count))));

        dispatcher
            .dispatch(Event::MessageDelete(discatcore_model::event::MessageDelete {
                id: Default::default(),
                channel_id: Default::default(),
                raw: serde_json::Value::Null,
            }))
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_dispatches() {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let id = dispatcher.subscribe(EventType::Ready, Arc::new(Counting(Arc::clone(&count))));

        assert!(dispatcher.unsubscribe(EventType::Ready, id));
        dispatcher
            .dispatch(Event::Resumed)
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_listener_produces_an_exception_event_not_a_panic() {
        let dispatcher = Dispatcher::new();
        let caught = Arc::new(AtomicUsize::new(0));

        struct CatchesExceptions(Arc<AtomicUsize>);
        #[async_trait]
        impl Listener for CatchesExceptions {
            async fn call(&self, event: Arc<Event>) -> Result<(), BoxError> {
                if matches!(event.as_ref(), Event::Exception(_)) {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        }

        dispatcher.subscribe(EventType::Exception, Arc::new(CatchesExceptions(Arc::clone(&caught))));
        dispatcher.subscribe(EventType::Resumed, Arc::new(Failing));

        dispatcher.dispatch(Event::Resumed).await;
        assert_eq!(caught.load(Ordering::SeqCst), 1);
    }
}
