#![deny(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    unsafe_code,
    unused
)]
#![allow(clippy::module_name_repetitions)]

//! Shared wire types for the `discatcore` Discord client runtime: snowflake
//! ids, gateway intents, gateway payload envelopes, and the typed event
//! hierarchy the dispatcher fans events out through.
//!
//! Domain object modeling (guilds, messages, channels, embeds, ...) is
//! intentionally out of scope; [`serde_json::Value`] carries whatever a
//! payload doesn't model explicitly.

pub mod event;
pub mod gateway;
pub mod id;
pub mod intents;

pub use event::{Event, EventType, ExceptionEvent};
pub use gateway::OpCode;
pub use id::Id;
pub use intents::Intents;
