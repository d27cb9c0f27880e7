#![deny(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    unsafe_code,
    unused
)]
#![allow(clippy::module_name_repetitions)]

//! A single Gateway connection's state machine: the [`Shard`] that drives
//! `connect`/identify-or-resume/heartbeat/receive, the [`Config`] it's built
//! from, and the consumers that turn a handful of dispatch payloads into
//! session state before the event ever reaches user code.

mod config;
mod consumers;
mod error;
mod heartbeat;
mod inflater;
mod ratelimiter;
mod session;
mod shard;
mod socket;
mod stage;

pub use crate::{
    config::{Config, ConfigBuilder},
    error::{CloseOutcome, Error, ErrorType, GatewayReconnect},
    ratelimiter::CommandRatelimiter,
    session::Session,
    shard::Shard,
    stage::{Stage, StageConversionError},
};
