#![deny(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    unsafe_code,
    unused
)]
#![allow(clippy::module_name_repetitions)]

//! A Discord REST API client: request building, the `Unset`/`Null`/`Set`
//! JSON sentinel, and the ratelimit-aware [`Client::request`] loop.

pub mod client;
pub mod error;
pub mod route;
pub mod unset;

pub use crate::{
    client::{Body2, Client},
    error::{ApiError, Error, ErrorType},
    route::{Method, Route},
    unset::Maybe,
};
