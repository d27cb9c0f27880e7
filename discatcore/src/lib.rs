#![deny(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    unsafe_code,
    unused
)]
#![allow(clippy::module_name_repetitions)]

//! Wires [`discatcore_http`], [`discatcore_gateway`], and
//! [`discatcore_dispatch`] into one [`Client`], the way the teacher's
//! top-level `twilight` crate re-exports its split-out pieces — except
//! here the pieces also get assembled, not just re-exported, since a bot
//! needs one REST client and one gateway connection sharing a token.

use discatcore_gateway::{Config, Shard};
use discatcore_model::Intents;
use std::time::Duration;

pub use discatcore_dispatch::{BoxError, Consumer, Dispatcher, Listener, ListenerId};
pub use discatcore_gateway::{self as gateway, CloseOutcome, Error as GatewayError, GatewayReconnect, Session, Stage};
pub use discatcore_http::{self as http, ApiError, Body2, Client as HttpClient, Error as HttpError, Method, Route};
pub use discatcore_model as model;

/// The top-level client: a REST client and a Gateway shard sharing one
/// bot token, plus the dispatcher the shard feeds.
#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    shard: Shard,
}

impl Client {
    /// Shortcut for `Client::builder(token, intents).build()`.
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self::builder(token, intents).build()
    }

    pub fn builder(token: impl Into<String>, intents: Intents) -> ClientBuilder {
        ClientBuilder::new(token, intents)
    }

    /// The REST client, for issuing requests independent of the gateway
    /// connection's own lifecycle.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// The gateway connection driving this client's events.
    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    /// The dispatcher events are fanned out through; subscribe listeners
    /// here before calling [`run`](Self::run).
    pub fn dispatcher(&self) -> &Dispatcher {
        self.shard.dispatcher()
    }

    /// Runs the gateway connection until it's told not to reconnect.
    pub async fn run(&self) -> Result<(), GatewayError> {
        self.shard.run().await
    }
}

/// Builds a [`Client`] from a token, intents, and whatever the defaults
/// (API version `10`, a 30-second zombie-heartbeat timeout, no pinned
/// gateway URL) don't already cover.
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    token: String,
    intents: Intents,
    api_version: Option<u8>,
    gateway_url: Option<String>,
    heartbeat_timeout: Option<Duration>,
}

impl ClientBuilder {
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            api_version: None,
            gateway_url: None,
            heartbeat_timeout: None,
        }
    }

    /// The Discord API version to request (`9` or `10`). Applies to both
    /// the REST client and the `/gateway/bot` lookup.
    pub fn api_version(mut self, version: u8) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Pins the gateway URL, bypassing the `/gateway/bot` lookup on the
    /// first connection.
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// How long without a `HEARTBEAT_ACK` before the connection is
    /// considered zombied and force-reconnected.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Client {
        let mut gateway_config = Config::builder(self.token.clone(), self.intents);

        if let Some(version) = self.api_version {
            gateway_config = gateway_config.api_version(version);
        }
        if let Some(url) = self.gateway_url {
            gateway_config = gateway_config.gateway_url(url);
        }
        if let Some(timeout) = self.heartbeat_timeout {
            gateway_config = gateway_config.heartbeat_timeout(timeout);
        }

        let config = gateway_config.build();
        let http = HttpClient::with_api_version(self.token, Some(config.api_version()));
        let shard = Shard::new(config, Dispatcher::new());

        Client { http, shard }
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use discatcore_model::Intents;

    #[test]
    fn builder_shares_the_resolved_api_version_between_http_and_gateway() {
        let client = Client::builder("token", Intents::empty()).api_version(9).build();
        assert_eq!(client.http().base_url(), "https://discord.com/api/v9");
        assert_eq!(client.shard().stage(), discatcore_gateway::Stage::Disconnected);
    }
}
