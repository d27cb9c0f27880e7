//! Customizable configuration for a [`Shard`](crate::Shard).
//!
//! Grounded on `twilight-gateway`'s `config.rs`: a plain [`Config`] built
//! through a [`ConfigBuilder`], validated eagerly so a misconfigured shard
//! fails at construction time rather than deep inside the connection loop.

use discatcore_model::Intents;
use std::time::Duration;

const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
const SUPPORTED_API_VERSIONS: [u8; 2] = [9, 10];
const DEFAULT_API_VERSION: u8 = 10;

/// Configuration used by a [`Shard`](crate::Shard) to identify with the
/// gateway and operate.
///
/// Use [`Config::builder`] to start configuring a shard.
#[derive(Clone, Debug)]
pub struct Config {
    token: Box<str>,
    intents: Intents,
    api_version: u8,
    heartbeat_timeout: Duration,
    gateway_url: Option<Box<str>>,
}

impl Config {
    /// Shortcut for `Config::builder(token, intents).build()`.
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self::builder(token, intents).build()
    }

    pub fn builder(token: impl Into<String>, intents: Intents) -> ConfigBuilder {
        ConfigBuilder::new(token, intents)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub const fn intents(&self) -> Intents {
        self.intents
    }

    pub const fn api_version(&self) -> u8 {
        self.api_version
    }

    pub const fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    pub fn gateway_url(&self) -> Option<&str> {
        self.gateway_url.as_deref()
    }
}

/// A builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self(Config {
            token: token.into().into_boxed_str(),
            intents,
            api_version: DEFAULT_API_VERSION,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            gateway_url: None,
        })
    }

    pub fn build(self) -> Config {
        self.0
    }

    /// Sets the Discord API version to request (`9` or `10`). A value
    /// outside that set is a non-fatal warning, not a build failure: it's
    /// logged and [`Config::api_version`] falls back to the default.
    pub fn api_version(mut self, version: u8) -> Self {
        if SUPPORTED_API_VERSIONS.contains(&version) {
            self.0.api_version = version;
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(requested = version, fallback = DEFAULT_API_VERSION, "unsupported api version");
            #[cfg(not(feature = "tracing"))]
            let _ = version;

            self.0.api_version = DEFAULT_API_VERSION;
        }

        self
    }

    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.0.heartbeat_timeout = timeout;
        self
    }

    /// Overrides the URL the shard connects to, bypassing the `/gateway/bot`
    /// lookup on the first `connect`.
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.0.gateway_url = Some(url.into().into_boxed_str());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigBuilder};
    use discatcore_model::Intents;
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(Config: Clone, Debug, Send, Sync);
    assert_impl_all!(ConfigBuilder: Clone, Debug, Send, Sync);

    #[test]
    fn defaults_to_api_version_ten_and_a_thirty_second_timeout() {
        let config = Config::new("token", Intents::empty());
        assert_eq!(config.api_version(), 10);
        assert_eq!(config.heartbeat_timeout(), std::time::Duration::from_secs(30));
    }

    #[test]
    fn falls_back_to_the_default_version_when_unsupported() {
        let config = Config::builder("token", Intents::empty()).api_version(7).build();
        assert_eq!(config.api_version(), 10);
    }

    #[test]
    fn accepts_api_version_nine() {
        let config = Config::builder("token", Intents::empty()).api_version(9).build();
        assert_eq!(config.api_version(), 9);
    }
}
