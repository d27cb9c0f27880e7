//! A data-driven request descriptor: one generic [`Route`] plus a handful of
//! example constructors, rather than a hand-written wrapper per REST
//! endpoint.
//!
//! Grounded on `discatcore`'s original Python `Route`
//! (`endpoint`/`bucket` properties derived from a `str.format_map` over the
//! same params dict, top-level params kept, everything else erased to
//! `None`).

use discatcore_http_ratelimiting::TOP_LEVEL_PARAMS;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable request descriptor: an HTTP method, an unformatted path
/// template (`{guild_id}`-style placeholders), and the named parameters to
/// substitute into it.
#[derive(Clone, Debug)]
pub struct Route {
    method: Method,
    path: &'static str,
    params: Vec<(&'static str, String)>,
}

impl Route {
    pub fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    pub const fn method(&self) -> Method {
        self.method
    }

    /// The path with every parameter substituted and percent-encoded.
    pub fn endpoint(&self) -> String {
        let mut endpoint = self.path.to_string();

        for (name, value) in &self.params {
            let encoded = utf8_percent_encode(value, NON_ALPHANUMERIC).to_string();
            endpoint = endpoint.replace(&format!("{{{name}}}"), &encoded);
        }

        endpoint
    }

    /// `METHOD:template-with-only-top-level-params-substituted`. Discord
    /// shares ratelimit buckets across requests differing only in
    /// non-top-level parameters, so every other placeholder is erased to
    /// the literal `None` before hashing.
    pub fn pseudo_bucket(&self) -> String {
        let mut template = self.path.to_string();

        for (name, value) in &self.params {
            let substitution: &str = if TOP_LEVEL_PARAMS.contains(name) {
                value.as_str()
            } else {
                "None"
            };
            template = template.replace(&format!("{{{name}}}"), substitution);
        }

        format!("{}:{template}", self.method)
    }
}

/// A small set of example routes demonstrating the generic descriptor, not
/// an exhaustive endpoint catalog.
pub mod routes {
    use super::{Method, Route};
    use crate::{client::Body2, unset::Maybe};
    use discatcore_model::id::Id;

    pub fn get_gateway_bot() -> Route {
        Route::new(Method::Get, "/gateway/bot")
    }

    pub fn get_guild(guild_id: Id) -> Route {
        Route::new(Method::Get, "/guilds/{guild_id}").param("guild_id", guild_id)
    }

    pub fn create_message(channel_id: Id) -> Route {
        Route::new(Method::Post, "/channels/{channel_id}/messages").param("channel_id", channel_id)
    }

    pub fn edit_message(channel_id: Id, message_id: Id) -> Route {
        Route::new(Method::Patch, "/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", channel_id)
            .param("message_id", message_id)
    }

    /// Fields for [`edit_message`]: `content`/`embeds` left `Unset` aren't
    /// serialized at all (leaving the existing value untouched), `Null`
    /// clears the field, and `Set` replaces it.
    #[derive(Clone, Debug, Default)]
    pub struct EditMessageFields {
        pub content: Maybe<String>,
        pub embeds: Maybe<Vec<serde_json::Value>>,
    }

    impl EditMessageFields {
        pub fn build(self) -> Body2 {
            let json = crate::unset::build_json([
                ("content", self.content.map(serde_json::Value::String)),
                ("embeds", self.embeds.map(|embeds| serde_json::Value::Array(embeds))),
            ]);

            Body2 {
                json: Some(json),
                ..Body2::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        routes::{edit_message, EditMessageFields},
        Method, Route,
    };
    use crate::unset::Maybe;

    #[test]
    fn pseudo_bucket_keeps_only_top_level_params() {
        let a = Route::new(Method::Get, "/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", 1)
            .param("message_id", 111);
        let b = Route::new(Method::Get, "/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", 1)
            .param("message_id", 222);

        assert_eq!(a.pseudo_bucket(), b.pseudo_bucket());
        assert_eq!(a.pseudo_bucket(), "GET:/channels/1/messages/None");
    }

    #[test]
    fn pseudo_bucket_differs_across_top_level_params() {
        let a = Route::new(Method::Get, "/channels/{channel_id}/messages").param("channel_id", 1);
        let b = Route::new(Method::Get, "/channels/{channel_id}/messages").param("channel_id", 2);

        assert_ne!(a.pseudo_bucket(), b.pseudo_bucket());
    }

    #[test]
    fn endpoint_substitutes_and_encodes_every_param() {
        let route = Route::new(Method::Post, "/channels/{channel_id}/messages").param("channel_id", 123);
        assert_eq!(route.endpoint(), "/channels/123/messages");
    }

    #[test]
    fn edit_message_fields_build_drops_unset_and_keeps_null() {
        let body = EditMessageFields {
            content: Maybe::Set("hi".to_string()),
            embeds: Maybe::Null,
        }
        .build();

        let json = body.json.expect("build sets a json body");
        assert_eq!(json.get("content"), Some(&serde_json::json!("hi")));
        assert_eq!(json.get("embeds"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn edit_message_route_is_patch_with_both_ids() {
        let route = edit_message(discatcore_model::id::Id::new(1), discatcore_model::id::Id::new(2));
        assert_eq!(route.method(), Method::Patch);
        assert_eq!(route.endpoint(), "/channels/1/messages/2");
    }
}
