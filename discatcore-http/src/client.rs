//! The REST client's request loop.
//!
//! Grounded on `discatcore`'s original Python `HTTPClient.request`: acquire
//! the global lock, then the route's bucket, send, update bucket accounting
//! from the response, migrate the bucket to its server hash the first time
//! one is seen, and retry up to `MAX_TRIES` times for a ratelimit or a
//! transient 5xx. A 429 with no `Via` header is treated as a Cloudflare ban
//! rather than a Discord ratelimit and is not retried.

use crate::{
    error::{ApiError, Error, ErrorType},
    route::Route,
};
use discatcore_http_ratelimiting::{HeaderParsingError, RatelimitHeaders, Ratelimiter};
use hyper::{
    body,
    client::{Client as HyperClient, HttpConnector},
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Body, Request as HyperRequest, StatusCode,
};
use std::time::Duration;

#[cfg(feature = "rustls-native-roots")]
type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
#[cfg(not(feature = "rustls-native-roots"))]
type HttpsConnector = HttpConnector;

const DEFAULT_API_VERSION: u8 = 10;
const SUPPORTED_API_VERSIONS: [u8; 2] = [9, 10];
const MAX_TRIES: u8 = 5;

/// A Discord REST API client: a thin wrapper over a `hyper` client plus the
/// [`Ratelimiter`] every request is routed through.
#[derive(Debug)]
pub struct Client {
    http: HyperClient<HttpsConnector, Body>,
    token: Box<str>,
    base_url: Box<str>,
    ratelimiter: Ratelimiter,
}

/// Validates a requested API version against [`SUPPORTED_API_VERSIONS`],
/// warning and falling back to [`DEFAULT_API_VERSION`] rather than failing
/// outright — an unsupported version is a non-fatal warning, not a hard
/// error.
fn resolve_api_version(requested: Option<u8>) -> u8 {
    match requested {
        Some(version) if SUPPORTED_API_VERSIONS.contains(&version) => version,
        Some(version) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(requested = version, fallback = DEFAULT_API_VERSION, "unsupported api version");
            #[cfg(not(feature = "tracing"))]
            let _ = version;

            DEFAULT_API_VERSION
        }
        None => DEFAULT_API_VERSION,
    }
}

/// A request body, already JSON-encoded, or multipart with an optional
/// `payload_json` field alongside file attachments.
#[derive(Debug, Default)]
pub struct Body2 {
    pub json: Option<serde_json::Value>,
    pub files: Vec<(String, Vec<u8>)>,
    pub reason: Option<String>,
}

impl Client {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_version(token, None)
    }

    /// Builds a client targeting a specific Discord API version. `None` and
    /// any version outside [`SUPPORTED_API_VERSIONS`] fall back to
    /// [`DEFAULT_API_VERSION`].
    pub fn with_api_version(token: impl Into<String>, api_version: Option<u8>) -> Self {
        let version = resolve_api_version(api_version);

        Self {
            http: build_http_client(),
            token: token.into().into_boxed_str(),
            base_url: format!("https://discord.com/api/v{version}").into_boxed_str(),
            ratelimiter: Ratelimiter::new(),
        }
    }

    /// The base URL requests are sent against, e.g.
    /// `https://discord.com/api/v10`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `route`, retrying on ratelimits and transient server errors,
    /// and returns the raw response body on success.
    pub async fn request(&self, route: Route, body: Body2) -> Result<Vec<u8>, Error> {
        let pseudo_bucket = route.pseudo_bucket();

        for attempt in 0..MAX_TRIES {
            self.ratelimiter.global_bucket().acquire().await;

            let bucket = self.ratelimiter.get_bucket(&pseudo_bucket).await;
            bucket.acquire().await;

            // Snapshot whether this bucket was still pseudo-keyed *before*
            // sending: if the response tells us its server hash, we only
            // need to migrate when we didn't already know it.
            let was_unresolved = bucket.server_hash().is_none();

            let request = build_request(&route, &self.base_url, &self.token, &body)?;
            let response = self
                .http
                .request(request)
                .await
                .map_err(|source| Error::new(ErrorType::RequestError, Some(Box::new(source))))?;

            let status = response.status();
            let headers = parse_ratelimit_headers(response.headers())
                .map_err(|source| Error::new(ErrorType::RequestError, Some(Box::new(source))))?;

            bucket.update_from_response(&headers, status.as_u16());

            if was_unresolved {
                if let Some(hash) = &headers.bucket {
                    self.ratelimiter.migrate_bucket(&pseudo_bucket, hash).await;
                }
            }

            if status.is_success() {
                let body = body::to_bytes(response.into_body())
                    .await
                    .map_err(|source| Error::new(ErrorType::RequestError, Some(Box::new(source))))?;
                return Ok(body.to_vec());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let body = body::to_bytes(response.into_body())
                    .await
                    .map_err(|source| Error::new(ErrorType::RequestError, Some(Box::new(source))))?;

                if !headers.via_present {
                    // No `Via` header means this never reached Discord's
                    // edge: a Cloudflare-level ban, not a ratelimit, so
                    // retrying would just burn more tries against the ban.
                    return Err(Error::new(
                        ErrorType::Response {
                            body: body.to_vec(),
                            error: ApiError::from_body(&body),
                            status: status.as_u16(),
                        },
                        None,
                    ));
                }

                if headers.scope.as_deref() == Some("global") {
                    let retry_after = headers.retry_after.unwrap_or(1.0);
                    self.ratelimiter
                        .global_bucket()
                        .lock_for(Duration::from_secs_f64(retry_after));
                }

                continue;
            }

            if matches!(status.as_u16(), 500 | 502 | 504) {
                tokio::time::sleep(Duration::from_secs(1 + u64::from(attempt) * 2)).await;
                continue;
            }

            let body = body::to_bytes(response.into_body())
                .await
                .map_err(|source| Error::new(ErrorType::RequestError, Some(Box::new(source))))?;

            return Err(Error::new(
                ErrorType::Response {
                    body: body.to_vec(),
                    error: ApiError::from_body(&body),
                    status: status.as_u16(),
                },
                None,
            ));
        }

        Err(Error::new(ErrorType::ExhaustedRetries, None))
    }
}

fn build_http_client() -> HyperClient<HttpsConnector, Body> {
    #[cfg(feature = "rustls-native-roots")]
    {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_only()
            .enable_http1()
            .enable_http2()
            .build();
        HyperClient::builder().build(connector)
    }

    #[cfg(not(feature = "rustls-native-roots"))]
    {
        HyperClient::builder().build(HttpConnector::new())
    }
}

fn build_request(route: &Route, base_url: &str, token: &str, body: &Body2) -> Result<HyperRequest<Body>, Error> {
    let url = format!("{base_url}{}", route.endpoint());

    let mut builder = HyperRequest::builder()
        .method(route.method().as_str())
        .uri(url)
        .header(AUTHORIZATION, format!("Bot {token}"))
        .header(USER_AGENT, concat!("DiscordBot (discatcore, ", env!("CARGO_PKG_VERSION"), ")"));

    if let Some(reason) = &body.reason {
        let encoded = percent_encoding::utf8_percent_encode(reason, percent_encoding::NON_ALPHANUMERIC).to_string();
        builder = builder.header("x-audit-log-reason", encoded);
    }

    let hyper_body = if !body.files.is_empty() {
        let (content_type, multipart_body) = build_multipart(body)?;
        builder = builder.header(CONTENT_TYPE, content_type);
        Body::from(multipart_body)
    } else if let Some(json) = &body.json {
        builder = builder.header(CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
    } else {
        Body::empty()
    };

    builder
        .body(hyper_body)
        .map_err(|source| Error::new(ErrorType::BuildingRequest, Some(Box::new(source))))
}

/// Builds a `multipart/form-data` body with a `payload_json` field (if any
/// JSON accompanies the files) plus one `files[n]` field per attachment.
/// Boundary generation follows the same alphanumeric-random approach the
/// wider ecosystem uses for multipart boundaries.
fn build_multipart(body: &Body2) -> Result<(String, Vec<u8>), Error> {
    use rand::{distributions::Alphanumeric, Rng};

    let boundary: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(15)
        .map(char::from)
        .collect();

    let mut out = Vec::new();

    if let Some(json) = &body.json {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(b"Content-Disposition: form-data; name=\"payload_json\"\r\n");
        out.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
        out.extend_from_slice(json.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    for (index, (filename, content)) in body.files.iter().enumerate() {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files[{index}]\"; filename=\"{filename}\"\r\n").as_bytes(),
        );
        out.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        out.extend_from_slice(content);
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok((format!("multipart/form-data; boundary={boundary}"), out))
}

fn parse_ratelimit_headers(headers: &HeaderMap<HeaderValue>) -> Result<RatelimitHeaders, HeaderParsingError> {
    let pairs = headers
        .iter()
        .map(|(name, value): (&HeaderName, &HeaderValue)| (name.as_str(), value.as_bytes()));

    RatelimitHeaders::from_pairs(pairs)
}

#[cfg(test)]
mod tests {
    use super::{build_request, Client};
    use crate::{
        route::routes::{edit_message, EditMessageFields},
        unset::Maybe,
    };
    use discatcore_model::id::Id;
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(Client: Debug, Send, Sync);

    #[test]
    fn new_stores_the_token() {
        let client = Client::new("abc");
        assert_eq!(&*client.token, "abc");
    }

    #[test]
    fn unset_fields_are_filtered_before_reaching_build_request() {
        let route = edit_message(Id::new(1), Id::new(2));
        let body = EditMessageFields {
            content: Maybe::Set("updated".to_string()),
            embeds: Maybe::Unset,
        }
        .build();

        // The filtering has to happen in `EditMessageFields::build`, not in
        // `build_request`: by the time the body reaches here it's already a
        // plain `serde_json::Value` with no `Unset` fields left to drop.
        let json = body.json.as_ref().expect("build sets a json body");
        assert_eq!(json.get("content"), Some(&serde_json::json!("updated")));
        assert!(json.get("embeds").is_none());

        let request = build_request(&route, "https://discord.com/api/v10", "tok", &body).unwrap();
        assert_eq!(request.method(), "PATCH");
        assert_eq!(
            request.headers().get(hyper::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
