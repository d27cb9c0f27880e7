//! Typed parsing of Discord's `X-RateLimit-*` response headers.
//!
//! Mirrors the constant-driven, per-field `HeaderParsingError` idiom used by
//! the wider ecosystem rather than a loose `Result<T, String>`.

use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Header names this module reads off a response.
pub mod header_name {
    pub const BUCKET: &str = "x-ratelimit-bucket";
    pub const LIMIT: &str = "x-ratelimit-limit";
    pub const REMAINING: &str = "x-ratelimit-remaining";
    pub const RESET: &str = "x-ratelimit-reset";
    pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
    pub const SCOPE: &str = "x-ratelimit-scope";
    pub const RETRY_AFTER: &str = "retry-after";
    pub const VIA: &str = "via";
}

#[derive(Debug)]
pub struct HeaderParsingError {
    pub(crate) kind: HeaderParsingErrorType,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum HeaderParsingErrorType {
    NotUtf8 { name: &'static str },
    Parsing { name: &'static str, value: String },
}

impl HeaderParsingError {
    pub const fn kind(&self) -> &HeaderParsingErrorType {
        &self.kind
    }

    fn not_utf8(name: &'static str) -> Self {
        Self {
            kind: HeaderParsingErrorType::NotUtf8 { name },
        }
    }

    fn parsing(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind: HeaderParsingErrorType::Parsing {
                name,
                value: value.into(),
            },
        }
    }
}

impl Display for HeaderParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            HeaderParsingErrorType::NotUtf8 { name } => {
                write!(f, "header `{name}` isn't valid UTF-8")
            }
            HeaderParsingErrorType::Parsing { name, value } => {
                write!(f, "header `{name}` with value `{value}` failed to parse")
            }
        }
    }
}

impl Error for HeaderParsingError {}

/// The subset of ratelimit-related headers a response carried, individually
/// optional: routes with no ratelimiting return none of them.
#[derive(Clone, Debug, Default)]
pub struct RatelimitHeaders {
    pub bucket: Option<Box<str>>,
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// UTC seconds since epoch the bucket resets at.
    pub reset_at: Option<f64>,
    pub reset_after: Option<f64>,
    pub scope: Option<Box<str>>,
    pub retry_after: Option<f64>,
    pub via_present: bool,
}

impl RatelimitHeaders {
    /// Parses from an iterator of lowercase-name/value pairs, tolerating
    /// routes that carry none of these headers at all.
    pub fn from_pairs<'a>(
        pairs: impl Iterator<Item = (&'a str, &'a [u8])>,
    ) -> Result<Self, HeaderParsingError> {
        let mut headers = Self::default();

        for (name, value) in pairs {
            match name {
                header_name::BUCKET => {
                    headers.bucket = Some(header_str(header_name::BUCKET, value)?.into());
                }
                header_name::LIMIT => {
                    headers.limit = Some(header_parsed(header_name::LIMIT, value)?);
                }
                header_name::REMAINING => {
                    headers.remaining = Some(header_parsed(header_name::REMAINING, value)?);
                }
                header_name::RESET => {
                    headers.reset_at = Some(header_parsed(header_name::RESET, value)?);
                }
                header_name::RESET_AFTER => {
                    headers.reset_after = Some(header_parsed(header_name::RESET_AFTER, value)?);
                }
                header_name::SCOPE => {
                    headers.scope = Some(header_str(header_name::SCOPE, value)?.into());
                }
                header_name::RETRY_AFTER => {
                    headers.retry_after = Some(header_parsed(header_name::RETRY_AFTER, value)?);
                }
                header_name::VIA => headers.via_present = true,
                _ => {}
            }
        }

        Ok(headers)
    }
}

fn header_str<'a>(name: &'static str, value: &'a [u8]) -> Result<&'a str, HeaderParsingError> {
    std::str::from_utf8(value).map_err(|_| HeaderParsingError::not_utf8(name))
}

fn header_parsed<T: std::str::FromStr>(
    name: &'static str,
    value: &[u8],
) -> Result<T, HeaderParsingError> {
    let text = header_str(name, value)?;
    text.parse()
        .map_err(|_| HeaderParsingError::parsing(name, text))
}

#[cfg(test)]
mod tests {
    use super::RatelimitHeaders;

    #[test]
    fn parses_present_headers() {
        let pairs: Vec<(&str, &[u8])> = vec![
            ("x-ratelimit-bucket", b"abcd1234"),
            ("x-ratelimit-limit", b"5"),
            ("x-ratelimit-remaining", b"4"),
            ("x-ratelimit-reset", b"1470173023.123"),
            ("x-ratelimit-reset-after", b"1.123"),
        ];

        let headers = RatelimitHeaders::from_pairs(pairs.into_iter()).unwrap();
        assert_eq!(headers.bucket.as_deref(), Some("abcd1234"));
        assert_eq!(headers.limit, Some(5));
        assert_eq!(headers.remaining, Some(4));
        assert_eq!(headers.reset_after, Some(1.123));
    }

    #[test]
    fn tolerates_no_ratelimit_headers() {
        let headers = RatelimitHeaders::from_pairs(std::iter::empty()).unwrap();
        assert_eq!(headers.bucket, None);
        assert_eq!(headers.limit, None);
    }

    #[test]
    fn errors_on_unparseable_value() {
        let pairs: Vec<(&str, &[u8])> = vec![("x-ratelimit-limit", b"not-a-number")];
        assert!(RatelimitHeaders::from_pairs(pairs.into_iter()).is_err());
    }
}
