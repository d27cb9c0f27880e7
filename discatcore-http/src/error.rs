use serde::{Deserialize, Serialize};
use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// An error from the REST client.
#[derive(Debug)]
pub struct Error {
    pub(crate) kind: ErrorType,
    pub(crate) source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorType, source: Option<Box<dyn StdError + Send + Sync>>) -> Self {
        Self { kind, source }
    }

    /// Returns the type of error that occurred.
    pub const fn kind(&self) -> &ErrorType {
        &self.kind
    }

    /// Consumes the error, returning its source.
    pub fn into_source(self) -> Option<Box<dyn StdError + Send + Sync>> {
        self.source
    }

    /// Consumes the error, returning its parts.
    pub fn into_parts(self) -> (ErrorType, Option<Box<dyn StdError + Send + Sync>>) {
        (self.kind, self.source)
    }
}

/// The type of error that occurred.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorType {
    /// Building the request failed, e.g. a malformed header value.
    BuildingRequest,
    /// Sending the request over the wire failed.
    RequestError,
    /// Response body could not be parsed as JSON where JSON was expected.
    Parsing { body: Vec<u8> },
    /// A request failed after `max_tries` attempts with no retriable
    /// status ever turning into success.
    ExhaustedRetries,
    /// A non-2xx, non-retriable response. Also covers a 429 response with
    /// no `Via` header (a Cloudflare ban rather than a Discord ratelimit),
    /// which is surfaced here rather than retried.
    Response {
        body: Vec<u8>,
        error: ApiError,
        status: u16,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ErrorType::BuildingRequest => f.write_str("failed to build the request"),
            ErrorType::RequestError => f.write_str("sending the request failed"),
            ErrorType::Parsing { .. } => f.write_str("response body failed to parse"),
            ErrorType::ExhaustedRetries => {
                f.write_str("request did not complete after the maximum number of tries")
            }
            ErrorType::Response { error, status, .. } => {
                write!(f, "response error: status code {status}: {error}")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

/// A parsed Discord API error body: `{code, message, errors}`, with nested
/// field errors already flattened into dotted paths.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ApiError {
    pub code: u64,
    pub message: String,
    /// `dotted.field.path -> joined human-readable messages`, flattened
    /// from Discord's `{field: {..., _errors: [{message, code}]}}` nested
    /// error body shape.
    pub errors: Vec<(String, String)>,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} (error code: {})", self.message, self.code)?;

        for (path, message) in &self.errors {
            write!(f, "\nin {path}: {message}")?;
        }

        Ok(())
    }
}

impl ApiError {
    /// Parses `{code, message, errors}` out of a raw Discord error response
    /// body, tolerating a body that isn't even a JSON object (some
    /// non-Discord intermediaries return plain text).
    pub fn from_body(body: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
            return Self {
                message: String::from_utf8_lossy(body).into_owned(),
                ..Self::default()
            };
        };

        let code = value.get("code").and_then(serde_json::Value::as_u64).unwrap_or(0);
        let message = value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut errors = Vec::new();
        if let Some(nested) = value.get("errors") {
            flatten_error_dict(nested, "", &mut errors);
        }

        Self { code, message, errors }
    }
}

/// Flattens Discord's nested per-field error shape
/// (`{field: {nested: {"_errors": [{"message": ..., "code": ...}]}}}`) into
/// `dotted.path -> joined-messages` pairs.
fn flatten_error_dict(value: &serde_json::Value, parent_key: &str, out: &mut Vec<(String, String)>) {
    let Some(object) = value.as_object() else {
        return;
    };

    if let Some(errors) = object.get("_errors").and_then(serde_json::Value::as_array) {
        let joined = errors
            .iter()
            .filter_map(|error| error.get("message").and_then(serde_json::Value::as_str))
            .collect::<Vec<_>>()
            .join(", ");

        out.push((parent_key.to_string(), joined));
        return;
    }

    for (key, nested) in object {
        let key_path = if parent_key.is_empty() {
            key.clone()
        } else {
            format!("{parent_key}.{key}")
        };

        flatten_error_dict(nested, &key_path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use serde_test::Token;

    #[test]
    fn flattens_nested_field_errors_into_dotted_paths() {
        let body = br#"{
            "code": 50035,
            "message": "Invalid Form Body",
            "errors": {
                "activities": {
                    "0": {
                        "platform": {
                            "_errors": [
                                {"code": "X", "message": "Value must be one of (a, b)."}
                            ]
                        }
                    }
                }
            }
        }"#;

        let error = ApiError::from_body(body);
        assert_eq!(error.code, 50035);
        assert_eq!(
            error.errors,
            vec![(
                "activities.0.platform".to_string(),
                "Value must be one of (a, b).".to_string()
            )]
        );
    }

    #[test]
    fn joins_multiple_error_messages_for_one_field() {
        let body = br#"{
            "code": 1,
            "message": "m",
            "errors": {"name": {"_errors": [
                {"code": "A", "message": "too short"},
                {"code": "B", "message": "contains banned word"}
            ]}}
        }"#;

        let error = ApiError::from_body(body);
        assert_eq!(
            error.errors,
            vec![("name".to_string(), "too short, contains banned word".to_string())]
        );
    }

    #[test]
    fn tolerates_body_with_no_errors_field() {
        let body = br#"{"code": 0, "message": "unknown route"}"#;
        let error = ApiError::from_body(body);
        assert!(error.errors.is_empty());
        assert_eq!(error.message, "unknown route");
    }

    #[test]
    fn round_trips_through_serde() {
        let error = ApiError {
            code: 50035,
            message: "Invalid Form Body".to_string(),
            errors: vec![("content".to_string(), "must be 2000 characters or fewer".to_string())],
        };

        serde_test::assert_tokens(
            &error,
            &[
                Token::Struct { name: "ApiError", len: 3 },
                Token::Str("code"),
                Token::U64(50035),
                Token::Str("message"),
                Token::Str("Invalid Form Body"),
                Token::Str("errors"),
                Token::Seq { len: Some(1) },
                Token::Tuple { len: 2 },
                Token::Str("content"),
                Token::Str("must be 2000 characters or fewer"),
                Token::TupleEnd,
                Token::SeqEnd,
                Token::StructEnd,
            ],
        );
    }
}
