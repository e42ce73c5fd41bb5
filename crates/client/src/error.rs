//! Client error type.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

/// Error codes that mean the access token is gone or stale and a refresh may
/// recover the session.
const REFRESHABLE_CODES: [&str; 2] = ["token_expired", "missing_token"];

/// Errors from the storefront API client.
///
/// `Clone` so a single refresh result can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport failure or undecodable response body.
    #[error("HTTP error: {0}")]
    Http(Arc<reqwest::Error>),

    /// The base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The base URL cannot carry a path (e.g. `mailto:`).
    #[error("Base URL must be an http(s) origin: {0}")]
    InvalidBaseUrl(String),

    /// The API answered with an error body.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl ClientError {
    /// Build an `Api` error from a non-success response body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let (message, code) = parsed.map_or((None, None), |b| (b.message, b.code));
        Self::Api {
            status,
            code: code.unwrap_or_else(|| "unknown".to_string()),
            message: message.unwrap_or_else(|| body.trim().to_string()),
        }
    }

    /// HTTP status of an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable code of an API error.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The server-provided message of an API error.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether a token refresh might let the request succeed.
    pub(crate) fn is_refreshable(&self) -> bool {
        self.status() == Some(401) && self.code().is_some_and(|c| REFRESHABLE_CODES.contains(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_body() {
        let err = ClientError::from_response(
            401,
            r#"{"message":"Unauthorized - Token expired","code":"token_expired"}"#,
        );
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.code(), Some("token_expired"));
        assert_eq!(err.message(), Some("Unauthorized - Token expired"));
        assert!(err.is_refreshable());
    }

    #[test]
    fn test_non_json_body_kept_as_message() {
        let err = ClientError::from_response(502, "Bad Gateway\n");
        assert_eq!(err.code(), Some("unknown"));
        assert_eq!(err.message(), Some("Bad Gateway"));
        assert!(!err.is_refreshable());
    }

    #[test]
    fn test_only_stale_session_codes_are_refreshable() {
        let revoked = ClientError::from_response(401, r#"{"message":"x","code":"token_revoked"}"#);
        let invalid = ClientError::from_response(401, r#"{"message":"x","code":"invalid_token"}"#);
        let missing = ClientError::from_response(401, r#"{"message":"x","code":"missing_token"}"#);
        assert!(!revoked.is_refreshable());
        assert!(!invalid.is_refreshable());
        assert!(missing.is_refreshable());
    }
}
