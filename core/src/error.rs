//! Error types for the Mingle API client.
//!
//! # Design
//! Every failure mode of a call gets its own variant so callers can tell a
//! bad URL from a signer refusal from a dropped connection. A 404 on Get is
//! not an error at all (`Ok(None)`); a non-201 on Create lands in
//! `CreateFailed`; every other unexpected status lands in `HttpError` with
//! the raw status and body for debugging.

use thiserror::Error;

use crate::http::HttpMethod;

/// Error returned by a `RequestSigner` that refuses to sign a request.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SignError(String);

impl SignError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error returned by a `Transport` when no HTTP response was obtained.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors returned by `MingleClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be constructed (malformed URL, missing card number).
    #[error("failed to construct HTTP {method} request for {url}: {reason}")]
    InvalidRequest {
        method: HttpMethod,
        url: String,
        reason: String,
    },

    /// The signer rejected the request.
    #[error("failed to sign HTTP {method} request to {url}: {source}")]
    Signing {
        method: HttpMethod,
        url: String,
        #[source]
        source: SignError,
    },

    /// The request never produced an HTTP response.
    #[error("HTTP {method} request to {url} failed: {source}")]
    Transport {
        method: HttpMethod,
        url: String,
        #[source]
        source: TransportError,
    },

    /// Create answered with something other than 201.
    #[error("unable to create card: server returned HTTP {status}")]
    CreateFailed { status: u16, body: String },

    /// Create answered 201 without a `Location` header to follow.
    #[error("card created at {url} but the response carried no Location header")]
    MissingLocation { url: String },

    /// Any other unexpected status.
    #[error("request to {url} returned HTTP {status}: {body}")]
    HttpError { url: String, status: u16, body: String },

    /// The response body could not be decoded into the expected type.
    #[error("failed to decode {type_name}: {reason}")]
    DeserializationError {
        type_name: &'static str,
        reason: String,
    },

    /// The request payload could not be encoded as XML.
    #[error("failed to encode {type_name}: {reason}")]
    SerializationError {
        type_name: &'static str,
        reason: String,
    },

    /// The client configuration is incomplete or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::CreateFailed { status, .. } | ApiError::HttpError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_failure_mentions_status() {
        let err = ApiError::CreateFailed {
            status: 422,
            body: "Name can't be blank".to_string(),
        };
        assert_eq!(err.to_string(), "unable to create card: server returned HTTP 422");
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn signing_error_keeps_source() {
        let err = ApiError::Signing {
            method: HttpMethod::Get,
            url: "http://localhost/cards/1.xml".to_string(),
            source: SignError::new("no credentials"),
        };
        assert!(err.to_string().contains("no credentials"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.status(), None);
    }
}
