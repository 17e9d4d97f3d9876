//! Request signing strategies.
//!
//! A `RequestSigner` sees every outbound request exactly once, after the
//! fixed headers are set and before it is sent. Whatever it returns is what
//! goes on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::SignError;
use crate::http::{HttpRequest, AUTHORIZATION_HEADER};

/// Authenticates an outbound request.
pub trait RequestSigner {
    fn sign(&self, request: HttpRequest) -> Result<HttpRequest, SignError>;
}

impl<F> RequestSigner for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest, SignError>,
{
    fn sign(&self, request: HttpRequest) -> Result<HttpRequest, SignError> {
        self(request)
    }
}

/// HTTP basic authentication: `Authorization: Basic base64(user:pass)`.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RequestSigner for BasicAuth {
    fn sign(&self, mut request: HttpRequest) -> Result<HttpRequest, SignError> {
        request.add_header(AUTHORIZATION_HEADER, self.header_value());
        Ok(request)
    }
}
