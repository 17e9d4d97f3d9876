//! Sending requests: fixed headers, signing, and the network round-trip.
//!
//! # Design
//! `dispatch` is the only place a request leaves the process. It validates
//! the URL, stamps the fixed `Content-Type` / `Accept` / `Date` headers,
//! hands the request to the signer exactly once, and sends whatever the
//! signer returned through a `Transport`. Each failure stage maps to its own
//! `ApiError` variant.
//!
//! `Transport` abstracts the HTTP stack so tests can script responses.
//! `UreqTransport` is the blocking default; it reports 4xx/5xx as data and
//! reads the body fully before returning, so the connection is released on
//! every path.

use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::error::{ApiError, TransportError};
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, ACCEPT_HEADER, CONTENT_TYPE_HEADER, DATE_HEADER,
    XML_CONTENT_TYPE,
};
use crate::signer::RequestSigner;

/// Executes one HTTP round-trip.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by a ureq `Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// `None` keeps ureq's default (no overall deadline).
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UreqTransport")
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = &request.headers;

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(url), headers);
                match request.body.as_deref() {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(self.agent.put(url), headers);
                match request.body.as_deref() {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::new(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Current time in the RFC 1123 form HTTP expects, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Stamp fixed headers, sign, and send `request`.
pub fn dispatch<T, S>(
    transport: &T,
    signer: &S,
    mut request: HttpRequest,
) -> Result<HttpResponse, ApiError>
where
    T: Transport + ?Sized,
    S: RequestSigner + ?Sized,
{
    let method = request.method;
    validate_url(method, &request.url)?;

    request.add_header(CONTENT_TYPE_HEADER, XML_CONTENT_TYPE);
    request.add_header(ACCEPT_HEADER, XML_CONTENT_TYPE);
    request.add_header(DATE_HEADER, http_date());

    let url = request.url.clone();
    let signed = signer
        .sign(request)
        .map_err(|source| ApiError::Signing {
            method,
            url: url.clone(),
            source,
        })?;

    debug!(%method, url = %signed.url, "sending request");
    let response = transport
        .send(&signed)
        .map_err(|source| ApiError::Transport {
            method,
            url: signed.url.clone(),
            source,
        })?;
    debug!(%method, url = %signed.url, status = response.status, "received response");

    Ok(response)
}

fn validate_url(method: HttpMethod, url: &str) -> Result<(), ApiError> {
    let invalid = |reason: String| ApiError::InvalidRequest {
        method,
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::SignError;
    use crate::signer::BasicAuth;

    struct Recorder {
        sent: RefCell<Vec<HttpRequest>>,
        reply: Result<HttpResponse, TransportError>,
    }

    impl Recorder {
        fn replying(status: u16) -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
                reply: Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: String::new(),
                }),
            }
        }
    }

    impl Transport for Recorder {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.borrow_mut().push(request.clone());
            self.reply.clone()
        }
    }

    fn get(url: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, url)
    }

    #[test]
    fn dispatch_sets_fixed_headers() {
        let transport = Recorder::replying(200);
        dispatch(&transport, &BasicAuth::new("u", "p"), get("http://localhost/cards/1.xml")).unwrap();

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("Content-Type"), Some("application/xml"));
        assert_eq!(sent[0].header("Accept"), Some("application/xml"));
        let date = sent[0].header("Date").unwrap();
        assert!(date.ends_with(" GMT"), "{date}");
        assert!(chrono::DateTime::parse_from_rfc2822(date).is_ok(), "{date}");
    }

    #[test]
    fn signer_runs_once_after_fixed_headers() {
        let transport = Recorder::replying(200);
        let calls = RefCell::new(0);
        let signer = |mut req: HttpRequest| -> Result<HttpRequest, SignError> {
            *calls.borrow_mut() += 1;
            assert!(req.header("Date").is_some());
            assert!(req.header("Accept").is_some());
            req.add_header("X-Signature", "abc");
            Ok(req)
        };
        dispatch(&transport, &signer, get("http://localhost/cards/1.xml")).unwrap();

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(transport.sent.borrow()[0].header("X-Signature"), Some("abc"));
    }

    #[test]
    fn signer_failure_is_not_sent() {
        let transport = Recorder::replying(200);
        let signer =
            |_: HttpRequest| -> Result<HttpRequest, SignError> { Err(SignError::new("locked")) };
        let err = dispatch(&transport, &signer, get("http://localhost/cards/1.xml")).unwrap_err();

        assert!(matches!(err, ApiError::Signing { method: HttpMethod::Get, .. }));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn malformed_url_is_a_construction_error() {
        let transport = Recorder::replying(200);
        let err = dispatch(&transport, &BasicAuth::new("u", "p"), get("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));

        let err = dispatch(&transport, &BasicAuth::new("u", "p"), get("ftp://host/cards.xml")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn network_failure_is_a_transport_error() {
        let transport = Recorder {
            sent: RefCell::new(Vec::new()),
            reply: Err(TransportError::new("connection refused")),
        };
        let err = dispatch(&transport, &BasicAuth::new("u", "p"), get("http://localhost/cards/1.xml")).unwrap_err();
        match err {
            ApiError::Transport { method, url, source } => {
                assert_eq!(method, HttpMethod::Get);
                assert_eq!(url, "http://localhost/cards/1.xml");
                assert_eq!(source.to_string(), "connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_statuses_are_returned_as_data() {
        let transport = Recorder::replying(500);
        let response = dispatch(&transport, &BasicAuth::new("u", "p"), get("http://localhost/cards/1.xml")).unwrap();
        assert_eq!(response.status, 500);
    }
}
