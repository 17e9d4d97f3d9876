//! Operations against the Mingle card API.
//!
//! # Design
//! `MingleClient` holds a `base_url` and a `Transport` and carries no
//! mutable state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`; both are pure. The I/O methods (`get_card`,
//! `create_card`, `update_card`, `query`) glue them together through
//! `transport::dispatch`, which adds the fixed headers and runs the signer.
//!
//! Create trusts the `Location` header of a 201 and re-fetches the card
//! from there, but only when it points at the same scheme, host and port as
//! the base URL: the follow-up carries the signer's credentials. Update
//! returns nothing; call `get_card` for the new version.

use tracing::{info, warn};
use url::form_urlencoded;
use url::Url;

use crate::codec;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, LOCATION_HEADER};
use crate::signer::RequestSigner;
use crate::transport::{dispatch, Transport, UreqTransport};
use crate::types::{Card, QueryRow};

/// Synchronous, stateless client for the Mingle card API.
#[derive(Debug, Clone)]
pub struct MingleClient<T = UreqTransport> {
    base_url: String,
    transport: T,
}

impl MingleClient<UreqTransport> {
    /// Client for `base_url` (e.g. `https://mingle.example.com/api/v2/projects/demo`)
    /// using the default blocking transport.
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(base_url, UreqTransport::new())
    }

    /// Client built from `config`, with its transport timeout applied.
    /// Credentials stay in the config; pass `config.signer()` to each call.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_transport(&config.base_url, UreqTransport::with_timeout(config.timeout))
    }
}

impl<T> MingleClient<T> {
    /// Client sending through `transport`. Trailing slashes on `base_url`
    /// are dropped.
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// Project base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Transport the client sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `{base}/cards/{number}.xml`.
    pub fn card_url(&self, number: u64) -> String {
        format!("{}/cards/{number}.xml", self.base_url)
    }

    /// Unsigned GET for the current version of card `number`.
    pub fn build_get_card(&self, number: u64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.card_url(number))
    }

    /// Request for a historical version of a card.
    pub fn build_get_card_version(&self, number: u64, version: u64) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            format!("{}?version={version}", self.card_url(number)),
        )
    }

    /// POST of `card` to `{base}/cards.xml`. Only the fields a caller owns
    /// are encoded, plus any identifiers already set.
    pub fn build_create_card(&self, card: &Card) -> Result<HttpRequest, ApiError> {
        let body = codec::encode(card)?;
        Ok(HttpRequest::new(HttpMethod::Post, format!("{}/cards.xml", self.base_url)).with_body(body))
    }

    /// Fails with `InvalidRequest` when the card has no number to address it by.
    pub fn build_update_card(&self, card: &Card) -> Result<HttpRequest, ApiError> {
        let number = card.number.ok_or_else(|| ApiError::InvalidRequest {
            method: HttpMethod::Put,
            url: format!("{}/cards/?.xml", self.base_url),
            reason: "card has no number".to_string(),
        })?;
        let body = codec::encode(card)?;
        Ok(HttpRequest::new(HttpMethod::Put, self.card_url(number)).with_body(body))
    }

    /// GET of `{base}/cards/execute_mql.xml` with `mql` form-encoded.
    pub fn build_query(&self, mql: &str) -> HttpRequest {
        let encoded: String = form_urlencoded::byte_serialize(mql.as_bytes()).collect();
        HttpRequest::new(
            HttpMethod::Get,
            format!("{}/cards/execute_mql.xml?mql={encoded}", self.base_url),
        )
    }

    /// `Ok(None)` when the server answers 404.
    pub fn parse_get_card(&self, url: &str, response: HttpResponse) -> Result<Option<Card>, ApiError> {
        if response.status == 404 {
            return Ok(None);
        }
        check_status(url, &response, 200)?;
        codec::decode(&response.body).map(Some)
    }

    /// Absolute URL of the created card, taken from the `Location` header.
    ///
    /// A status other than 201 is `CreateFailed`. A Location on another
    /// origin than the base URL is `InvalidRequest`.
    pub fn parse_create_card(&self, url: &str, response: HttpResponse) -> Result<String, ApiError> {
        if response.status != 201 {
            warn!(url, status = response.status, "card creation rejected");
            return Err(ApiError::CreateFailed {
                status: response.status,
                body: response.body,
            });
        }
        let location = response
            .header(LOCATION_HEADER)
            .ok_or_else(|| ApiError::MissingLocation { url: url.to_string() })?;
        self.resolve(location)
    }

    /// Any 2xx is success; the body is ignored.
    pub fn parse_update_card(&self, url: &str, response: HttpResponse) -> Result<(), ApiError> {
        check_success(url, &response)
    }

    /// Rows of a 2xx `execute_mql` response, in document order.
    pub fn parse_query(&self, url: &str, response: HttpResponse) -> Result<Vec<QueryRow>, ApiError> {
        check_success(url, &response)?;
        codec::decode_query_results(&response.body)
    }

    /// Resolve a possibly relative `Location` against the base URL and
    /// refuse it unless it stays on the base URL's origin.
    fn resolve(&self, location: &str) -> Result<String, ApiError> {
        let invalid = |reason: String| ApiError::InvalidRequest {
            method: HttpMethod::Get,
            url: location.to_string(),
            reason,
        };
        let base = Url::parse(&format!("{}/", self.base_url)).map_err(|e| invalid(e.to_string()))?;
        let target = base.join(location).map_err(|e| invalid(e.to_string()))?;
        if !same_origin(&base, &target) {
            warn!(location, base = %self.base_url, "refusing cross-origin Location");
            return Err(invalid(format!(
                "Location is not on the origin of {}",
                self.base_url
            )));
        }
        Ok(target.into())
    }
}

impl<T: Transport> MingleClient<T> {
    /// Fetch card `number`, or `None` if it does not exist.
    pub fn get_card<S>(&self, number: u64, signer: &S) -> Result<Option<Card>, ApiError>
    where
        S: RequestSigner + ?Sized,
    {
        self.fetch(self.build_get_card(number), signer)
    }

    /// Fetch `version` of card `number`, or `None` if either does not exist.
    pub fn get_card_version<S>(
        &self,
        number: u64,
        version: u64,
        signer: &S,
    ) -> Result<Option<Card>, ApiError>
    where
        S: RequestSigner + ?Sized,
    {
        self.fetch(self.build_get_card_version(number, version), signer)
    }

    /// Create `card` and return it as stored by the server.
    pub fn create_card<S>(&self, card: &Card, signer: &S) -> Result<Card, ApiError>
    where
        S: RequestSigner + ?Sized,
    {
        let request = self.build_create_card(card)?;
        let url = request.url.clone();
        let response = dispatch(&self.transport, signer, request)?;
        let location = self.parse_create_card(&url, response)?;

        let created = self.fetch(HttpRequest::new(HttpMethod::Get, location.clone()), signer)?;
        let created = created.ok_or_else(|| ApiError::HttpError {
            url: location,
            status: 404,
            body: String::new(),
        })?;
        info!(number = ?created.number, name = %created.name, "card created");
        Ok(created)
    }

    /// Replace card `card.number` with `card`.
    pub fn update_card<S>(&self, card: &Card, signer: &S) -> Result<(), ApiError>
    where
        S: RequestSigner + ?Sized,
    {
        let request = self.build_update_card(card)?;
        let url = request.url.clone();
        let response = dispatch(&self.transport, signer, request)?;
        self.parse_update_card(&url, response)
    }

    /// Run an MQL expression and return its rows in server order.
    pub fn query<S>(&self, mql: &str, signer: &S) -> Result<Vec<QueryRow>, ApiError>
    where
        S: RequestSigner + ?Sized,
    {
        let request = self.build_query(mql);
        let url = request.url.clone();
        let response = dispatch(&self.transport, signer, request)?;
        self.parse_query(&url, response)
    }

    fn fetch<S>(&self, request: HttpRequest, signer: &S) -> Result<Option<Card>, ApiError>
    where
        S: RequestSigner + ?Sized,
    {
        let url = request.url.clone();
        let response = dispatch(&self.transport, signer, request)?;
        self.parse_get_card(&url, response)
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

fn check_status(url: &str, response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(unexpected_status(url, response))
}

fn check_success(url: &str, response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(unexpected_status(url, response))
}

fn unexpected_status(url: &str, response: &HttpResponse) -> ApiError {
    warn!(url, status = response.status, "unexpected response status");
    ApiError::HttpError {
        url: url.to_string(),
        status: response.status,
        body: response.body.clone(),
    }
}
