//! Synchronous client for the Mingle card REST API.
//!
//! # Overview
//! Fetches, creates and updates cards and runs MQL queries over the
//! service's XML API. Every call is a single blocking round-trip (Create
//! makes two) with no retries, caching, or shared mutable state.
//!
//! # Design
//! - `MingleClient` is stateless: a `base_url` plus a `Transport`.
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit and the
//!   mapping is testable without a server.
//! - Authentication is a `RequestSigner` passed per call; `BasicAuth` is
//!   the stock implementation.
//! - XML mapping lives in `codec`; fixed headers, signing and sending live
//!   in `transport`.
//!
//! ```no_run
//! use mingle_core::{BasicAuth, Card, MingleClient};
//!
//! # fn main() -> Result<(), mingle_core::ApiError> {
//! let client = MingleClient::new("https://mingle.example.com/api/v2/projects/demo");
//! let auth = BasicAuth::new("alice", "s3cret");
//!
//! let created = client.create_card(&Card::new("Login page", "Story"), &auth)?;
//! let rows = client.query("SELECT number, name WHERE type = Story", &auth)?;
//! # let _ = (created, rows);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod signer;
pub mod transport;
pub mod types;

pub use client::MingleClient;
pub use config::ClientConfig;
pub use error::{ApiError, SignError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use signer::{BasicAuth, RequestSigner};
pub use transport::{Transport, UreqTransport};
pub use types::{Card, CardProperty, CardType, ProjectRef, PropertyValue, QueryRow, UserRef};
