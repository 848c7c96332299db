//! Typed HTTP client layer over a pluggable network engine.
//!
//! # Overview
//! Endpoints render into `RequestDescriptor` values, an ordered chain of
//! request adapters rewrites and observes them, a `Transport` performs the
//! round-trip, and `NetworkClient` classifies the status and decodes the
//! body into the caller's type. Connection handling, TLS and caching stay
//! inside the engine (`reqwest` by default).
//!
//! # Design
//! - `NetworkClient` is stateless beyond its configuration: adapters,
//!   decoder, `ClientConfiguration` and transport are fixed at build time.
//! - Every call is available as a single-item stream
//!   (`request_stream`) and as a plain future (`request`).
//! - Status classification is a `StatusPolicy`, 2xx by default.
//! - Logging goes through an injected `Logger`; without one nothing is
//!   logged.
//!
//! ```no_run
//! use netclient::{ApiRequest, Endpoint, NetworkClient};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Slideshow {
//!     title: String,
//! }
//!
//! # async fn run() -> Result<(), netclient::NetworkError> {
//! let client = NetworkClient::new()?;
//! let request = ApiRequest::get("httpbin.org", "/json").make_request()?;
//! let slideshow: Slideshow = client.request(request).await?;
//! println!("{}", slideshow.title);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod encoding;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod log;
pub mod transport;
pub mod types;

pub use adapter::{AdapterChain, BearerTokenAdapter, HeaderAdapter, RequestAdapter, TokenStore};
pub use client::{DownloadOptions, NetworkClient, NetworkClientBuilder};
pub use config::{CachePolicy, ClientConfiguration, StatusPolicy};
pub use encoding::{form_pairs, form_url_decode, form_url_encode, KeyCase, ResponseDecoder};
pub use endpoint::{ApiRequest, Endpoint, RequestBody};
pub use error::{DomainError, NetworkError, TransportError};
pub use http::{
    Headers, HttpMethod, QueryItem, RawResponse, RequestDescriptor, ResponseMetadata, Scheme,
};
pub use log::{LogData, Logger, Metadata, MetadataValue, TracingLogger};
pub use transport::Transport;
#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
#[cfg(feature = "ureq-transport")]
pub use transport::UreqTransport;
pub use types::EmptyResponse;
