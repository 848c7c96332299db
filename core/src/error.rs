//! Error types for the network client.
//!
//! # Design
//! `Unauthorized` gets a dedicated variant because callers usually react to
//! it differently (refresh credentials, sign out) from any other rejected
//! status, which lands in `BadRequest`. Both carry the status, the body
//! parsed as a JSON object when possible, and the full [`LogData`] of the
//! exchange for diagnostics. Transport errors pass through untouched.

use std::io;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::log::{LogData, Metadata};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by the underlying HTTP engine.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The engine's own error, unchanged.
    #[error(transparent)]
    Engine(BoxError),

    /// Writing a downloaded body to its sink failed.
    #[error("failed to write response body: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    pub fn engine(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        TransportError::Engine(Box::new(err))
    }
}

/// Errors returned by `NetworkClient` and `Endpoint::make_request`.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The endpoint's components do not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be serialised.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The transport returned no parsable status line.
    #[error("Could not read an HTTP status from the response")]
    BadContent(Box<LogData>),

    /// The status code is outside the accepted range.
    #[error("Response status code {status} not within expected range")]
    BadRequest {
        status: u16,
        json: Option<Map<String, Value>>,
        log: Box<LogData>,
    },

    /// The server answered 401.
    #[error("Unauthorized")]
    Unauthorized {
        status: u16,
        json: Option<Map<String, Value>>,
        log: Box<LogData>,
    },

    /// A single-value stream completed without producing a value.
    #[error("Finished without value")]
    FinishedWithoutValue(Box<LogData>),

    /// The body did not match the expected type.
    #[error("failed to decode response body: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        log: Box<LogData>,
    },

    /// Moving a download into place failed.
    #[error("file system error: {0}")]
    FileSystem(#[from] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl NetworkError {
    pub const DOMAIN: &'static str = "NetworkError";

    /// Stable numeric code per variant.
    pub fn code(&self) -> u16 {
        match self {
            NetworkError::InvalidUrl(_) => 100,
            NetworkError::BadContent(_) => 102,
            NetworkError::BadRequest { .. } => 103,
            NetworkError::Unauthorized { .. } => 104,
            NetworkError::FinishedWithoutValue(_) => 105,
            NetworkError::Decode { .. } => 106,
            NetworkError::FileSystem(_) => 107,
            NetworkError::Transport(_) => 108,
            NetworkError::Encode(_) => 109,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::BadRequest { status, .. } | NetworkError::Unauthorized { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// The JSON object the server sent with a rejected status, if any.
    pub fn json_body(&self) -> Option<&Map<String, Value>> {
        match self {
            NetworkError::BadRequest { json, .. } | NetworkError::Unauthorized { json, .. } => {
                json.as_ref()
            }
            _ => None,
        }
    }

    pub fn log_data(&self) -> Option<&LogData> {
        match self {
            NetworkError::BadContent(log)
            | NetworkError::FinishedWithoutValue(log)
            | NetworkError::BadRequest { log, .. }
            | NetworkError::Unauthorized { log, .. }
            | NetworkError::Decode { log, .. } => Some(log),
            _ => None,
        }
    }

    /// Log metadata of the failed exchange; empty when none was recorded.
    pub fn metadata(&self) -> Metadata {
        self.log_data().map(LogData::metadata).unwrap_or_default()
    }
}

/// Failure of a call that also decodes a caller-defined error body.
#[derive(Debug, Error)]
pub enum DomainError<E> {
    /// The server's structured error, decoded into the caller's type.
    #[error("server returned a domain error")]
    Domain(E),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl<E> DomainError<E> {
    pub fn domain(&self) -> Option<&E> {
        match self {
            DomainError::Domain(err) => Some(err),
            DomainError::Network(_) => None,
        }
    }
}
