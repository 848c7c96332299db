//! Request adapters: hooks run around every call.
//!
//! # Design
//! An adapter rewrites the outgoing descriptor (`adapt`) and observes the
//! result (`complete`). The chain applies `adapt` as a left fold in
//! registration order, so with adapters `[a, b]` the transport sees
//! `b.adapt(a.adapt(request))`. `complete` runs in the same order and can
//! never fail the call: a panicking observer is caught and reported as a
//! warning to the client's logger, or to `tracing` when none is set.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::http::{Headers, RequestDescriptor, ResponseMetadata};
use crate::log::{LogData, Logger, MetadataValue};

/// Hook applied to every request a client sends.
pub trait RequestAdapter: Send + Sync {
    /// Rewrite the request before it is sent.
    fn adapt(&self, request: RequestDescriptor) -> RequestDescriptor;

    /// Observe the finished exchange. `response` is `None` when the transport
    /// failed; `body` is `None` for downloads, whose body went to disk.
    fn complete(
        &self,
        _request: &RequestDescriptor,
        _response: Option<&ResponseMetadata>,
        _body: Option<&[u8]>,
    ) {
    }
}

/// Ordered adapters held by a client for its whole lifetime.
#[derive(Clone, Default)]
pub struct AdapterChain {
    adapters: Vec<Arc<dyn RequestAdapter>>,
}

impl AdapterChain {
    pub fn new(adapters: Vec<Arc<dyn RequestAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn push(&mut self, adapter: Arc<dyn RequestAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn adapt(&self, request: RequestDescriptor) -> RequestDescriptor {
        self.adapters
            .iter()
            .fold(request, |request, adapter| adapter.adapt(request))
    }

    pub fn complete(
        &self,
        request: &RequestDescriptor,
        response: Option<&ResponseMetadata>,
        body: Option<&[u8]>,
        logger: Option<&dyn Logger>,
    ) {
        for (index, adapter) in self.adapters.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                adapter.complete(request, response, body);
            }));
            if outcome.is_ok() {
                continue;
            }
            match logger {
                Some(logger) => {
                    let log = LogData::response(request, response, None, false);
                    let mut metadata = log.metadata();
                    metadata.insert("adapter".into(), MetadataValue::String(index.to_string()));
                    logger.warning(
                        &format!("{} (request adapter panicked in complete)", log.message()),
                        &metadata,
                    );
                }
                None => tracing::warn!(
                    adapter = index,
                    request_id = %request.request_id,
                    "request adapter panicked in complete; ignoring"
                ),
            }
        }
    }
}

/// Adds a fixed set of headers to every request, replacing existing values.
#[derive(Debug, Clone, Default)]
pub struct HeaderAdapter {
    headers: Headers,
}

impl HeaderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }
}

impl RequestAdapter for HeaderAdapter {
    fn adapt(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        for (name, value) in self.headers.iter() {
            request.headers.set(name, value);
        }
        request
    }
}

/// Shared slot for the current access token.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Sends `Authorization: Bearer <token>` while a token is stored and drops
/// the token once the server answers 401.
#[derive(Debug, Clone)]
pub struct BearerTokenAdapter {
    store: TokenStore,
}

impl BearerTokenAdapter {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

impl RequestAdapter for BearerTokenAdapter {
    fn adapt(&self, request: RequestDescriptor) -> RequestDescriptor {
        match self.store.get() {
            Some(token) => request.with_header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn complete(
        &self,
        _request: &RequestDescriptor,
        response: Option<&ResponseMetadata>,
        _body: Option<&[u8]>,
    ) {
        if response.is_some_and(|r| r.status == 401) {
            self.store.clear();
        }
    }
}
