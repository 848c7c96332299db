//! Client configuration.
//!
//! # Design
//! Logger, cache policy, timeouts and the accepted status range are fixed
//! when the client is built. `ClientConfiguration` is moved into the client
//! and never mutated afterwards, so it can be read from any task.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use crate::log::Logger;
use crate::transport::Transport;

/// Caching behaviour requested from the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Every request asks intermediaries and the server to bypass caches.
    #[default]
    ReloadIgnoringLocalAndRemoteCache,
    /// Leave caching to the HTTP caching headers of each exchange.
    UseProtocolCachePolicy,
}

impl CachePolicy {
    /// Headers the built-in transports attach to every request.
    pub fn request_headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            CachePolicy::ReloadIgnoringLocalAndRemoteCache => {
                &[("Cache-Control", "no-cache"), ("Pragma", "no-cache")]
            }
            CachePolicy::UseProtocolCachePolicy => &[],
        }
    }
}

/// Which status codes count as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPolicy {
    Range(RangeInclusive<u16>),
    List(Vec<u16>),
}

impl StatusPolicy {
    /// 200..=299.
    pub const SUCCESS: StatusPolicy = StatusPolicy::Range(200..=299);
    /// 100..=399, treating informational and redirect codes as success.
    pub const LENIENT: StatusPolicy = StatusPolicy::Range(100..=399);

    pub fn accepts(&self, status: u16) -> bool {
        match self {
            StatusPolicy::Range(range) => range.contains(&status),
            StatusPolicy::List(codes) => codes.contains(&status),
        }
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        StatusPolicy::SUCCESS
    }
}

/// Settings shared by every call a client makes.
#[derive(Clone)]
pub struct ClientConfiguration {
    pub logger: Option<Arc<dyn Logger>>,
    pub cache_policy: CachePolicy,
    /// Maximum idle time while waiting for response data.
    pub request_timeout: Duration,
    /// Maximum time for a whole exchange, body included.
    pub resource_timeout: Duration,
    pub status_policy: StatusPolicy,
    /// Pre-built transport used instead of the default one.
    pub session: Option<Arc<dyn Transport>>,
}

impl ClientConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    pub fn status_policy(mut self, status_policy: StatusPolicy) -> Self {
        self.status_policy = status_policy;
        self
    }

    pub fn session(mut self, transport: impl Transport + 'static) -> Self {
        self.session = Some(Arc::new(transport));
        self
    }
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            logger: None,
            cache_policy: CachePolicy::default(),
            request_timeout: Duration::from_secs(60),
            resource_timeout: Duration::from_secs(120),
            status_policy: StatusPolicy::default(),
            session: None,
        }
    }
}

impl fmt::Debug for ClientConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfiguration")
            .field("logger", &self.logger.is_some())
            .field("cache_policy", &self.cache_policy)
            .field("request_timeout", &self.request_timeout)
            .field("resource_timeout", &self.resource_timeout)
            .field("status_policy", &self.status_policy)
            .field("session", &self.session.is_some())
            .finish()
    }
}
