//! Endpoints and their rendering into request descriptors.
//!
//! # Design
//! An [`Endpoint`] is pure data: method, host, path, query items, an optional
//! body and an optional content type. [`Endpoint::make_request`] is the only
//! place a URL is assembled, so every caller gets the same scheme default,
//! query ordering and body encoding. [`ApiRequest`] is a ready-made endpoint
//! for callers that do not want to define their own type.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::encoding::{form_pairs, form_url_encode, KeyCase};
use crate::error::NetworkError;
use crate::http::{HttpMethod, QueryItem, RequestDescriptor, Scheme};

pub const FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";
pub const JSON: &str = "application/json";

/// A request body waiting to be encoded.
///
/// Serialisation happens when the body is created; a failure is carried
/// along and reported by `make_request` as [`NetworkError::Encode`].
#[derive(Debug)]
pub struct RequestBody(BodyRepr);

#[derive(Debug)]
enum BodyRepr {
    Value(Value),
    Raw(Bytes),
    Invalid(serde_json::Error),
}

impl RequestBody {
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => RequestBody(BodyRepr::Value(value)),
            Err(err) => RequestBody(BodyRepr::Invalid(err)),
        }
    }

    /// Bytes sent exactly as given.
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        RequestBody(BodyRepr::Raw(bytes.into()))
    }

    fn encode(self, content_type: Option<&str>, key_case: KeyCase) -> Result<Bytes, NetworkError> {
        let value = match self.0 {
            BodyRepr::Raw(bytes) => return Ok(bytes),
            BodyRepr::Invalid(err) => return Err(NetworkError::Encode(err)),
            BodyRepr::Value(value) => key_case.apply(value),
        };

        if content_type == Some(FORM_URL_ENCODED) {
            // Non-object bodies have no key/value form and are dropped.
            return Ok(form_url_encode(&value).map(Bytes::from).unwrap_or_default());
        }
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(NetworkError::Encode)
    }
}

/// Description of one API call.
pub trait Endpoint {
    fn method(&self) -> HttpMethod;

    /// Host without scheme, optionally with `:port`.
    fn host(&self) -> String;

    /// Absolute path starting with `/`, or empty.
    fn path(&self) -> String;

    fn query_items(&self) -> Vec<QueryItem> {
        Vec::new()
    }

    fn body(&self) -> Option<RequestBody> {
        None
    }

    fn content_type(&self) -> Option<String> {
        None
    }

    fn scheme(&self) -> Scheme {
        Scheme::Https
    }

    /// Casing applied to the keys of the encoded body.
    fn body_key_case(&self) -> KeyCase {
        KeyCase::SnakeCase
    }

    /// Render this endpoint into a descriptor.
    ///
    /// Fails with [`NetworkError::InvalidUrl`] if no URL can be built from
    /// the components, and with [`NetworkError::Encode`] if the body cannot
    /// be serialised.
    fn make_request(&self) -> Result<RequestDescriptor, NetworkError> {
        let url = build_url(self.scheme(), &self.host(), &self.path(), &self.query_items())?;
        let mut request = RequestDescriptor::new(self.method(), url);

        let content_type = self.content_type();
        if let Some(content_type) = &content_type {
            request.headers.set("Content-Type", content_type.as_str());
        }
        if let Some(body) = self.body() {
            request.body = Some(body.encode(content_type.as_deref(), self.body_key_case())?);
        }

        Ok(request)
    }
}

fn build_url(
    scheme: Scheme,
    host: &str,
    path: &str,
    query_items: &[QueryItem],
) -> Result<Url, NetworkError> {
    if host.is_empty() {
        return Err(NetworkError::InvalidUrl("missing host".into()));
    }
    if host.contains(['/', '?', '#']) {
        return Err(NetworkError::InvalidUrl(format!("host {host:?} contains URL delimiters")));
    }
    if !path.is_empty() && !path.starts_with('/') {
        return Err(NetworkError::InvalidUrl(format!("path {path:?} must start with '/'")));
    }

    let mut url = Url::parse(&format!("{}://{host}", scheme.as_str()))
        .map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
    url.set_path(path);

    if !query_items.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for item in query_items {
            match &item.value {
                Some(value) => pairs.append_pair(&item.name, value),
                None => pairs.append_key_only(&item.name),
            };
        }
    }

    Ok(url)
}

/// General-purpose [`Endpoint`] assembled with builder calls.
#[derive(Debug)]
pub struct ApiRequest {
    method: HttpMethod,
    scheme: Scheme,
    host: String,
    path: String,
    query: Vec<QueryItem>,
    body: Option<Value>,
    raw_body: Option<Bytes>,
    content_type: Option<String>,
    key_case: KeyCase,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            scheme: Scheme::Https,
            host: host.into(),
            path: path.into(),
            query: Vec::new(),
            body: None,
            raw_body: None,
            content_type: None,
            key_case: KeyCase::SnakeCase,
        }
    }

    pub fn get(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, host, path)
    }

    pub fn post(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, host, path)
    }

    pub fn put(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, host, path)
    }

    pub fn patch(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, host, path)
    }

    pub fn delete(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, host, path)
    }

    /// Start from a base URL such as `https://api.example.com/v3`; its path
    /// becomes a prefix of `path`.
    pub fn from_base_url(method: HttpMethod, base_url: &str, path: &str) -> Result<Self, NetworkError> {
        let base = Url::parse(base_url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
        let scheme = match base.scheme() {
            "https" => Scheme::Https,
            "http" => Scheme::Http,
            other => return Err(NetworkError::InvalidUrl(format!("unsupported scheme {other:?}"))),
        };
        let host = base
            .host_str()
            .ok_or_else(|| NetworkError::InvalidUrl(format!("{base_url:?} has no host")))?;
        let host = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let prefix = base.path().trim_end_matches('/');

        let mut request = Self::new(method, host, format!("{prefix}{path}"));
        request.scheme = scheme;
        Ok(request)
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryItem::new(name, value));
        self
    }

    pub fn query_item(mut self, item: QueryItem) -> Self {
        self.query.push(item);
        self
    }

    /// Query items taken from the fields of `query`, in declaration order.
    ///
    /// Keys go through the current [`ApiRequest::key_case`] and the value is
    /// flattened like a form body: nested objects without a prefix, arrays
    /// comma-joined, nulls skipped. Anything but a struct or map is an
    /// [`NetworkError::Encode`] error.
    pub fn query_struct<T: Serialize + ?Sized>(mut self, query: &T) -> Result<Self, NetworkError> {
        let value = serde_json::to_value(query).map_err(NetworkError::Encode)?;
        let pairs = form_pairs(&self.key_case.apply(value)).ok_or_else(|| {
            NetworkError::Encode(serde::ser::Error::custom(
                "query string must serialise to an object",
            ))
        })?;
        self.query
            .extend(pairs.into_iter().map(|(name, value)| QueryItem::new(name, value)));
        Ok(self)
    }

    /// JSON body. Keys are converted to snake case unless
    /// [`ApiRequest::key_case`] says otherwise.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, NetworkError> {
        self.body = Some(serde_json::to_value(body).map_err(NetworkError::Encode)?);
        self.content_type = Some(JSON.to_string());
        Ok(self)
    }

    /// Form-url-encoded body built from the fields of `body`.
    pub fn form<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, NetworkError> {
        self.body = Some(serde_json::to_value(body).map_err(NetworkError::Encode)?);
        self.content_type = Some(FORM_URL_ENCODED.to_string());
        Ok(self)
    }

    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn key_case(mut self, key_case: KeyCase) -> Self {
        self.key_case = key_case;
        self
    }
}

impl Endpoint for ApiRequest {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn host(&self) -> String {
        self.host.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn query_items(&self) -> Vec<QueryItem> {
        self.query.clone()
    }

    fn body(&self) -> Option<RequestBody> {
        if let Some(raw) = &self.raw_body {
            return Some(RequestBody::raw(raw.clone()));
        }
        self.body.as_ref().map(RequestBody::new)
    }

    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn scheme(&self) -> Scheme {
        self.scheme
    }

    fn body_key_case(&self) -> KeyCase {
        self.key_case
    }
}
