//! Structured request/response logging.
//!
//! # Design
//! The client never formats log lines itself. It builds a [`LogData`] for
//! each event and hands its message and metadata to the configured
//! [`Logger`]. No logger configured means no logging at all.
//! [`TracingLogger`] forwards events to `tracing`.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::http::{Headers, RequestDescriptor, ResponseMetadata};

/// A single structured metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    String(String),
    Dictionary(BTreeMap<String, String>),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => f.write_str(s),
            MetadataValue::Dictionary(map) => {
                f.write_str("[")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Sink for client log events.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str, metadata: &Metadata);

    fn error(&self, message: &str, metadata: &Metadata);

    fn warning(&self, message: &str, metadata: &Metadata) {
        self.error(message, metadata);
    }
}

/// Logger that emits `tracing` events under the `netclient` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str, metadata: &Metadata) {
        tracing::info!(target: "netclient", metadata = %render(metadata), "{message}");
    }

    fn error(&self, message: &str, metadata: &Metadata) {
        tracing::error!(target: "netclient", metadata = %render(metadata), "{message}");
    }

    fn warning(&self, message: &str, metadata: &Metadata) {
        tracing::warn!(target: "netclient", metadata = %render(metadata), "{message}");
    }
}

fn render(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything known about one call at the time an event is logged.
///
/// Also attached to the errors that carry diagnostics, so a caller can log
/// a failure with the same metadata the client would have produced.
#[derive(Debug, Clone)]
pub struct LogData {
    pub request: RequestDescriptor,
    pub response: Option<ResponseMetadata>,
    pub response_body: Option<Bytes>,
    log_response: bool,
}

impl LogData {
    pub fn request(request: &RequestDescriptor) -> Self {
        Self {
            request: request.clone(),
            response: None,
            response_body: None,
            log_response: false,
        }
    }

    /// Response event. The body is only reported in metadata when
    /// `log_response` is set, which the client does for failures.
    pub fn response(
        request: &RequestDescriptor,
        response: Option<&ResponseMetadata>,
        body: Option<&Bytes>,
        log_response: bool,
    ) -> Self {
        Self {
            request: request.clone(),
            response: response.cloned(),
            response_body: body.cloned(),
            log_response,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// `[METHOD] url`, plus ` -> status` once a response is known.
    pub fn message(&self) -> String {
        let mut message = format!("[{}] {}", self.request.method, self.request.url);
        if let Some(status) = self.status() {
            message.push_str(&format!(" -> {status}"));
        }
        message
    }

    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(
            "request_id".into(),
            MetadataValue::String(self.request.request_id.to_string()),
        );
        metadata.insert(
            "url".into(),
            MetadataValue::String(self.request.url.to_string()),
        );
        metadata.insert(
            "http_method".into(),
            MetadataValue::String(self.request.method.to_string()),
        );
        if !self.request.headers.is_empty() {
            metadata.insert(
                "request_headers".into(),
                dictionary(&self.request.headers),
            );
        }
        if let Some(body) = self.request.body_text() {
            metadata.insert("request_body".into(), MetadataValue::String(body.to_string()));
        }
        if let Some(response) = &self.response {
            metadata.insert("response_headers".into(), dictionary(&response.headers));
            metadata.insert(
                "response_code".into(),
                MetadataValue::String(response.status.to_string()),
            );
        }
        if self.log_response {
            if let Some(text) = self
                .response_body
                .as_deref()
                .and_then(|b| std::str::from_utf8(b).ok())
            {
                metadata.insert("response_body".into(), MetadataValue::String(text.to_string()));
            }
        }
        metadata
    }
}

fn dictionary(headers: &Headers) -> MetadataValue {
    MetadataValue::Dictionary(
        headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Run `f` under a plain-text `tracing` subscriber and return what it wrote.
#[cfg(test)]
pub(crate) fn capture_events(f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
