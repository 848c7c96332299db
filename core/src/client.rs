//! The dispatcher: adapters, transport, classification and decoding.
//!
//! # Design
//! `NetworkClient` holds only configuration: the adapter chain, the decoder,
//! the `ClientConfiguration` and a shared transport. It carries no mutable
//! state between calls, so one instance can serve any number of concurrent
//! tasks. Every call follows the same pipeline:
//!
//! 1. run `adapt` on every adapter, in registration order
//! 2. log the request
//! 3. perform the round-trip through the transport
//! 4. run `complete` on every adapter, whatever the outcome
//! 5. classify the status against the `StatusPolicy`
//! 6. decode the body into the caller's type
//! 7. log the response or the error
//!
//! [`NetworkClient::request_stream`] exposes a call as a single-item stream;
//! [`NetworkClient::request`] awaits that item.

use std::any::TypeId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::adapter::{AdapterChain, RequestAdapter};
use crate::config::{ClientConfiguration, StatusPolicy};
use crate::encoding::ResponseDecoder;
use crate::endpoint::Endpoint;
use crate::error::{DomainError, NetworkError};
use crate::http::{RequestDescriptor, ResponseMetadata};
use crate::log::{LogData, Logger, MetadataValue};
use crate::transport::Transport;
use crate::types::EmptyResponse;

/// Body decoded when an [`EmptyResponse`] is expected and nothing arrived.
const EMPTY_OBJECT: &[u8] = b"{}";

/// Builder for [`NetworkClient`].
#[derive(Default)]
pub struct NetworkClientBuilder {
    adapters: AdapterChain,
    decoder: ResponseDecoder,
    configuration: ClientConfiguration,
}

impl NetworkClientBuilder {
    /// Append an adapter. Adapters run in the order they are added.
    pub fn adapter(mut self, adapter: impl RequestAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn RequestAdapter>>) -> Self {
        for adapter in adapters {
            self.adapters.push(adapter);
        }
        self
    }

    pub fn decoder(mut self, decoder: ResponseDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn configuration(mut self, configuration: ClientConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Build the client. Without a `session` in the configuration, the
    /// default transport is created from the configuration's settings.
    pub fn build(self) -> Result<NetworkClient, NetworkError> {
        let transport = match &self.configuration.session {
            Some(session) => session.clone(),
            None => default_transport(&self.configuration)?,
        };

        Ok(NetworkClient {
            adapters: self.adapters,
            decoder: self.decoder,
            configuration: self.configuration,
            transport,
        })
    }
}

#[cfg(feature = "reqwest-transport")]
fn default_transport(config: &ClientConfiguration) -> Result<Arc<dyn Transport>, NetworkError> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new(config)?))
}

#[cfg(all(not(feature = "reqwest-transport"), feature = "ureq-transport"))]
fn default_transport(config: &ClientConfiguration) -> Result<Arc<dyn Transport>, NetworkError> {
    Ok(Arc::new(crate::transport::UreqTransport::new(config)))
}

#[cfg(not(any(feature = "reqwest-transport", feature = "ureq-transport")))]
fn default_transport(_config: &ClientConfiguration) -> Result<Arc<dyn Transport>, NetworkError> {
    Err(NetworkError::Transport(crate::error::TransportError::engine(
        io::Error::new(io::ErrorKind::Unsupported, "no transport configured"),
    )))
}

/// How [`NetworkClient::download`] places the file.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Replace a file already at the destination. When `false`, an existing
    /// file makes the download fail and is left untouched.
    pub replace_existing: bool,
    /// Create missing parent directories of the destination.
    pub create_intermediate_directories: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            replace_existing: true,
            create_intermediate_directories: true,
        }
    }
}

/// Response of a round-trip that passed status classification.
struct Accepted {
    request: RequestDescriptor,
    metadata: ResponseMetadata,
    body: Bytes,
}

/// HTTP client that turns descriptors into typed results.
#[derive(Clone)]
pub struct NetworkClient {
    adapters: AdapterChain,
    decoder: ResponseDecoder,
    configuration: ClientConfiguration,
    transport: Arc<dyn Transport>,
}

impl NetworkClient {
    pub fn builder() -> NetworkClientBuilder {
        NetworkClientBuilder::default()
    }

    /// Client with default configuration and no adapters.
    pub fn new() -> Result<Self, NetworkError> {
        Self::builder().build()
    }

    pub fn configuration(&self) -> &ClientConfiguration {
        &self.configuration
    }

    /// Send a request and return the body of an accepted response.
    pub async fn send(&self, request: RequestDescriptor) -> Result<Bytes, NetworkError> {
        let accepted = self
            .exchange(request, &self.configuration.status_policy)
            .await?;
        self.log_success(&accepted);
        Ok(accepted.body)
    }

    /// The call as a stream that yields exactly one item.
    pub fn request_stream<'a, T>(
        &'a self,
        request: RequestDescriptor,
    ) -> BoxStream<'a, Result<T, NetworkError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        stream::once(async move {
            let accepted = self
                .exchange(request, &self.configuration.status_policy)
                .await?;
            let decoded = self.decode::<T>(&accepted);
            match &decoded {
                Ok(_) => self.log_success(&accepted),
                Err(err) => self.log_failure(&accepted.request, err),
            }
            decoded
        })
        .boxed()
    }

    /// Send a request and decode the body into `T`.
    ///
    /// An empty body decodes as `{}` when `T` is [`EmptyResponse`].
    pub async fn request<T>(&self, request: RequestDescriptor) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let log = LogData::request(&request);
        first_value(self.request_stream(request), log).await
    }

    /// Build the endpoint's descriptor and [`request`](Self::request) it.
    pub async fn request_endpoint<T, E>(&self, endpoint: &E) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send + 'static,
        E: Endpoint + ?Sized,
    {
        let request = endpoint.make_request()?;
        self.request(request).await
    }

    /// Like [`request`](Self::request), but a body that decodes as the
    /// caller's error type `E` is returned as [`DomainError::Domain`].
    ///
    /// For an accepted status, `T` is tried first, then `E`; if neither fits
    /// the decode error for `T` is returned. For a rejected status, `E` is
    /// tried and the status error is returned if it does not fit.
    pub async fn request_with_error<T, E>(
        &self,
        request: RequestDescriptor,
    ) -> Result<T, DomainError<E>>
    where
        T: DeserializeOwned + Send + 'static,
        E: DeserializeOwned,
    {
        let accepted = match self
            .exchange(request, &self.configuration.status_policy)
            .await
        {
            Ok(accepted) => accepted,
            Err(err) => {
                let domain = err
                    .log_data()
                    .and_then(|log| log.response_body.as_deref())
                    .and_then(|body| self.decoder.decode::<E>(body).ok());
                return Err(match domain {
                    Some(domain) => DomainError::Domain(domain),
                    None => DomainError::Network(err),
                });
            }
        };

        match self.decode::<T>(&accepted) {
            Ok(value) => {
                self.log_success(&accepted);
                Ok(value)
            }
            Err(err) => match self.decoder.decode::<E>(&accepted.body) {
                Ok(domain) => {
                    self.log_failure(&accepted.request, &err);
                    Err(DomainError::Domain(domain))
                }
                Err(_) => {
                    self.log_failure(&accepted.request, &err);
                    Err(DomainError::Network(err))
                }
            },
        }
    }

    /// Send a request that succeeds only with one of `statuses`; the body is
    /// ignored.
    pub async fn send_accepting(
        &self,
        request: RequestDescriptor,
        statuses: &[u16],
    ) -> Result<EmptyResponse, NetworkError> {
        let policy = StatusPolicy::List(statuses.to_vec());
        let accepted = self.exchange(request, &policy).await?;
        self.log_success(&accepted);
        Ok(EmptyResponse {})
    }

    /// Download the response body to `destination`.
    ///
    /// The body is streamed into a temporary file next to the destination
    /// and renamed into place only after the transfer and status check
    /// succeed. On failure the destination is left as it was.
    pub async fn download(
        &self,
        request: RequestDescriptor,
        destination: impl AsRef<Path>,
        options: DownloadOptions,
    ) -> Result<PathBuf, NetworkError> {
        let destination = destination.as_ref();
        let request = self.adapters.adapt(request);
        self.log_request(&request);

        match self.download_to(&request, destination, options).await {
            Ok(metadata) => {
                if let Some(logger) = &self.configuration.logger {
                    let log = LogData::response(&request, Some(&metadata), None, false);
                    let mut fields = log.metadata();
                    fields.insert(
                        "destination".into(),
                        MetadataValue::String(destination.display().to_string()),
                    );
                    logger.info(&log.message(), &fields);
                }
                Ok(destination.to_path_buf())
            }
            Err(err) => {
                self.log_failure(&request, &err);
                Err(err)
            }
        }
    }

    async fn download_to(
        &self,
        request: &RequestDescriptor,
        destination: &Path,
        options: DownloadOptions,
    ) -> Result<ResponseMetadata, NetworkError> {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if options.create_intermediate_directories {
            fs::create_dir_all(&parent)?;
        }
        if !options.replace_existing && destination.exists() {
            return Err(NetworkError::FileSystem(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", destination.display()),
            )));
        }

        let mut temp = NamedTempFile::new_in(&parent)?;
        let metadata = match self.transport.download(request, temp.as_file_mut()).await {
            Ok(metadata) => metadata,
            Err(err) => {
                self.adapters.complete(request, None, None, self.logger());
                return Err(err.into());
            }
        };
        self.adapters
            .complete(request, metadata.as_ref(), None, self.logger());

        let Some(metadata) = metadata else {
            return Err(NetworkError::BadContent(Box::new(LogData::request(request))));
        };
        if !self.configuration.status_policy.accepts(metadata.status) {
            let body = rejected_body(temp.path(), request, metadata.status);
            return Err(rejection(request, metadata, body));
        }

        let persisted = if options.replace_existing {
            temp.persist(destination)
        } else {
            temp.persist_noclobber(destination)
        };
        persisted.map_err(|err| NetworkError::FileSystem(err.error))?;

        Ok(metadata)
    }

    /// Steps 1 to 5 of the pipeline. Failures are logged here.
    async fn exchange(
        &self,
        request: RequestDescriptor,
        policy: &StatusPolicy,
    ) -> Result<Accepted, NetworkError> {
        let request = self.adapters.adapt(request);
        self.log_request(&request);

        let response = match self.transport.perform(&request).await {
            Ok(response) => response,
            Err(err) => {
                self.adapters.complete(&request, None, None, self.logger());
                let err = NetworkError::from(err);
                self.log_failure(&request, &err);
                return Err(err);
            }
        };
        self.adapters.complete(
            &request,
            response.metadata.as_ref(),
            Some(&response.body),
            self.logger(),
        );

        let Some(metadata) = response.metadata else {
            let log = LogData::response(&request, None, Some(&response.body), true);
            let err = NetworkError::BadContent(Box::new(log));
            self.log_failure(&request, &err);
            return Err(err);
        };
        if !policy.accepts(metadata.status) {
            let err = rejection(&request, metadata, response.body);
            self.log_failure(&request, &err);
            return Err(err);
        }

        Ok(Accepted {
            request,
            metadata,
            body: response.body,
        })
    }

    fn decode<T>(&self, accepted: &Accepted) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + 'static,
    {
        let body: &[u8] = if accepted.body.is_empty() && TypeId::of::<T>() == TypeId::of::<EmptyResponse>() {
            EMPTY_OBJECT
        } else {
            &accepted.body
        };

        self.decoder
            .decode(body)
            .map_err(|source| NetworkError::Decode {
                source,
                log: Box::new(LogData::response(
                    &accepted.request,
                    Some(&accepted.metadata),
                    Some(&accepted.body),
                    true,
                )),
            })
    }

    fn logger(&self) -> Option<&dyn Logger> {
        self.configuration.logger.as_deref()
    }

    fn log_request(&self, request: &RequestDescriptor) {
        if let Some(logger) = &self.configuration.logger {
            let log = LogData::request(request);
            logger.info(&log.message(), &log.metadata());
        }
    }

    fn log_success(&self, accepted: &Accepted) {
        if let Some(logger) = &self.configuration.logger {
            let log = LogData::response(
                &accepted.request,
                Some(&accepted.metadata),
                Some(&accepted.body),
                false,
            );
            logger.info(&log.message(), &log.metadata());
        }
    }

    fn log_failure(&self, request: &RequestDescriptor, err: &NetworkError) {
        if let Some(logger) = &self.configuration.logger {
            let fallback;
            let log = match err.log_data() {
                Some(log) => log,
                None => {
                    fallback = LogData::request(request);
                    &fallback
                }
            };
            logger.error(&format!("{} ({err})", log.message()), &log.metadata());
        }
    }
}

/// Body of a rejected download, read back from its temporary file. An
/// unreadable file yields an empty body.
fn rejected_body(path: &Path, request: &RequestDescriptor, status: u16) -> Bytes {
    match fs::read(path) {
        Ok(body) => Bytes::from(body),
        Err(err) => {
            tracing::warn!(
                request_id = %request.request_id,
                status,
                error = %err,
                "could not read rejected download body"
            );
            Bytes::new()
        }
    }
}

/// Map a rejected status to `Unauthorized` or `BadRequest`.
fn rejection(request: &RequestDescriptor, metadata: ResponseMetadata, body: Bytes) -> NetworkError {
    let status = metadata.status;
    let json = serde_json::from_slice::<Map<String, Value>>(&body).ok();
    let log = Box::new(LogData::response(request, Some(&metadata), Some(&body), true));
    if status == 401 {
        NetworkError::Unauthorized { status, json, log }
    } else {
        NetworkError::BadRequest { status, json, log }
    }
}

/// Await the first item of a single-value stream.
///
/// A stream that ends without yielding anything is reported as
/// [`NetworkError::FinishedWithoutValue`].
pub(crate) async fn first_value<T, S>(stream: S, log: LogData) -> Result<T, NetworkError>
where
    S: Stream<Item = Result<T, NetworkError>>,
{
    let mut stream = std::pin::pin!(stream);
    match stream.next().await {
        Some(result) => result,
        None => Err(NetworkError::FinishedWithoutValue(Box::new(log))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{BearerTokenAdapter, TokenStore};
    use crate::endpoint::ApiRequest;
    use crate::error::TransportError;
    use crate::http::RawResponse;
    use crate::log::Metadata;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    /// Transport that replays one scripted response and records requests.
    struct Scripted {
        status: Option<u16>,
        body: &'static str,
        seen: Mutex<Vec<RequestDescriptor>>,
    }

    impl Scripted {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status: Some(status),
                body,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn without_status() -> Self {
            Self {
                status: None,
                body: "garbage",
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn perform(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(RawResponse {
                metadata: self.status.map(|status| ResponseMetadata {
                    status,
                    headers: [("Content-Type", "application/json")].into_iter().collect(),
                }),
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl Transport for Failing {
        async fn perform(&self, _request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
            Err(TransportError::engine(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    #[derive(Default, Clone)]
    struct Recording(Arc<Mutex<Vec<(&'static str, String, Metadata)>>>);

    impl Logger for Recording {
        fn info(&self, message: &str, metadata: &Metadata) {
            self.0.lock().unwrap().push(("info", message.to_string(), metadata.clone()));
        }

        fn error(&self, message: &str, metadata: &Metadata) {
            self.0.lock().unwrap().push(("error", message.to_string(), metadata.clone()));
        }

        fn warning(&self, message: &str, metadata: &Metadata) {
            self.0.lock().unwrap().push(("warning", message.to_string(), metadata.clone()));
        }
    }

    struct PanicsOnComplete;

    impl RequestAdapter for PanicsOnComplete {
        fn adapt(&self, request: RequestDescriptor) -> RequestDescriptor {
            request
        }

        fn complete(&self, _: &RequestDescriptor, _: Option<&ResponseMetadata>, _: Option<&[u8]>) {
            panic!("observer failure");
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Slideshow {
        title: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct RemoteError {
        success: bool,
    }

    fn client(transport: Arc<Scripted>) -> NetworkClient {
        NetworkClient::builder()
            .configuration(ClientConfiguration::new().session(transport))
            .build()
            .unwrap()
    }

    fn get(path: &str) -> RequestDescriptor {
        ApiRequest::get("httpbin.org", path).make_request().unwrap()
    }

    #[tokio::test]
    async fn decodes_success_body() {
        let client = client(Arc::new(Scripted::new(200, r#"{"title":"Sample"}"#)));
        let value: Slideshow = client.request(get("/json")).await.unwrap();
        assert_eq!(value.title, "Sample");
    }

    #[tokio::test]
    async fn empty_body_decodes_as_empty_response() {
        let client = client(Arc::new(Scripted::new(200, "")));
        let value: EmptyResponse = client.request(get("/status/200")).await.unwrap();
        assert_eq!(value, EmptyResponse {});
    }

    #[tokio::test]
    async fn empty_body_for_other_types_is_decode_error() {
        let client = client(Arc::new(Scripted::new(200, "")));
        let err = client.request::<Slideshow>(get("/status/200")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Decode { .. }));
    }

    #[tokio::test]
    async fn server_error_is_bad_request_with_json() {
        let client = client(Arc::new(Scripted::new(500, r#"{"message":"boom"}"#)));
        let err = client.request::<EmptyResponse>(get("/status/500")).await.unwrap_err();
        match err {
            NetworkError::BadRequest { status, json, .. } => {
                assert_eq!(status, 500);
                assert_eq!(json.unwrap()["message"], "boom");
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_has_no_json() {
        let client = client(Arc::new(Scripted::new(404, "not found")));
        let err = client.send(get("/missing")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.json_body().is_none());
    }

    #[tokio::test]
    async fn status_401_is_unauthorized() {
        let client = client(Arc::new(Scripted::new(401, "")));
        let err = client.send(get("/secret")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Unauthorized { status: 401, .. }));
    }

    #[tokio::test]
    async fn missing_status_is_bad_content() {
        let client = client(Arc::new(Scripted::without_status()));
        let err = client.send(get("/json")).await.unwrap_err();
        assert!(matches!(err, NetworkError::BadContent(_)));
    }

    #[tokio::test]
    async fn transport_error_passes_through() {
        let client = NetworkClient::builder()
            .configuration(ClientConfiguration::new().session(Failing))
            .build()
            .unwrap();
        let err = client.send(get("/json")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Transport(_)));
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn lenient_policy_accepts_redirect_status() {
        let transport = Arc::new(Scripted::new(304, ""));
        let client = NetworkClient::builder()
            .configuration(
                ClientConfiguration::new()
                    .session(transport)
                    .status_policy(StatusPolicy::LENIENT),
            )
            .build()
            .unwrap();
        let value: EmptyResponse = client.request(get("/cached")).await.unwrap();
        assert_eq!(value, EmptyResponse::default());
    }

    #[tokio::test]
    async fn adapters_apply_in_order_before_transport() {
        let transport = Arc::new(Scripted::new(200, "{}"));
        let client = NetworkClient::builder()
            .adapter(crate::adapter::HeaderAdapter::new().header("X-Order", "first"))
            .adapter(crate::adapter::HeaderAdapter::new().header("X-Order", "second"))
            .configuration(ClientConfiguration::new().session(transport.clone()))
            .build()
            .unwrap();
        client.send(get("/anything")).await.unwrap();
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].headers.get("x-order"), Some("second"));
    }

    #[tokio::test]
    async fn complete_runs_on_failure_paths() {
        let store = TokenStore::new("expired");
        let transport = Arc::new(Scripted::new(401, ""));
        let client = NetworkClient::builder()
            .adapter(BearerTokenAdapter::new(store.clone()))
            .configuration(ClientConfiguration::new().session(transport.clone()))
            .build()
            .unwrap();
        let _ = client.send(get("/me")).await;
        assert_eq!(
            transport.seen.lock().unwrap()[0].headers.get("Authorization"),
            Some("Bearer expired")
        );
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn domain_error_decoded_when_success_type_does_not_fit() {
        let client = client(Arc::new(Scripted::new(200, r#"{"success":false}"#)));
        let err = client
            .request_with_error::<Slideshow, RemoteError>(get("/weather"))
            .await
            .unwrap_err();
        assert_eq!(err.domain(), Some(&RemoteError { success: false }));
    }

    #[tokio::test]
    async fn domain_error_decoded_from_rejected_status() {
        let client = client(Arc::new(Scripted::new(400, r#"{"success":false}"#)));
        let err = client
            .request_with_error::<Slideshow, RemoteError>(get("/weather"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Domain(RemoteError { success: false })));
    }

    #[tokio::test]
    async fn undecodable_body_surfaces_original_decode_error() {
        let client = client(Arc::new(Scripted::new(200, r#"{"other":1}"#)));
        let err = client
            .request_with_error::<Slideshow, RemoteError>(get("/weather"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Network(NetworkError::Decode { .. })));
    }

    #[tokio::test]
    async fn success_type_wins_over_domain_error() {
        let client = client(Arc::new(Scripted::new(200, r#"{"title":"ok"}"#)));
        let value = client
            .request_with_error::<Slideshow, RemoteError>(get("/json"))
            .await
            .unwrap();
        assert_eq!(value.title, "ok");
    }

    #[tokio::test]
    async fn send_accepting_checks_exact_codes() {
        let client = client(Arc::new(Scripted::new(202, "")));
        assert!(client.send_accepting(get("/jobs"), &[202]).await.is_ok());
        let err = client.send_accepting(get("/jobs"), &[200]).await.unwrap_err();
        assert_eq!(err.status(), Some(202));
    }

    #[tokio::test]
    async fn stream_yields_single_value() {
        let client = client(Arc::new(Scripted::new(200, r#"{"title":"Stream"}"#)));
        let items: Vec<Result<Slideshow, NetworkError>> =
            client.request_stream::<Slideshow>(get("/json")).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().title, "Stream");
    }

    #[tokio::test]
    async fn exhausted_stream_is_finished_without_value() {
        let log = LogData::request(&get("/json"));
        let err = first_value(stream::empty::<Result<(), NetworkError>>(), log)
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::FinishedWithoutValue(_)));
        assert_eq!(err.code(), 105);
    }

    #[tokio::test]
    async fn logs_request_and_response() {
        let logger = Recording::default();
        let transport = Arc::new(Scripted::new(200, r#"{"title":"Logged"}"#));
        let client = NetworkClient::builder()
            .configuration(ClientConfiguration::new().session(transport).logger(logger.clone()))
            .build()
            .unwrap();
        let _: Slideshow = client.request(get("/json")).await.unwrap();

        let events = logger.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "info");
        assert_eq!(events[0].1, "[GET] https://httpbin.org/json");
        assert_eq!(events[1].1, "[GET] https://httpbin.org/json -> 200");
        assert!(!events[1].2.contains_key("response_body"));
        assert_eq!(events[0].2["request_id"], events[1].2["request_id"]);
    }

    #[tokio::test]
    async fn adapter_panic_is_logged_as_warning() {
        let logger = Recording::default();
        let transport = Arc::new(Scripted::new(200, r#"{"title":"Still fine"}"#));
        let client = NetworkClient::builder()
            .adapter(PanicsOnComplete)
            .configuration(ClientConfiguration::new().session(transport).logger(logger.clone()))
            .build()
            .unwrap();
        let value: Slideshow = client.request(get("/json")).await.unwrap();
        assert_eq!(value.title, "Still fine");

        let events = logger.0.lock().unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.0).collect();
        assert_eq!(kinds, vec!["info", "warning", "info"]);
        assert_eq!(events[1].2["adapter"], MetadataValue::String("0".into()));
    }

    #[test]
    fn unreadable_rejected_body_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let request = get("/missing");
        let mut body = Bytes::from_static(b"stale");
        let output = crate::log::capture_events(|| {
            body = rejected_body(&dir.path().join("gone.tmp"), &request, 404);
        });
        assert!(body.is_empty());
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("could not read rejected download body"));
        assert!(output.contains("status=404"));
    }

    #[tokio::test]
    async fn logs_error_with_response_body() {
        let logger = Recording::default();
        let transport = Arc::new(Scripted::new(500, r#"{"message":"boom"}"#));
        let client = NetworkClient::builder()
            .configuration(ClientConfiguration::new().session(transport).logger(logger.clone()))
            .build()
            .unwrap();
        let _ = client.send(get("/status/500")).await;

        let events = logger.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, "error");
        assert!(events[1].2.contains_key("response_body"));
    }

    #[tokio::test]
    async fn download_moves_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested/deeper/file.json");
        let client = client(Arc::new(Scripted::new(200, r#"{"title":"file"}"#)));

        let path = client
            .download(get("/json"), &destination, DownloadOptions::default())
            .await
            .unwrap();
        assert_eq!(path, destination);
        assert_eq!(fs::read_to_string(&destination).unwrap(), r#"{"title":"file"}"#);
    }

    #[tokio::test]
    async fn download_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("file.txt");
        fs::write(&destination, "old").unwrap();
        let client = client(Arc::new(Scripted::new(200, "new")));

        client
            .download(get("/bytes"), &destination, DownloadOptions::default())
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "new");
    }

    #[tokio::test]
    async fn download_without_replace_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("file.txt");
        fs::write(&destination, "old").unwrap();
        let client = client(Arc::new(Scripted::new(200, "new")));
        let options = DownloadOptions {
            replace_existing: false,
            ..DownloadOptions::default()
        };

        let err = client.download(get("/bytes"), &destination, options).await.unwrap_err();
        assert!(matches!(err, NetworkError::FileSystem(_)));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "old");
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("file.txt");
        let client = client(Arc::new(Scripted::new(404, r#"{"error":"missing"}"#)));

        let err = client
            .download(get("/missing"), &destination, DownloadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.json_body().unwrap()["error"], "missing");
        assert!(!destination.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
