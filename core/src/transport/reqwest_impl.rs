use std::io::Write;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use super::Transport;
use crate::config::ClientConfiguration;
use crate::error::TransportError;
use crate::http::{Headers, HttpMethod, RawResponse, RequestDescriptor, ResponseMetadata};

/// Async transport built on `reqwest`.
///
/// Timeouts and cache headers come from the `ClientConfiguration` the
/// transport was built with and apply to every request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfiguration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in config.cache_policy.request_headers() {
            headers.insert(*name, HeaderValue::from_static(*value));
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .read_timeout(config.request_timeout)
            .timeout(config.resource_timeout)
            .build()
            .map_err(TransportError::engine)?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest::Client`, keeping its own settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &RequestDescriptor) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method(request.method), request.url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

fn metadata(response: &reqwest::Response) -> ResponseMetadata {
    ResponseMetadata {
        status: response.status().as_u16(),
        headers: response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect::<Headers>(),
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let response = self
            .build(request)
            .send()
            .await
            .map_err(TransportError::engine)?;
        let metadata = metadata(&response);
        let body = response.bytes().await.map_err(TransportError::engine)?;

        Ok(RawResponse {
            metadata: Some(metadata),
            body,
        })
    }

    async fn download(
        &self,
        request: &RequestDescriptor,
        sink: &mut (dyn Write + Send),
    ) -> Result<Option<ResponseMetadata>, TransportError> {
        let mut response = self
            .build(request)
            .send()
            .await
            .map_err(TransportError::engine)?;
        let metadata = metadata(&response);

        while let Some(chunk) = response.chunk().await.map_err(TransportError::engine)? {
            sink.write_all(&chunk)?;
        }
        sink.flush()?;

        Ok(Some(metadata))
    }
}
