use std::io::{self, Write};

use async_trait::async_trait;
use ureq::http;

use super::Transport;
use crate::config::ClientConfiguration;
use crate::error::TransportError;
use crate::http::{Headers, RawResponse, RequestDescriptor, ResponseMetadata};

/// Blocking transport built on `ureq`.
///
/// The round-trip runs on the calling task's thread. Status codes are
/// returned as data, never as errors.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    default_headers: Vec<(&'static str, &'static str)>,
}

impl UreqTransport {
    pub fn new(config: &ClientConfiguration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_recv_body(Some(config.request_timeout))
            .timeout_global(Some(config.resource_timeout))
            .build()
            .new_agent();

        Self {
            agent,
            default_headers: config.cache_policy.request_headers().to_vec(),
        }
    }

    fn call(&self, request: &RequestDescriptor) -> Result<http::Response<ureq::Body>, TransportError> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &self.default_headers {
            if !request.headers.contains(name) {
                builder = builder.header(*name, *value);
            }
        }
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        let body = request.body.as_deref().unwrap_or_default().to_vec();
        let http_request = builder.body(body).map_err(TransportError::engine)?;

        self.agent.run(http_request).map_err(TransportError::engine)
    }
}

fn metadata(response: &http::Response<ureq::Body>) -> ResponseMetadata {
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
impl Transport for UreqTransport {
    async fn perform(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let mut response = self.call(request)?;
        let metadata = metadata(&response);
        // ureq caps buffered bodies at 10 MiB unless told otherwise.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(TransportError::engine)?;

        Ok(RawResponse {
            metadata: Some(metadata),
            body: body.into(),
        })
    }

    async fn download(
        &self,
        request: &RequestDescriptor,
        sink: &mut (dyn Write + Send),
    ) -> Result<Option<ResponseMetadata>, TransportError> {
        let mut response = self.call(request)?;
        let metadata = metadata(&response);
        let mut reader = response.body_mut().as_reader();
        io::copy(&mut reader, sink)?;
        sink.flush()?;

        Ok(Some(metadata))
    }
}
