//! The network engine seam.
//!
//! # Design
//! The client never talks to a socket. It hands a finished
//! `RequestDescriptor` to a [`Transport`] and gets status, headers and body
//! back. Connection reuse, TLS and redirects stay inside the engine behind
//! the trait, and tests swap in scripted transports.

#[cfg(feature = "reqwest-transport")]
mod reqwest_impl;
#[cfg(feature = "ureq-transport")]
mod ureq_impl;

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{RawResponse, RequestDescriptor, ResponseMetadata};

#[cfg(feature = "reqwest-transport")]
pub use reqwest_impl::ReqwestTransport;
#[cfg(feature = "ureq-transport")]
pub use ureq_impl::UreqTransport;

/// Executes requests on behalf of `NetworkClient`.
///
/// Implementations report any status code as a successful round-trip;
/// classification happens in the client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and buffer the whole body.
    async fn perform(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;

    /// Perform the request and stream the body into `sink`.
    ///
    /// The default buffers through [`Transport::perform`]; engines that can
    /// stream should override it.
    async fn download(
        &self,
        request: &RequestDescriptor,
        sink: &mut (dyn Write + Send),
    ) -> Result<Option<ResponseMetadata>, TransportError> {
        let response = self.perform(request).await?;
        sink.write_all(&response.body)?;
        sink.flush()?;
        Ok(response.metadata)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn perform(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        (**self).perform(request).await
    }

    async fn download(
        &self,
        request: &RequestDescriptor,
        sink: &mut (dyn Write + Send),
    ) -> Result<Option<ResponseMetadata>, TransportError> {
        (**self).download(request, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, HttpMethod};
    use bytes::Bytes;
    use url::Url;

    struct Fixed;

    #[async_trait]
    impl Transport for Fixed {
        async fn perform(&self, _request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
            Ok(RawResponse {
                metadata: Some(ResponseMetadata {
                    status: 200,
                    headers: Headers::new(),
                }),
                body: Bytes::from_static(b"payload"),
            })
        }
    }

    #[tokio::test]
    async fn default_download_writes_buffered_body() {
        let request =
            RequestDescriptor::new(HttpMethod::Get, Url::parse("https://example.com/f").unwrap());
        let mut sink = Vec::new();
        let metadata = Fixed.download(&request, &mut sink).await.unwrap();
        assert_eq!(metadata.unwrap().status, 200);
        assert_eq!(sink, b"payload");
    }
}
