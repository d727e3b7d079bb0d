//! Upstream dispatch.
//!
//! The assembler takes the round-tripper as an injected dependency so the
//! pipeline can be exercised against fakes; [`HttpTransport`] is the
//! production implementation over a pooled hyper client with optional
//! certificate-validation skipping for HTTPS upstreams.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Body type produced by a transport.
pub type UpstreamBody = BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A round-tripper: dispatches one upstream request and yields the
/// upstream response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<UpstreamBody>, TransportError>;
}

/// HTTP/HTTPS transport over a pooled hyper client.
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpTransport {
    /// Build the transport. With `skip_tls_validation` the connector
    /// accepts any upstream certificate.
    pub fn new(skip_tls_validation: bool) -> Result<Self, TransportError> {
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(skip_tls_validation)
            .build()?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let connector = HttpsConnector::from((http, tls.into()));

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<UpstreamBody>, TransportError> {
        let response = self.client.request(request).await?;
        Ok(response.map(|body| {
            body.map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
                .boxed()
        }))
    }
}

/// Errors raised while constructing the transport or dispatching upstream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("upstream dispatch failed: {0}")]
    Dispatch(#[from] hyper_util::client::legacy::Error),

    #[error("upstream connection failed: {0}")]
    Connect(#[from] std::io::Error),
}
