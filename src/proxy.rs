//! The proxy assembler: binds the sealed rewrite pipeline to an injected
//! transport and serves it as an HTTP handler.
//!
//! Per exchange: buffer the inbound body, run the request mutators in
//! registration order, dispatch via the transport, wrap the upstream
//! response (carrying its originating request) and run the response
//! mutators, then stream status, headers and body back to the client.
//! Transport failures surface as 502 and skip the response chain.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, HOST};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::exchange::{ProxyRequest, ProxyResponse};
use crate::rewrite::url::UrlParts;
use crate::rewrite::{
    RequestRewrite, ResponseRewrite, RewriteRegistry, X_FORWARDED_HOST, X_FORWARDED_PATH,
};
use crate::transport::{HttpTransport, Transport, TransportError, UpstreamBody};

/// Hop-by-hop headers are connection-scoped and never forwarded.
const HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// A complete reverse-proxy handler: the sealed mutator sequences plus the
/// transport they dispatch through. Immutable once assembled, shared
/// across all exchanges.
pub struct ReverseProxy {
    request_rewrites: Vec<RequestRewrite>,
    response_rewrites: Vec<ResponseRewrite>,
    transport: Arc<dyn Transport>,
}

impl ReverseProxy {
    pub(crate) fn new(
        request_rewrites: Vec<RequestRewrite>,
        response_rewrites: Vec<ResponseRewrite>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            request_rewrites,
            response_rewrites,
            transport,
        }
    }

    /// Assemble the standard rewrite chain over an [`HttpTransport`]
    /// honoring the configured certificate-validation toggle.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(config.skip_tls_validation)?);
        Ok(Self::from_config_with_transport(config, transport))
    }

    /// Assemble the standard rewrite chain over a caller-supplied
    /// transport: optional forwarding-header seeding, host/path rewrite,
    /// body and cookie translation on the way in, redirect, body and
    /// cookie translation on the way out.
    pub fn from_config_with_transport(
        config: &ProxyConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut registry = RewriteRegistry::new();
        if let Some(header) = &config.forwarded_host_header {
            registry = registry.copy_request_header(header, X_FORWARDED_HOST);
        }
        if let Some(header) = &config.forwarded_path_header {
            registry = registry.copy_request_header(header, X_FORWARDED_PATH);
        }
        registry
            .rewrite_host(&config.forwarded_url, &config.path_prefix)
            .rewrite_request_body(&config.forwarded_url, &config.path_prefix)
            .rewrite_request_cookies(&config.forwarded_url, &config.path_prefix)
            .rewrite_redirect(&config.forwarded_url, &config.path_prefix)
            .rewrite_response_body(&config.forwarded_url, &config.path_prefix)
            .rewrite_response_cookies(&config.forwarded_url, &config.path_prefix)
            .into_proxy(transport)
    }

    /// Handle one exchange.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Error: std::fmt::Display,
    {
        let mut request = ingest_request(request).await;
        for rewrite in &self.request_rewrites {
            rewrite(&mut request);
        }

        let upstream_request = match build_upstream_request(&request) {
            Ok(upstream_request) => upstream_request,
            Err(err) => {
                warn!(error = %err, target_url = %request.url, "failed to build upstream request");
                return bad_gateway();
            }
        };

        let upstream_response = match self.transport.round_trip(upstream_request).await {
            Ok(upstream_response) => upstream_response,
            Err(err) => {
                warn!(error = %err, "upstream dispatch failed");
                return bad_gateway();
            }
        };

        let mut response = ingest_response(upstream_response, request).await;
        for rewrite in &self.response_rewrites {
            rewrite(&mut response);
        }
        emit_response(response)
    }

    /// Serve exchanges from `listener` until ctrl-c.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        let proxy = Arc::new(self);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = accepted?;
                    let proxy = proxy.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |request| {
                            let proxy = proxy.clone();
                            async move { Ok::<_, Infallible>(proxy.handle(request).await) }
                        });
                        if let Err(err) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            debug!(remote_addr = %remote_addr, error = %err, "connection closed with error");
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Buffer the inbound request into its mutable record. Body read failures
/// degrade to an empty body so the exchange still forwards.
async fn ingest_request<B>(request: Request<B>) -> ProxyRequest
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = request.into_parts();
    let original_uri = parts.uri.to_string();

    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|authority| authority.to_string()))
        .unwrap_or_default();

    let mut headers = strip_hop_headers(&parts.headers);
    headers.remove(HOST);

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to read request body, forwarding empty body");
            Bytes::new()
        }
    };
    let content_length = bytes.len() as u64;
    let body = if bytes.is_empty() { None } else { Some(bytes) };

    ProxyRequest {
        method: parts.method,
        url: UrlParts::parse(&original_uri),
        host,
        headers,
        body,
        content_length,
        original_uri,
    }
}

/// Buffer the upstream response into its mutable record, attaching the
/// originating request.
async fn ingest_response(
    response: Response<UpstreamBody>,
    request: ProxyRequest,
) -> ProxyResponse {
    let (parts, body) = response.into_parts();
    let headers = strip_hop_headers(&parts.headers);

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to read upstream body, returning empty body");
            Bytes::new()
        }
    };
    let content_length = bytes.len() as u64;
    let body = if bytes.is_empty() { None } else { Some(bytes) };

    ProxyResponse {
        status: parts.status,
        headers,
        body,
        content_length,
        request,
    }
}

fn build_upstream_request(request: &ProxyRequest) -> Result<Request<Full<Bytes>>, http::Error> {
    let mut upstream = Request::builder()
        .method(request.method.clone())
        .uri(request.url.to_string())
        .body(Full::new(request.body.clone().unwrap_or_default()))?;

    *upstream.headers_mut() = request.headers.clone();
    if let Ok(host) = HeaderValue::from_str(&request.host) {
        upstream.headers_mut().insert(HOST, host);
    }
    Ok(upstream)
}

fn emit_response(response: ProxyResponse) -> Response<Full<Bytes>> {
    let mut emitted = Response::new(Full::new(response.body.unwrap_or_default()));
    *emitted.status_mut() = response.status;
    *emitted.headers_mut() = response.headers;
    emitted
}

fn bad_gateway() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"bad gateway")));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
}

fn strip_hop_headers(headers: &HeaderMap) -> HeaderMap {
    let mut stripped = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_HEADERS
            .iter()
            .any(|hop| name.as_str().eq_ignore_ascii_case(hop))
        {
            stripped.append(name.clone(), value.clone());
        }
    }
    stripped
}
