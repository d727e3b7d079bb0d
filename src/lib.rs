//! URL-rewriting HTTP reverse proxy.
//!
//! Fronts a single upstream under a different public host and optional
//! path prefix, rewriting the exchange in flight so the upstream never
//! needs to know:
//!
//! - Host/path/scheme translation with prefix stripping and grafting
//! - `X-Forwarded-Host` / `X-Forwarded-Path` / `X-Forwarded-Proto` stamping
//! - Body URL translation in both directions, with `Content-Length` repair
//! - Redirect `Location` rewriting back into the public address space
//! - Cookie `Path` translation in both directions
//! - Generic header and regex body operations, each with an optional
//!   predicate
//!
//! Mutators are registered fluently and run in registration order:
//!
//! ```no_run
//! use std::sync::Arc;
//! use rewrite_proxy::{HttpTransport, RewriteRegistry, UrlParts};
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = UrlParts::parse("http://backend:8080/two");
//! let transport = Arc::new(HttpTransport::new(false)?);
//!
//! let proxy = RewriteRegistry::new()
//!     .rewrite_host(&backend, "/one")
//!     .rewrite_redirect(&backend, "/one")
//!     .into_proxy(transport);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! proxy.run(listener).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod exchange;
pub mod proxy;
pub mod rewrite;
pub mod transport;

pub use config::{ConfigError, ProxyConfig};
pub use exchange::{ProxyRequest, ProxyResponse};
pub use proxy::ReverseProxy;
pub use rewrite::url::UrlParts;
pub use rewrite::RewriteRegistry;
pub use transport::{HttpTransport, Transport, TransportError};
