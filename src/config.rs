//! Proxy configuration.
//!
//! Built once at startup from flags or environment and immutable after
//! construction. Validation failures are fatal before any socket binds.

use url::Url;

use crate::rewrite::url::UrlParts;

/// Configuration for one proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream absolute URL. Its path component is the upstream prefix
    /// grafted onto forwarded requests.
    pub forwarded_url: UrlParts,
    /// Public-facing path prefix expected on inbound requests. May be
    /// empty or `/`.
    pub path_prefix: String,
    /// Accept any upstream certificate.
    pub skip_tls_validation: bool,
    /// Inbound header to copy into `X-Forwarded-Host` before rewriting.
    pub forwarded_host_header: Option<String>,
    /// Inbound header to copy into `X-Forwarded-Path` before rewriting.
    pub forwarded_path_header: Option<String>,
}

impl ProxyConfig {
    /// Create a configuration for the given upstream URL.
    ///
    /// The URL must be absolute with a host; the original text is kept
    /// verbatim for the rewrite pipeline, so `http://backend` and
    /// `http://backend/` stay distinct.
    pub fn new(forwarded_url: &str) -> Result<Self, ConfigError> {
        if forwarded_url.trim().is_empty() {
            return Err(ConfigError::MissingForwardedUrl);
        }
        let validated = Url::parse(forwarded_url)?;
        if !validated.has_host() {
            return Err(ConfigError::MissingHost(forwarded_url.to_string()));
        }

        Ok(Self {
            forwarded_url: UrlParts::parse(forwarded_url),
            path_prefix: String::new(),
            skip_tls_validation: false,
            forwarded_host_header: None,
            forwarded_path_header: None,
        })
    }

    /// Set the public-facing path prefix.
    pub fn with_path_prefix(mut self, path_prefix: &str) -> Self {
        self.path_prefix = path_prefix.to_string();
        self
    }

    /// Disable upstream certificate validation.
    pub fn with_skip_tls_validation(mut self, skip: bool) -> Self {
        self.skip_tls_validation = skip;
        self
    }

    /// Seed `X-Forwarded-Host` from the named inbound header.
    pub fn with_forwarded_host_header(mut self, header: &str) -> Self {
        self.forwarded_host_header = Some(header.to_string());
        self
    }

    /// Seed `X-Forwarded-Path` from the named inbound header.
    pub fn with_forwarded_path_header(mut self, header: &str) -> Self {
        self.forwarded_path_header = Some(header.to_string());
        self
    }
}

/// Configuration errors. All fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required forwarded URL")]
    MissingForwardedUrl,

    #[error("forwarded URL is not a valid absolute URL: {0}")]
    InvalidForwardedUrl(#[from] url::ParseError),

    #[error("forwarded URL has no host: {0}")]
    MissingHost(String),
}
