//! The rewrite pipeline: an ordered chain of request mutators applied
//! before upstream dispatch and response mutators applied after.
//!
//! [`RewriteRegistry`] is the fluent registration surface. Each operation
//! appends one closure to the request-side or response-side sequence;
//! registration order is execution order. The terminal
//! [`RewriteRegistry::into_proxy`] seals both sequences into a
//! [`ReverseProxy`](crate::proxy::ReverseProxy).

pub mod body;
pub mod cookie;
pub mod header;
pub mod host;
pub mod redirect;
pub mod url;

use std::sync::Arc;

use regex::Regex;

use crate::exchange::{ProxyRequest, ProxyResponse};
use crate::proxy::ReverseProxy;
use crate::transport::Transport;
use self::url::UrlParts;

/// `X-Forwarded-Host`: the caller-facing host, recorded before rewriting.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
/// `X-Forwarded-Path`: the caller-facing URL path, recorded before rewriting.
pub const X_FORWARDED_PATH: &str = "x-forwarded-path";
/// `X-Forwarded-Proto`: the caller-facing URL scheme, recorded before rewriting.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// A single registered request mutation.
pub type RequestRewrite = Box<dyn Fn(&mut ProxyRequest) + Send + Sync>;
/// A single registered response mutation.
pub type ResponseRewrite = Box<dyn Fn(&mut ProxyResponse) + Send + Sync>;

/// Ordered sequences of request and response mutators, built fluently and
/// sealed by [`RewriteRegistry::into_proxy`].
#[derive(Default)]
pub struct RewriteRegistry {
    request_rewrites: Vec<RequestRewrite>,
    response_rewrites: Vec<ResponseRewrite>,
}

impl RewriteRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary request mutator.
    pub fn request_rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&mut ProxyRequest) + Send + Sync + 'static,
    {
        self.request_rewrites.push(Box::new(rewrite));
        self
    }

    /// Register an arbitrary response mutator.
    pub fn response_rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&mut ProxyResponse) + Send + Sync + 'static,
    {
        self.response_rewrites.push(Box::new(rewrite));
        self
    }

    /// Rewrite the request target onto the upstream and stamp the
    /// forwarding headers.
    pub fn rewrite_host(mut self, forwarded_url: &UrlParts, path_prefix: &str) -> Self {
        self.request_rewrites
            .push(host::rewrite(forwarded_url.clone(), path_prefix.to_string()));
        self
    }

    /// Rewrite the response `Location` header back into the public
    /// address space.
    pub fn rewrite_redirect(mut self, forwarded_url: &UrlParts, path_prefix: &str) -> Self {
        self.response_rewrites.push(redirect::rewrite(
            forwarded_url.clone(),
            path_prefix.to_string(),
        ));
        self
    }

    /// Replace occurrences of the public URL in the request body with the
    /// upstream URL.
    pub fn rewrite_request_body(mut self, forwarded_url: &UrlParts, path_prefix: &str) -> Self {
        self.request_rewrites.push(body::rewrite_request(
            forwarded_url.clone(),
            path_prefix.to_string(),
        ));
        self
    }

    /// Replace occurrences of the upstream URL in the response body with
    /// the public URL.
    pub fn rewrite_response_body(mut self, forwarded_url: &UrlParts, path_prefix: &str) -> Self {
        self.response_rewrites.push(body::rewrite_response(
            forwarded_url.clone(),
            path_prefix.to_string(),
        ));
        self
    }

    /// Translate request cookie paths from the public prefix to the
    /// upstream prefix.
    pub fn rewrite_request_cookies(mut self, forwarded_url: &UrlParts, path_prefix: &str) -> Self {
        self.request_rewrites.push(cookie::rewrite_request(
            forwarded_url.clone(),
            path_prefix.to_string(),
        ));
        self
    }

    /// Translate response cookie paths from the upstream prefix to the
    /// public prefix.
    pub fn rewrite_response_cookies(mut self, forwarded_url: &UrlParts, path_prefix: &str) -> Self {
        self.response_rewrites.push(cookie::rewrite_response(
            forwarded_url.clone(),
            path_prefix.to_string(),
        ));
        self
    }

    /// Append a value under a request header.
    pub fn add_request_header(self, name: &str, value: &str) -> Self {
        self.add_request_header_if(name, value, |_| true)
    }

    /// Append a value under a request header when `predicate` holds.
    pub fn add_request_header_if<P>(mut self, name: &str, value: &str, predicate: P) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites
            .push(header::add(name.to_string(), value.to_string(), predicate));
        self
    }

    /// Replace all values of a request header with one.
    pub fn set_request_header(self, name: &str, value: &str) -> Self {
        self.set_request_header_if(name, value, |_| true)
    }

    /// Replace all values of a request header with one when `predicate`
    /// holds.
    pub fn set_request_header_if<P>(mut self, name: &str, value: &str, predicate: P) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites
            .push(header::set(name.to_string(), value.to_string(), predicate));
        self
    }

    /// Copy the first value of `source` into `destination`, overwriting.
    pub fn copy_request_header(self, source: &str, destination: &str) -> Self {
        self.copy_request_header_if(source, destination, |_| true)
    }

    /// Copy the first value of `source` into `destination` when
    /// `predicate` holds.
    pub fn copy_request_header_if<P>(mut self, source: &str, destination: &str, predicate: P) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites.push(header::copy(
            source.to_string(),
            destination.to_string(),
            predicate,
        ));
        self
    }

    /// Remove all values of a request header.
    pub fn delete_request_header(self, name: &str) -> Self {
        self.delete_request_header_if(name, |_| true)
    }

    /// Remove all values of a request header when `predicate` holds.
    pub fn delete_request_header_if<P>(mut self, name: &str, predicate: P) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites
            .push(header::delete(name.to_string(), predicate));
        self
    }

    /// Regex-substitute the value of a request header.
    pub fn replace_request_header(self, name: &str, pattern: Regex, replacement: &str) -> Self {
        self.replace_request_header_if(name, pattern, replacement, |_| true)
    }

    /// Regex-substitute the value of a request header when `predicate`
    /// holds.
    pub fn replace_request_header_if<P>(
        mut self,
        name: &str,
        pattern: Regex,
        replacement: &str,
        predicate: P,
    ) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites.push(header::replace(
            name.to_string(),
            pattern,
            replacement.to_string(),
            predicate,
        ));
        self
    }

    /// Regex-substitute each comma-separated segment of a request header.
    pub fn replace_request_header_value(
        self,
        name: &str,
        pattern: Regex,
        replacement: &str,
    ) -> Self {
        self.replace_request_header_value_if(name, pattern, replacement, |_| true)
    }

    /// Regex-substitute each comma-separated segment of a request header
    /// when `predicate` holds.
    pub fn replace_request_header_value_if<P>(
        mut self,
        name: &str,
        pattern: Regex,
        replacement: &str,
        predicate: P,
    ) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites.push(header::replace_value(
            name.to_string(),
            pattern,
            replacement.to_string(),
            predicate,
        ));
        self
    }

    /// Regex-substitute the request body, repairing framing.
    pub fn replace_request_body(self, pattern: regex::bytes::Regex, replacement: &str) -> Self {
        self.replace_request_body_if(pattern, replacement, |_| true)
    }

    /// Regex-substitute the request body when `predicate` holds.
    pub fn replace_request_body_if<P>(
        mut self,
        pattern: regex::bytes::Regex,
        replacement: &str,
        predicate: P,
    ) -> Self
    where
        P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
    {
        self.request_rewrites
            .push(body::replace_request(pattern, replacement.to_string(), predicate));
        self
    }

    /// Regex-substitute the value of a response header.
    pub fn replace_response_header(self, name: &str, pattern: Regex, replacement: &str) -> Self {
        self.replace_response_header_if(name, pattern, replacement, |_| true)
    }

    /// Regex-substitute the value of a response header when `predicate`
    /// holds.
    pub fn replace_response_header_if<P>(
        mut self,
        name: &str,
        pattern: Regex,
        replacement: &str,
        predicate: P,
    ) -> Self
    where
        P: Fn(&ProxyResponse) -> bool + Send + Sync + 'static,
    {
        self.response_rewrites.push(header::replace_response(
            name.to_string(),
            pattern,
            replacement.to_string(),
            predicate,
        ));
        self
    }

    /// Regex-substitute the response body, repairing framing.
    pub fn replace_response_body(self, pattern: regex::bytes::Regex, replacement: &str) -> Self {
        self.replace_response_body_if(pattern, replacement, |_| true)
    }

    /// Regex-substitute the response body when `predicate` holds.
    pub fn replace_response_body_if<P>(
        mut self,
        pattern: regex::bytes::Regex,
        replacement: &str,
        predicate: P,
    ) -> Self
    where
        P: Fn(&ProxyResponse) -> bool + Send + Sync + 'static,
    {
        self.response_rewrites
            .push(body::replace_response(pattern, replacement.to_string(), predicate));
        self
    }

    /// Seal the registry into a reverse proxy over `transport`.
    pub fn into_proxy(self, transport: Arc<dyn Transport>) -> ReverseProxy {
        ReverseProxy::new(self.request_rewrites, self.response_rewrites, transport)
    }
}
