//! Per-exchange request and response records.
//!
//! These are the mutable values the rewrite pipeline operates on. The
//! assembler builds a [`ProxyRequest`] from the inbound HTTP request with
//! the body fully buffered, runs the request mutators, dispatches, then
//! wraps the upstream response (and the request, as its back-reference)
//! into a [`ProxyResponse`] for the response mutators.

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::rewrite::url::UrlParts;

/// An in-flight request. Lives for the duration of a single exchange.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method.
    pub method: Method,
    /// Request target. Origin-form at ingress (empty scheme and host);
    /// the host rewriter fills in the upstream scheme and host.
    pub url: UrlParts,
    /// Host used for the upstream connection. Seeded from the inbound
    /// `Host` header.
    pub host: String,
    /// Header multimap.
    pub headers: HeaderMap,
    /// Fully buffered body, `None` when the exchange carries no body.
    pub body: Option<Bytes>,
    /// Byte length of `body`.
    pub content_length: u64,
    /// Snapshot of the inbound request target, taken before any mutator
    /// runs. Never rewritten.
    pub original_uri: String,
}

/// An in-flight response, carrying its originating request.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Status code from the upstream.
    pub status: StatusCode,
    /// Header multimap, including `Set-Cookie` and `Location`.
    pub headers: HeaderMap,
    /// Fully buffered body, `None` when the upstream sent none.
    pub body: Option<Bytes>,
    /// Byte length of `body`.
    pub content_length: u64,
    /// The request this response answers. Always populated before any
    /// response mutator runs.
    pub request: ProxyRequest,
}

impl ProxyRequest {
    /// First value of `name`, if present and representable as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Replace all values of `name` with `value`. Invalid names or values
    /// are ignored.
    pub fn set_header(&mut self, name: &str, value: &str) {
        set_header(&mut self.headers, name, value);
    }

    /// Append `value` under `name`. Invalid names or values are ignored.
    pub fn append_header(&mut self, name: &str, value: &str) {
        append_header(&mut self.headers, name, value);
    }

    /// Remove all values of `name`.
    pub fn remove_header(&mut self, name: &str) {
        if let Ok(name) = HeaderName::try_from(name) {
            self.headers.remove(name);
        }
    }

    /// Install a replacement body, keeping the numeric length and the
    /// `Content-Length` header in step with the actual byte count.
    pub fn set_body(&mut self, body: Bytes) {
        self.content_length = body.len() as u64;
        self.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        self.body = Some(body);
    }
}

impl ProxyResponse {
    /// First value of `name`, if present and representable as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Replace all values of `name` with `value`. Invalid names or values
    /// are ignored.
    pub fn set_header(&mut self, name: &str, value: &str) {
        set_header(&mut self.headers, name, value);
    }

    /// Install a replacement body, keeping the numeric length and the
    /// `Content-Length` header in step with the actual byte count.
    pub fn set_body(&mut self, body: Bytes) {
        self.content_length = body.len() as u64;
        self.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        self.body = Some(body);
    }
}

fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    }
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        headers.append(name, value);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Bare GET request for exercising mutators directly.
    pub(crate) fn request(target: &str, host: &str) -> ProxyRequest {
        ProxyRequest {
            method: Method::GET,
            url: UrlParts::parse(target),
            host: host.to_string(),
            headers: HeaderMap::new(),
            body: None,
            content_length: 0,
            original_uri: target.to_string(),
        }
    }

    /// Empty 200 response wrapping `request`.
    pub(crate) fn response(request: ProxyRequest) -> ProxyResponse {
        ProxyResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            content_length: 0,
            request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{request, response};
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut req = request("/ok", "frontend");
        req.set_header("X-Custom", "value");
        assert_eq!(req.header("x-custom"), Some("value"));
        assert_eq!(req.header("X-CUSTOM"), Some("value"));
    }

    #[test]
    fn test_set_header_replaces_all_values() {
        let mut req = request("/ok", "frontend");
        req.append_header("X-Tag", "a");
        req.append_header("X-Tag", "b");
        req.set_header("X-Tag", "c");
        assert_eq!(req.headers.get_all("X-Tag").iter().count(), 1);
        assert_eq!(req.header("X-Tag"), Some("c"));
    }

    #[test]
    fn test_invalid_header_name_is_ignored() {
        let mut req = request("/ok", "frontend");
        req.set_header("bad header\n", "value");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_set_body_repairs_framing() {
        let mut req = request("/ok", "frontend");
        req.set_body(Bytes::from_static(b"hello"));
        assert_eq!(req.content_length, 5);
        assert_eq!(req.header("content-length"), Some("5"));
        assert_eq!(req.body.as_deref(), Some(b"hello".as_slice()));

        let mut resp = response(req);
        resp.set_body(Bytes::from_static(b"longer body"));
        assert_eq!(resp.content_length, 11);
        assert_eq!(resp.header("content-length"), Some("11"));
    }
}
