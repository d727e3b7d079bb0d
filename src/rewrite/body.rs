//! Body rewriting with framing repair.
//!
//! Two families: literal URL translation between the public and upstream
//! address spaces, and generic regex substitution. Both install the
//! replacement bytes through the record's `set_body`, which keeps the
//! `Content-Length` header and the numeric length equal to the actual
//! replacement byte count.

use bytes::Bytes;
use tracing::trace;

use super::url::{join_single_slash, UrlParts};
use super::{RequestRewrite, ResponseRewrite, X_FORWARDED_HOST, X_FORWARDED_PROTO};
use crate::exchange::{ProxyRequest, ProxyResponse};

/// Build the request mutator that replaces the public URL with the
/// upstream URL throughout the request body.
///
/// The public URL is reconstructed from the original request target with
/// the caller-facing host and scheme overlaid from the forwarding headers
/// and the public prefix grafted onto the path. Bodies that are not valid
/// UTF-8 pass through untouched.
pub(super) fn rewrite_request(forwarded_url: UrlParts, path_prefix: String) -> RequestRewrite {
    Box::new(move |request: &mut ProxyRequest| {
        let Some(body) = request.body.clone() else {
            return;
        };

        let mut source = UrlParts::parse(&request.original_uri);
        if let Some(host) = request.header(X_FORWARDED_HOST) {
            if !host.trim().is_empty() {
                source.host = host.to_string();
            }
        }
        if let Some(scheme) = request.header(X_FORWARDED_PROTO) {
            if !scheme.trim().is_empty() {
                source.scheme = scheme.to_string();
            }
        }
        source.path = join_single_slash(&path_prefix, &source.path);

        let replaced = replace_literal(&body, &source.to_string(), &forwarded_url.to_string());
        request.set_body(replaced);
    })
}

/// Build the response mutator that replaces the upstream URL with the
/// public URL throughout the response body.
///
/// The public URL here carries the public prefix (minus any trailing
/// slash) as its whole path; when the originating request recorded no
/// forwarded scheme, the upstream scheme is used.
pub(super) fn rewrite_response(forwarded_url: UrlParts, path_prefix: String) -> ResponseRewrite {
    Box::new(move |response: &mut ProxyResponse| {
        let Some(body) = response.body.clone() else {
            return;
        };

        let request = &response.request;
        let mut source = UrlParts::parse(&request.original_uri);
        if let Some(host) = request.header(X_FORWARDED_HOST) {
            if !host.trim().is_empty() {
                source.host = host.to_string();
            }
        }
        match request.header(X_FORWARDED_PROTO) {
            Some(scheme) if !scheme.trim().is_empty() => source.scheme = scheme.to_string(),
            _ => source.scheme = forwarded_url.scheme.clone(),
        }
        source.path = path_prefix.trim_end_matches('/').to_string();

        let replaced = replace_literal(&body, &forwarded_url.to_string(), &source.to_string());
        response.set_body(replaced);
    })
}

/// Build the request mutator that applies a regex substitution to the
/// request body.
pub(super) fn replace_request<P>(
    pattern: regex::bytes::Regex,
    replacement: String,
    predicate: P,
) -> RequestRewrite
where
    P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
{
    Box::new(move |request: &mut ProxyRequest| {
        if !predicate(request) {
            return;
        }
        let Some(body) = request.body.clone() else {
            return;
        };
        let replaced = pattern.replace_all(&body, replacement.as_bytes());
        request.set_body(Bytes::copy_from_slice(&replaced));
    })
}

/// Build the response mutator that applies a regex substitution to the
/// response body.
pub(super) fn replace_response<P>(
    pattern: regex::bytes::Regex,
    replacement: String,
    predicate: P,
) -> ResponseRewrite
where
    P: Fn(&ProxyResponse) -> bool + Send + Sync + 'static,
{
    Box::new(move |response: &mut ProxyResponse| {
        if !predicate(response) {
            return;
        }
        let Some(body) = response.body.clone() else {
            return;
        };
        let replaced = pattern.replace_all(&body, replacement.as_bytes());
        response.set_body(Bytes::copy_from_slice(&replaced));
    })
}

/// Global literal substitution over a UTF-8 body. Non-text bodies are
/// returned unchanged so binary payloads are never corrupted.
fn replace_literal(body: &Bytes, needle: &str, replacement: &str) -> Bytes {
    match std::str::from_utf8(body) {
        Ok(text) => Bytes::from(text.replace(needle, replacement)),
        Err(_) => {
            trace!("body is not valid UTF-8, skipping URL translation");
            body.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::test_support::{request, response};
    use http::Method;

    #[test]
    fn test_request_body_translates_public_url() {
        let rewrite = rewrite_request(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/is-match", "frontend");
        req.method = Method::POST;
        req.set_header(X_FORWARDED_HOST, "frontend");
        req.set_header(X_FORWARDED_PROTO, "http");
        req.set_body(Bytes::from_static(b"see http://frontend/is-match here"));
        rewrite(&mut req);

        let body = req.body.as_deref().unwrap();
        assert_eq!(body, b"see http://backend here");
        assert_eq!(req.content_length, body.len() as u64);
        assert_eq!(req.header("content-length"), Some("23"));
    }

    #[test]
    fn test_request_body_skips_when_absent() {
        let rewrite = rewrite_request(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/ok", "frontend");
        rewrite(&mut req);

        assert!(req.body.is_none());
        assert_eq!(req.header("content-length"), None);
    }

    #[test]
    fn test_request_body_passes_binary_through() {
        let rewrite = rewrite_request(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/ok", "frontend");
        let binary = Bytes::from_static(&[0xff, 0xfe, 0x00, 0x80]);
        req.set_body(binary.clone());
        rewrite(&mut req);

        assert_eq!(req.body.as_ref(), Some(&binary));
    }

    #[test]
    fn test_response_body_translates_backend_url() {
        let rewrite = rewrite_response(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/info", "frontend");
        req.set_header(X_FORWARDED_HOST, "frontend");
        let mut resp = response(req);
        resp.set_body(Bytes::from_static(b"http://backend/info"));
        rewrite(&mut resp);

        assert_eq!(resp.body.as_deref(), Some(b"http://frontend/info".as_slice()));
        assert_eq!(resp.header("content-length"), Some("20"));
    }

    #[test]
    fn test_response_body_defaults_scheme_from_backend() {
        let rewrite = rewrite_response(UrlParts::parse("https://backend"), "/app".to_string());
        let mut req = request("/app/info", "frontend");
        req.set_header(X_FORWARDED_HOST, "frontend");
        let mut resp = response(req);
        resp.set_body(Bytes::from_static(b"link: https://backend/info"));
        rewrite(&mut resp);

        // Prefix keeps no trailing slash when grafted as the whole path.
        assert_eq!(
            resp.body.as_deref(),
            Some(b"link: https://frontend/app/info".as_slice())
        );
    }

    #[test]
    fn test_regex_replace_repairs_framing_both_sides() {
        let rewrite = replace_request(
            regex::bytes::Regex::new(r"v\d+").unwrap(),
            "v2".to_string(),
            |_| true,
        );
        let mut req = request("/ok", "frontend");
        req.set_body(Bytes::from_static(b"api v1 and v10"));
        rewrite(&mut req);
        assert_eq!(req.body.as_deref(), Some(b"api v2 and v2".as_slice()));
        assert_eq!(req.header("content-length"), Some("13"));

        let rewrite = replace_response(
            regex::bytes::Regex::new("secret-[a-z]+").unwrap(),
            "redacted".to_string(),
            |_| true,
        );
        let mut resp = response(request("/ok", "frontend"));
        resp.set_body(Bytes::from_static(b"token=secret-abc"));
        rewrite(&mut resp);
        assert_eq!(resp.body.as_deref(), Some(b"token=redacted".as_slice()));
        assert_eq!(resp.header("content-length"), Some("14"));
    }

    #[test]
    fn test_regex_replace_honors_predicate() {
        let rewrite = replace_request(
            regex::bytes::Regex::new("a").unwrap(),
            "b".to_string(),
            |req: &ProxyRequest| req.method == Method::POST,
        );
        let mut req = request("/ok", "frontend");
        req.set_body(Bytes::from_static(b"aaa"));
        rewrite(&mut req);
        assert_eq!(req.body.as_deref(), Some(b"aaa".as_slice()));
    }
}
