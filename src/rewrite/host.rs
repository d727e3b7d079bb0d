//! Host and path translation for upstream-bound requests.

use tracing::debug;

use super::url::{join_single_slash, UrlParts};
use super::{RequestRewrite, X_FORWARDED_HOST, X_FORWARDED_PATH, X_FORWARDED_PROTO};
use crate::exchange::ProxyRequest;

/// Build the request mutator that retargets the request at the upstream.
///
/// Stamps `X-Forwarded-Host`, `X-Forwarded-Path` and `X-Forwarded-Proto`
/// from the caller-facing request unless the caller already supplied them,
/// then swaps in the upstream host and scheme, strips the public path
/// prefix, grafts the upstream path prefix and merges the upstream query.
pub(super) fn rewrite(forwarded_url: UrlParts, path_prefix: String) -> RequestRewrite {
    Box::new(move |request: &mut ProxyRequest| {
        let mut original_host = request.header(X_FORWARDED_HOST).unwrap_or_default().to_string();
        if original_host.trim().is_empty() {
            original_host = request.host.clone();
            request.set_header(X_FORWARDED_HOST, &original_host);
        }

        let mut original_path = request.header(X_FORWARDED_PATH).unwrap_or_default().to_string();
        if original_path.trim().is_empty() {
            original_path = request.url.path.clone();
            request.set_header(X_FORWARDED_PATH, &original_path);
        }

        let original_proto = request.header(X_FORWARDED_PROTO).unwrap_or_default();
        if original_proto.trim().is_empty() && !request.url.scheme.trim().is_empty() {
            let scheme = request.url.scheme.clone();
            request.set_header(X_FORWARDED_PROTO, &scheme);
        }

        // TODO add X-Forwarded-For stamping

        request.url.host = forwarded_url.host.clone();
        request.url.scheme = forwarded_url.scheme.clone();
        request.host = forwarded_url.host.clone();

        // The forwarded-path header is the strip source, so a caller that
        // seeds it remaps the upstream path.
        if request.url.path.starts_with(&path_prefix) {
            request.url.path = original_path
                .strip_prefix(&path_prefix)
                .unwrap_or(&original_path)
                .to_string();
            if !request.url.path.starts_with('/') {
                request.url.path.insert(0, '/');
            }
        }

        if !forwarded_url.path.trim().is_empty() {
            request.url.path = join_single_slash(&forwarded_url.path, &request.url.path);
        }

        if forwarded_url.query.is_empty() || request.url.query.is_empty() {
            request.url.query = format!("{}{}", forwarded_url.query, request.url.query);
        } else {
            request.url.query = format!("{}&{}", forwarded_url.query, request.url.query);
        }

        debug!(target_url = %request.url, "rewrote request target");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::test_support::request;

    #[test]
    fn test_stamps_forwarding_headers() {
        let rewrite = rewrite(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/headers", "frontend:8080");
        rewrite(&mut req);

        assert_eq!(req.header(X_FORWARDED_HOST), Some("frontend:8080"));
        assert_eq!(req.header(X_FORWARDED_PATH), Some("/headers"));
        // Origin-form requests carry no scheme, so no proto is stamped.
        assert_eq!(req.header(X_FORWARDED_PROTO), None);
    }

    #[test]
    fn test_preserves_caller_supplied_forwarding_headers() {
        let rewrite = rewrite(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/ok", "frontend");
        req.set_header(X_FORWARDED_HOST, "www.example.com");
        rewrite(&mut req);

        assert_eq!(req.header(X_FORWARDED_HOST), Some("www.example.com"));
    }

    #[test]
    fn test_retargets_url_and_connection_host() {
        let rewrite = rewrite(UrlParts::parse("https://backend:9443"), "/".to_string());
        let mut req = request("/ok", "frontend");
        rewrite(&mut req);

        assert_eq!(req.url.scheme, "https");
        assert_eq!(req.url.host, "backend:9443");
        assert_eq!(req.host, "backend:9443");
        assert_eq!(req.url.path, "/ok");
    }

    #[test]
    fn test_strips_public_prefix_and_grafts_backend_prefix() {
        let rewrite = rewrite(UrlParts::parse("http://backend/two"), "/one".to_string());
        let mut req = request("/one/ok", "frontend");
        rewrite(&mut req);

        assert_eq!(req.url.path, "/two/ok");
    }

    #[test]
    fn test_caller_seeded_path_header_remaps_upstream_path() {
        let rewrite = rewrite(UrlParts::parse("http://backend"), "/".to_string());
        let mut req = request("/ok", "frontend");
        req.set_header(X_FORWARDED_PATH, "/headers");
        rewrite(&mut req);

        assert_eq!(req.url.path, "/headers");
    }

    #[test]
    fn test_reprefixes_bare_path_after_strip() {
        let rewrite = rewrite(UrlParts::parse("http://backend"), "/one".to_string());
        let mut req = request("/one/ok", "frontend");
        rewrite(&mut req);

        assert_eq!(req.url.path, "/ok");
    }

    #[test]
    fn test_merges_backend_query_first() {
        let rewrite = rewrite(UrlParts::parse("http://backend?tenant=a"), "".to_string());
        let mut req = request("/ok?page=1", "frontend");
        rewrite(&mut req);
        assert_eq!(req.url.query, "tenant=a&page=1");

        let rewrite = rewrite_no_query();
        let mut req = request("/ok?page=1", "frontend");
        rewrite(&mut req);
        assert_eq!(req.url.query, "page=1");
    }

    fn rewrite_no_query() -> RequestRewrite {
        rewrite(UrlParts::parse("http://backend"), "".to_string())
    }
}
