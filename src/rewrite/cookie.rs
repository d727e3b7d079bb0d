//! Cookie `Path` translation between the public and upstream prefixes.
//!
//! Both directions parse every cookie, translate the ones whose path
//! carries the relevant prefix, then drop and re-emit the full cookie set
//! so the exchange reflects the new paths.

use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::HeaderValue;

use super::url::{join_single_slash, UrlParts};
use super::{RequestRewrite, ResponseRewrite};
use crate::exchange::{ProxyRequest, ProxyResponse};

/// Build the request mutator that moves cookie paths from the public
/// prefix to the upstream prefix.
pub(super) fn rewrite_request(forwarded_url: UrlParts, path_prefix: String) -> RequestRewrite {
    Box::new(move |request: &mut ProxyRequest| {
        let combined = request
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");

        let mut cookies = Vec::new();
        for parsed in Cookie::split_parse(combined) {
            if let Ok(cookie) = parsed {
                cookies.push(cookie);
            }
        }
        if cookies.is_empty() {
            return;
        }

        for cookie in &mut cookies {
            let path = cookie.path().unwrap_or_default().to_string();
            if let Some(translated) = translate_path(&path, &path_prefix, &forwarded_url.path) {
                cookie.set_path(translated);
            }
        }

        request.headers.remove(COOKIE);
        let serialized = cookies
            .iter()
            .map(|cookie| cookie.stripped().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if let Ok(value) = HeaderValue::from_str(&serialized) {
            request.headers.insert(COOKIE, value);
        }
    })
}

/// Build the response mutator that moves cookie paths from the upstream
/// prefix to the public prefix.
pub(super) fn rewrite_response(forwarded_url: UrlParts, path_prefix: String) -> ResponseRewrite {
    Box::new(move |response: &mut ProxyResponse| {
        let mut cookies = Vec::new();
        for value in response.headers.get_all(SET_COOKIE) {
            let Ok(text) = value.to_str() else {
                continue;
            };
            if let Ok(cookie) = Cookie::parse(text.to_string()) {
                cookies.push(cookie);
            }
        }
        if cookies.is_empty() {
            return;
        }

        for cookie in &mut cookies {
            let path = cookie.path().unwrap_or_default().to_string();
            if let Some(translated) = translate_path(&path, &forwarded_url.path, &path_prefix) {
                cookie.set_path(translated);
            }
        }

        response.headers.remove(SET_COOKIE);
        for cookie in cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                response.headers.append(SET_COOKIE, value);
            }
        }
    })
}

/// Strip `strip_prefix` from a cookie path and graft `graft_prefix` in its
/// place. `None` means the path is not under `strip_prefix` (or the result
/// would be empty) and the cookie should keep its current path.
fn translate_path(path: &str, strip_prefix: &str, graft_prefix: &str) -> Option<String> {
    let stripped = path.strip_prefix(strip_prefix)?;
    let translated = join_single_slash(graft_prefix, stripped);
    (!translated.is_empty()).then_some(translated)
}
