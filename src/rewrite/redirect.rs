//! Redirect `Location` translation back into the public address space.

use tracing::debug;

use super::url::{join_single_slash, UrlParts};
use super::{ResponseRewrite, X_FORWARDED_HOST, X_FORWARDED_PROTO};
use crate::exchange::ProxyResponse;

/// Build the response mutator that points `Location` headers at the
/// public address.
///
/// The location is reparsed leniently, its host and scheme are overlaid
/// from the originating request's forwarding headers, and its path is
/// translated by stripping the upstream prefix and grafting the public
/// prefix. The query and fragment are never modified: a URL embedded in
/// the query string, encoded or not, passes through byte-exact and is only
/// ever translated by the body rewriters.
pub(super) fn rewrite(forwarded_url: UrlParts, path_prefix: String) -> ResponseRewrite {
    Box::new(move |response: &mut ProxyResponse| {
        let location = response.header("location").unwrap_or_default();
        if location.trim().is_empty() {
            return;
        }

        let mut target = UrlParts::parse(location);
        let request = &response.request;

        target.host = match request.header(X_FORWARDED_HOST) {
            Some(host) if !host.trim().is_empty() => host.to_string(),
            _ => request.host.clone(),
        };
        target.scheme = match request.header(X_FORWARDED_PROTO) {
            Some(scheme) if !scheme.trim().is_empty() => scheme.to_string(),
            _ => request.url.scheme.clone(),
        };

        if !forwarded_url.path.trim().is_empty() {
            if let Some(stripped) = target.path.strip_prefix(&forwarded_url.path) {
                target.path = stripped.to_string();
            }
        }
        if !path_prefix.trim().is_empty() && path_prefix.trim() != "/" {
            target.path = join_single_slash(&path_prefix, &target.path);
        }

        let rewritten = target.to_string();
        debug!(location = %rewritten, "rewrote redirect location");
        response.set_header("location", &rewritten);
    })
}
