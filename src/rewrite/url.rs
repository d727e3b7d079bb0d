//! URL joining and lenient URL splitting for the rewrite pipeline.

use std::fmt;

/// Join two path segments with exactly one `/` between them.
///
/// If both sides contribute a slash one is dropped; if neither does one is
/// inserted. Empty inputs are concatenated as-is, so joining a prefix with
/// an empty remainder never grows a trailing slash.
pub fn join_single_slash(a: &str, b: &str) -> String {
    if a.is_empty() || b.is_empty() {
        return format!("{a}{b}");
    }
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

/// A URL split into its raw components.
///
/// Unlike a validating parser this type is total: any input yields a value,
/// with components the splitter could not identify left empty. Components
/// are kept verbatim, so the rendered form of an untouched part is
/// byte-identical to the input. The path distinguishes empty from `/`, and
/// `Display` renders an empty path as nothing, which keeps a configured
/// `http://backend` distinct from `http://backend/` through a
/// parse/render round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl UrlParts {
    /// Split `input` into parts. Never fails; unrecognized structure
    /// degrades to a partially populated value.
    pub fn parse(input: &str) -> Self {
        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => (rest, fragment),
            None => (input, ""),
        };

        let (scheme, rest) = match rest.find("://") {
            Some(pos) if is_scheme(&rest[..pos]) => (&rest[..pos], &rest[pos + 3..]),
            _ => ("", rest),
        };

        // An authority is present after an explicit scheme or a
        // protocol-relative `//` prefix.
        let (rest, has_authority) = if !scheme.is_empty() {
            (rest, true)
        } else if let Some(stripped) = rest.strip_prefix("//") {
            (stripped, true)
        } else {
            (rest, false)
        };

        let (host, tail) = if has_authority {
            match rest.find(['/', '?']) {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            }
        } else {
            ("", rest)
        };

        let (path, query) = match tail.split_once('?') {
            Some((path, query)) => (path, query),
            None => (tail, ""),
        };

        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            query: query.to_string(),
            fragment: fragment.to_string(),
        }
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if !self.host.is_empty() {
            write!(f, "//{}", self.host)?;
        }
        if !self.path.is_empty() {
            if !self.host.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
            f.write_str(&self.path)?;
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_inserts_single_slash() {
        assert_eq!(join_single_slash("/one", "/two"), "/one/two");
        assert_eq!(join_single_slash("/one/", "/two"), "/one/two");
        assert_eq!(join_single_slash("/one", "two"), "/one/two");
        assert_eq!(join_single_slash("/one/", "two"), "/one/two");
    }

    #[test]
    fn test_join_empty_inputs_pass_through() {
        assert_eq!(join_single_slash("", ""), "");
        assert_eq!(join_single_slash("/test", ""), "/test");
        assert_eq!(join_single_slash("", "/ok"), "/ok");
    }

    #[test]
    fn test_join_prefix_grid() {
        // Every prefix/backend-path combination must come out with single
        // slashes throughout.
        let prefixes = ["", "/", "/x", "/x/"];
        let paths = ["", "/", "/y", "/y/"];
        for prefix in prefixes {
            for path in paths {
                let joined = join_single_slash(prefix, path);
                assert!(
                    !joined.contains("//"),
                    "join({prefix:?}, {path:?}) = {joined:?}"
                );
            }
        }
        assert_eq!(join_single_slash("/x/", "/y/"), "/x/y/");
        assert_eq!(join_single_slash("/x", "/y"), "/x/y");
    }

    #[test]
    fn test_parse_absolute() {
        let url = UrlParts::parse("http://backend:8080/two/ok?a=1&b=2");
        assert_eq!(url.scheme, "http");
        assert_eq!(url.host, "backend:8080");
        assert_eq!(url.path, "/two/ok");
        assert_eq!(url.query, "a=1&b=2");
    }

    #[test]
    fn test_parse_keeps_empty_path_distinct_from_root() {
        assert_eq!(UrlParts::parse("http://backend").path, "");
        assert_eq!(UrlParts::parse("http://backend/").path, "/");
    }

    #[test]
    fn test_parse_origin_form() {
        let url = UrlParts::parse("/one/ok?q=1");
        assert_eq!(url.scheme, "");
        assert_eq!(url.host, "");
        assert_eq!(url.path, "/one/ok");
        assert_eq!(url.query, "q=1");
    }

    #[test]
    fn test_parse_scheme_inside_query_is_not_a_scheme() {
        let url = UrlParts::parse("/redirect?next=http://other/ok");
        assert_eq!(url.scheme, "");
        assert_eq!(url.path, "/redirect");
        assert_eq!(url.query, "next=http://other/ok");
    }

    #[test]
    fn test_parse_protocol_relative() {
        let url = UrlParts::parse("//host/path");
        assert_eq!(url.scheme, "");
        assert_eq!(url.host, "host");
        assert_eq!(url.path, "/path");
    }

    #[test]
    fn test_display_round_trips() {
        for input in [
            "http://backend",
            "http://backend/",
            "http://backend/two/ok?a=1",
            "/one/ok?q=http://other/ok",
            "//host/path",
            "http://www.example.com?q=http%3A%2F%2Fbackend%2Fok",
        ] {
            assert_eq!(UrlParts::parse(input).to_string(), input);
        }
    }

    #[test]
    fn test_display_inserts_slash_before_relative_path() {
        let url = UrlParts {
            scheme: "http".to_string(),
            host: "frontend".to_string(),
            path: "ok".to_string(),
            ..Default::default()
        };
        assert_eq!(url.to_string(), "http://frontend/ok");
    }

    #[test]
    fn test_display_empty_path_renders_bare_host() {
        let url = UrlParts {
            scheme: "http".to_string(),
            host: "frontend".to_string(),
            ..Default::default()
        };
        assert_eq!(url.to_string(), "http://frontend");
    }
}
