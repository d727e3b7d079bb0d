//! Header operations: add, set, copy, delete and regex replacement, each
//! gated on an optional predicate.

use regex::Regex;

use super::{RequestRewrite, ResponseRewrite};
use crate::exchange::{ProxyRequest, ProxyResponse};

pub(super) fn add<P>(name: String, value: String, predicate: P) -> RequestRewrite
where
    P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
{
    Box::new(move |request: &mut ProxyRequest| {
        if predicate(request) {
            request.append_header(&name, &value);
        }
    })
}

pub(super) fn set<P>(name: String, value: String, predicate: P) -> RequestRewrite
where
    P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
{
    Box::new(move |request: &mut ProxyRequest| {
        if predicate(request) {
            request.set_header(&name, &value);
        }
    })
}

/// Copy the first value of `source` into `destination`. A missing source
/// writes an empty value, which downstream blank checks treat as unset.
pub(super) fn copy<P>(source: String, destination: String, predicate: P) -> RequestRewrite
where
    P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
{
    Box::new(move |request: &mut ProxyRequest| {
        if !predicate(request) {
            return;
        }
        let value = request.header(&source).unwrap_or_default().to_string();
        request.set_header(&destination, &value);
    })
}

pub(super) fn delete<P>(name: String, predicate: P) -> RequestRewrite
where
    P: Fn(&ProxyRequest) -> bool + Send + Sync + 'static,
{
    Box::new(move |request: &mut ProxyRequest| {
        if predicate(request) {
            request.remove_header(&name);
        }
    })
}

pub(super) fn replace<P>(
    name: String,
    pattern: Regex,
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
        let current = request.header(&name).unwrap_or_default();
        let replaced = pattern.replace_all(current, replacement.as_str()).to_string();
        request.set_header(&name, &replaced);
    })
}

/// Substitute each comma-separated segment of the header value and rejoin.
pub(super) fn replace_value<P>(
    name: String,
    pattern: Regex,
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
        let current = request.header(&name).unwrap_or_default();
        let replaced = current
            .split(',')
            .map(|segment| pattern.replace_all(segment, replacement.as_str()).to_string())
            .collect::<Vec<_>>()
            .join(",");
        request.set_header(&name, &replaced);
    })
}

pub(super) fn replace_response<P>(
    name: String,
    pattern: Regex,
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
        let current = response.header(&name).unwrap_or_default();
        let replaced = pattern.replace_all(current, replacement.as_str()).to_string();
        response.set_header(&name, &replaced);
    })
}
