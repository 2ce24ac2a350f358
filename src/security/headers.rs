//! Header manipulation at the hop boundary.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Drop the inbound `Host` so the client stamps the upstream authority
//! - Append the client address to `X-Forwarded-For`
//!
//! # Design Decisions
//! - The exclusion set is fixed; it is a correctness invariant, not configuration
//! - Headers named by a `Connection` header are treated as hop-by-hop too
//! - Multi-valued headers (e.g., `Cookie`) are copied value by value, never merged

use std::net::IpAddr;

use axum::http::header::{
    self, HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, TE,
    TRAILER, TRANSFER_ENCODING, UPGRADE,
};

/// `X-Forwarded-For` header name.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers never copied across the proxy in either direction.
pub const HOP_BY_HOP_HEADERS: [HeaderName; 9] = [
    CONTENT_ENCODING,
    CONTENT_LENGTH,
    TRANSFER_ENCODING,
    CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    TE,
    TRAILER,
    UPGRADE,
];

/// Returns true if `name` must not cross the hop boundary.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
}

/// Header names listed as connection options, e.g. `Connection: close, x-foo`.
fn connection_options(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

fn copy_end_to_end(source: &HeaderMap, skip: &[HeaderName]) -> HeaderMap {
    let listed = connection_options(source);
    let mut filtered = HeaderMap::with_capacity(source.len());

    for (name, value) in source.iter() {
        if is_hop_by_hop(name) || skip.contains(name) || listed.contains(name) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Headers from an upstream response that may be returned to the client.
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    copy_end_to_end(upstream, &[])
}

/// Headers from the inbound request that may be sent upstream.
///
/// `Accept-Encoding` is dropped as well: `Content-Encoding` never reaches the
/// client, so the outbound client negotiates only encodings it can decode.
pub fn filter_request_headers(inbound: &HeaderMap) -> HeaderMap {
    copy_end_to_end(inbound, &[header::HOST, header::ACCEPT_ENCODING])
}

/// Append `client` to any existing `X-Forwarded-For` chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let chain = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");

    let value = if chain.is_empty() {
        client.to_string()
    } else {
        format!("{}, {}", chain, client)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
