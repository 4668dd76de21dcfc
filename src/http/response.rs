//! Relaying upstream responses.
//!
//! # Responsibilities
//! - Copy upstream status and headers to the caller
//! - Stream the upstream body without buffering
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - A body error after headers were sent aborts the client connection;
//!   a partially streamed response is never replayed

use axum::body::Body;
use axum::http::header::{
    CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING,
    UPGRADE,
};
use axum::http::{HeaderMap, HeaderName};
use axum::response::Response;
use futures_util::TryStreamExt;

const HOP_BY_HOP: [HeaderName; 7] = [
    CONNECTION,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// Headers to send upstream: hop-by-hop removed, `Host` dropped so the
/// client derives it from the upstream URL.
pub fn outbound_headers(mut headers: HeaderMap) -> HeaderMap {
    strip_hop_by_hop(&mut headers);
    headers.remove(HOST);
    headers
}

/// Turn an upstream response into a streaming response for the caller.
pub fn relay(upstream: reqwest::Response, request_id: String) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let stream = upstream.bytes_stream().map_err(move |e| {
        tracing::warn!(request_id = %request_id, error = %e, "Upstream body failed mid-stream");
        e
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
