//! Forwarding engine.
//!
//! # Responsibilities
//! - Build the upstream URL from the host's base URL and the request path
//! - Stream the request (method, headers, body) to the upstream
//! - Follow upstream redirects per configuration
//! - Map transport failures to 502, timeouts to 504
//!
//! # Design Decisions
//! - No retries: a failed request is surfaced, never masked or replayed
//! - Connect and per-read timeouts bound every upstream call
//! - Dropping the returned future (client went away) drops the upstream
//!   request and closes its connection

use std::time::{Duration, Instant};

use axum::body::{Body, HttpBody};
use axum::http::Request;
use axum::response::Response;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::http::response::{outbound_headers, relay};
use crate::observability::metrics;
use crate::policy::HostPolicy;
use crate::security::inject_auth;

/// Sends permitted requests to their upstream.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let redirect = if config.follow_redirects {
            Policy::limited(config.max_redirects)
        } else {
            Policy::none()
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .redirect(redirect)
            .no_proxy()
            .build()?;

        Ok(Self { client })
    }

    /// Forward `request` to the host's upstream and relay the response.
    ///
    /// `path` is the request path as returned by [`resolve_path`], i.e. the
    /// path the access decision was made on. `host` is only used for
    /// labelling metrics and logs.
    pub async fn forward(
        &self,
        host: &str,
        policy: &HostPolicy,
        request: Request<Body>,
        path: &str,
        request_id: &str,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let target = upstream_url(policy.upstream(), path, parts.uri.query());

        let mut headers = outbound_headers(parts.headers);
        inject_auth(policy, &mut headers);

        let mut outbound = self
            .client
            .request(parts.method, target.clone())
            .headers(headers);
        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        tracing::debug!(request_id = %request_id, upstream = %target, "Forwarding request");

        let start = Instant::now();
        let upstream = outbound.send().await?;
        metrics::record_upstream(host, start);

        tracing::debug!(
            request_id = %request_id,
            status = %upstream.status(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        Ok(relay(upstream, request_id.to_string()))
    }
}

/// The inbound path as URL parsing resolves it against `base`.
///
/// Dot segments are removed, percent-encoded ones (`%2e%2e`) included, and
/// backslashes count as separators. Access decisions run on this path so
/// they see what the upstream receives.
pub fn resolve_path(base: &Url, path: &str) -> String {
    let mut url = base.clone();
    url.set_path(path);
    url.path().to_string()
}

/// Join the upstream base URL with a resolved path and the inbound query.
///
/// The base path acts as a prefix; the inbound query replaces the base
/// query when present.
pub fn upstream_url(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut target = base.clone();
    let prefix = base.path().trim_end_matches('/');
    target.set_path(&format!("{}{}", prefix, path));
    if let Some(query) = query {
        target.set_query(Some(query));
    }
    target
}
