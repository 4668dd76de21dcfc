//! Host lookup and dispatch.
//!
//! # Responsibilities
//! - Extract the virtual host from `Host` (or the URI authority)
//! - Strip any `:port` suffix
//! - Look the host up in the Policy Set
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - Exact, case-sensitive matching; no wildcard hosts
//! - Explicit UnknownHost rather than silent default

use std::sync::Arc;

use axum::http::{header::HOST, Request};

use crate::error::ProxyError;
use crate::policy::{HostPolicy, PolicySet};

/// Resolves inbound requests to their host policy.
#[derive(Debug, Clone)]
pub struct HostRouter {
    policies: Arc<PolicySet>,
}

impl HostRouter {
    pub fn new(policies: Arc<PolicySet>) -> Self {
        Self { policies }
    }

    /// Look up the policy for a raw `Host` header value.
    pub fn resolve(&self, host_header: &str) -> Result<&HostPolicy, ProxyError> {
        let host = strip_port(host_header.trim());
        if host.is_empty() {
            return Err(ProxyError::UnknownHost {
                host: host.to_string(),
            });
        }
        self.policies.get(host).ok_or_else(|| ProxyError::UnknownHost {
            host: host.to_string(),
        })
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }
}

/// The raw host of a request: the `Host` header, or the URI authority for
/// HTTP/2 requests that carry `:authority` instead.
pub fn request_host<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default()
}

/// Remove a trailing `:port`; bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split_once(':').map_or(host, |(name, _)| name)
}
