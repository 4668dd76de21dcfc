//! Request-level error taxonomy.
//!
//! Every variant is terminal for its request and is turned into a short
//! plain-text response; details go to the audit log only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::observability::audit::AuditOutcome;
use crate::security::basic_auth;

/// Reasons a request is answered by the proxy itself.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no policy configured for host '{host}'")]
    UnknownHost { host: String },

    #[error("missing or invalid credentials")]
    Authentication,

    #[error("{method} {path} denied by policy")]
    PolicyDenied { method: String, path: String },

    #[error("upstream request failed: {0}")]
    UpstreamTransport(#[source] reqwest::Error),

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(#[source] reqwest::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UnknownHost { .. } => StatusCode::NOT_FOUND,
            ProxyError::Authentication => StatusCode::UNAUTHORIZED,
            ProxyError::PolicyDenied { .. } => StatusCode::FORBIDDEN,
            ProxyError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Audit tag recorded for this failure.
    pub fn audit_outcome(&self) -> AuditOutcome {
        match self {
            ProxyError::UnknownHost { .. } => AuditOutcome::UnknownHost,
            ProxyError::Authentication => AuditOutcome::Unauthorized,
            ProxyError::PolicyDenied { .. } => AuditOutcome::Restricted,
            ProxyError::UpstreamTransport(_) | ProxyError::UpstreamTimeout(_) => {
                AuditOutcome::ProxyError
            }
        }
    }

    fn body(&self) -> &'static str {
        match self {
            ProxyError::UnknownHost { .. } => "Unknown host",
            ProxyError::Authentication => "Unauthorized",
            ProxyError::PolicyDenied { .. } => "Forbidden: Access restricted by proxy policy",
            ProxyError::UpstreamTransport(_) => "Bad Gateway",
            ProxyError::UpstreamTimeout(_) => "Gateway Timeout",
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::UpstreamTimeout(e)
        } else {
            ProxyError::UpstreamTransport(e)
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        match self {
            ProxyError::Authentication => (status, [basic_auth::challenge()], body).into_response(),
            _ => (status, body).into_response(),
        }
    }
}
