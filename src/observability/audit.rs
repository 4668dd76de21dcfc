//! Audit log of access decisions.
//!
//! # Responsibilities
//! - One record per request, emitted where the request's fate is known
//! - Tag each record with its outcome (ALLOWED, RESTRICTED, ...)
//! - Never let a failing sink influence request handling
//!
//! # Design Decisions
//! - `AuditSink` is a trait so embedders and tests can capture records
//! - The default sink writes structured `tracing` events on target `audit`
//! - Every record also bumps `proxy_decisions_total`

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::observability::metrics;

/// Outcome tag of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditOutcome {
    /// Inbound credentials missing or wrong.
    Unauthorized,
    /// Denied by a RESTRICT policy.
    Restricted,
    /// Explicit pattern match, forwarded.
    Allowed,
    /// No explicit match but forwarded (WATCH mode).
    PotentiallyDisallowed,
    /// No policy for the Host header.
    UnknownHost,
    /// Upstream could not be reached or failed mid-request.
    ProxyError,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Unauthorized => "UNAUTHORIZED",
            AuditOutcome::Restricted => "RESTRICTED",
            AuditOutcome::Allowed => "ALLOWED",
            AuditOutcome::PotentiallyDisallowed => "POTENTIALLY-DISALLOWED",
            AuditOutcome::UnknownHost => "UNKNOWN-HOST",
            AuditOutcome::ProxyError => "PROXY-ERROR",
        }
    }

    /// Outcome of a forwarded request, from the policy's match flag.
    pub fn forwarded(matched: bool) -> Self {
        if matched {
            AuditOutcome::Allowed
        } else {
            AuditOutcome::PotentiallyDisallowed
        }
    }
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decision record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub request_id: String,
    pub outcome: AuditOutcome,
    pub host: String,
    pub method: String,
    pub path: String,
    /// Status returned to the caller.
    pub status: u16,
    pub client: Option<SocketAddr>,
    /// Failure detail (never sent to the caller).
    pub detail: Option<String>,
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Writes records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, r: &AuditRecord) {
        let client = r.client.map(|c| c.to_string()).unwrap_or_default();
        let detail = r.detail.as_deref().unwrap_or_default();
        match r.outcome {
            AuditOutcome::Allowed => tracing::info!(
                target: "audit",
                request_id = %r.request_id, outcome = %r.outcome, host = %r.host,
                method = %r.method, path = %r.path, status = r.status, client = %client,
                "{} {} {}", r.outcome, r.method, r.path
            ),
            AuditOutcome::ProxyError => tracing::error!(
                target: "audit",
                request_id = %r.request_id, outcome = %r.outcome, host = %r.host,
                method = %r.method, path = %r.path, status = r.status, client = %client,
                detail = %detail,
                "{} {} {}", r.outcome, r.method, r.path
            ),
            _ => tracing::warn!(
                target: "audit",
                request_id = %r.request_id, outcome = %r.outcome, host = %r.host,
                method = %r.method, path = %r.path, status = r.status, client = %client,
                "{} {} {}", r.outcome, r.method, r.path
            ),
        }
    }
}

/// Shared handle used by the request pipeline.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Emit one record. A panicking sink is contained and logged.
    pub fn emit(&self, record: AuditRecord) {
        let host_label = if record.outcome == AuditOutcome::UnknownHost {
            "unknown"
        } else {
            record.host.as_str()
        };
        metrics::record_decision(record.outcome.as_str(), host_label);

        if catch_unwind(AssertUnwindSafe(|| self.sink.record(&record))).is_err() {
            tracing::error!(request_id = %record.request_id, "Audit sink panicked; record dropped");
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}
