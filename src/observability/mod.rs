//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → audit.rs (one decision record per request)
//!     → metrics.rs (decision counters, upstream latency)
//!     → logging.rs (structured events, request-id spans)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditLog, AuditOutcome, AuditRecord, AuditSink, TracingAuditSink};
