//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → basic_auth::require_auth (host's inbound credentials, 401 on failure)
//!     → [access policy]
//!     → basic_auth::inject_auth (host's outbound credentials)
//!     → Forward upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: a malformed Authorization header is a failed check
//! - Outbound credentials always overwrite whatever the caller sent

pub mod basic_auth;

pub use basic_auth::{inject_auth, require_auth};
