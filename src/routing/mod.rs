//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → router.rs (strip port, exact lookup)
//!     → Return: HostPolicy or UnknownHost (404)
//! ```
//!
//! # Design Decisions
//! - Routes are the Policy Set's host keys, fixed at startup
//! - Deterministic: same Host always resolves to the same policy
//! - An unknown host short-circuits the whole pipeline

pub mod router;

pub use router::{request_host, strip_port, HostRouter};
