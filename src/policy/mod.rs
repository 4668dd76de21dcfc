//! Access policy subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyConfig (validated)
//!     → set.rs (PolicySet / HostPolicy, built once)
//!     → matcher.rs (globs compiled per method)
//!
//! Per request:
//!     HostPolicy + method + path
//!     → engine.rs (allow / deny, matched / unmatched)
//! ```
//!
//! # Design Decisions
//! - RESTRICT denies anything not explicitly matched
//! - WATCH never blocks; it only reports what RESTRICT would block
//! - No precedence among patterns: any match counts

pub mod engine;
pub mod matcher;
pub mod set;

pub use engine::{decide, AccessPolicy, Decision, PolicyEngine};
pub use matcher::PathMatcher;
pub use set::{Credentials, HostPolicy, PolicyError, PolicySet};
