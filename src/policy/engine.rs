//! Access Policy Engine.
//!
//! Decides whether a request is permitted for a host, and whether that
//! decision came from an explicit pattern match.
//!
//! ```text
//! restrictions[method]   mode       allowed   matched
//! ─────────────────────────────────────────────────────
//! absent                 RESTRICT   false     false
//! absent                 WATCH      true      false
//! present, path matches  any        true      true
//! present, no match      RESTRICT   false     false
//! present, no match      WATCH      true      false
//! ```
//!
//! The decision is a pure function of (host policy, method, path).

use crate::config::schema::Mode;
use crate::policy::set::HostPolicy;

/// Outcome of evaluating a request against a host policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The request may be forwarded.
    pub allowed: bool,
    /// The path matched an explicitly configured pattern.
    pub matched: bool,
}

/// Seam for access decisions, so the server can be driven by alternative
/// or instrumented implementations.
pub trait AccessPolicy: Send + Sync {
    fn decide(&self, policy: &HostPolicy, method: &str, path: &str) -> Decision;
}

/// Glob-pattern based engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl AccessPolicy for PolicyEngine {
    fn decide(&self, policy: &HostPolicy, method: &str, path: &str) -> Decision {
        decide(policy, method, path)
    }
}

/// Evaluate `method` + `path` against `policy`.
///
/// Any query string on `path` is ignored.
pub fn decide(policy: &HostPolicy, method: &str, path: &str) -> Decision {
    let path = path.split_once('?').map_or(path, |(path, _)| path);

    let Some(patterns) = policy.restrictions_for(method) else {
        return Decision {
            allowed: policy.mode() == Mode::Watch,
            matched: false,
        };
    };

    let matched = patterns.is_match(path);
    match policy.mode() {
        Mode::Restrict => Decision {
            allowed: matched,
            matched,
        },
        Mode::Watch => Decision {
            allowed: true,
            matched,
        },
    }
}
