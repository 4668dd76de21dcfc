//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream URLs, credential pairs, methods and glob patterns
//! - Validate value ranges (timeouts > 0, bind address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs after secret resolution, before the Policy Set is built

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{HostConfig, ProxyConfig};
use crate::policy::matcher::compile_pattern;

/// A single semantic problem in the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no hosts configured under [proxy]")]
    NoHosts,

    #[error("host '{host}' is not a bare host name (no port, no whitespace)")]
    InvalidHostKey { host: String },

    #[error("host '{host}': invalid upstream url '{url}': {reason}")]
    InvalidUpstream {
        host: String,
        url: String,
        reason: String,
    },

    #[error("host '{host}': {section} requires both username and password")]
    IncompleteCredentials { host: String, section: &'static str },

    #[error("host '{host}': '{method}' is not a valid HTTP method")]
    InvalidMethod { host: String, method: String },

    #[error("host '{host}': method '{method}' is listed more than once")]
    DuplicateMethod { host: String, method: String },

    #[error("host '{host}': invalid pattern '{pattern}' for {method}: {reason}")]
    InvalidPattern {
        host: String,
        method: String,
        pattern: String,
        reason: String,
    },

    #[error("host '{host}': {field} references unset environment variable '{variable}'")]
    UnresolvedSecret {
        host: String,
        field: &'static str,
        variable: String,
    },

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

/// Validate a fully resolved configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "upstream.connect_timeout_secs",
        });
    }
    if config.upstream.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "upstream.read_timeout_secs",
        });
    }

    if config.proxy.is_empty() {
        errors.push(ValidationError::NoHosts);
    }
    for (host, settings) in &config.proxy {
        validate_host(host, settings, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_host(host: &str, settings: &HostConfig, errors: &mut Vec<ValidationError>) {
    if host.is_empty() || host.contains(char::is_whitespace) || has_port(host) {
        errors.push(ValidationError::InvalidHostKey {
            host: host.to_string(),
        });
    }

    match Url::parse(&settings.to.url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(ValidationError::InvalidUpstream {
                host: host.to_string(),
                url: settings.to.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::InvalidUpstream {
                host: host.to_string(),
                url: settings.to.url.clone(),
                reason: "missing host".to_string(),
            });
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidUpstream {
            host: host.to_string(),
            url: settings.to.url.clone(),
            reason: e.to_string(),
        }),
    }

    let outbound_complete = match (&settings.to.username, &settings.to.password) {
        (None, None) => true,
        (Some(u), Some(p)) => !u.is_empty() && !p.is_empty(),
        _ => false,
    };
    if !outbound_complete {
        errors.push(ValidationError::IncompleteCredentials {
            host: host.to_string(),
            section: "to",
        });
    }
    if let Some(auth) = &settings.auth {
        if auth.username.is_empty() || auth.password.is_empty() {
            errors.push(ValidationError::IncompleteCredentials {
                host: host.to_string(),
                section: "auth",
            });
        }
    }

    let mut seen = HashSet::new();
    for (method, patterns) in &settings.restrictions {
        let normalized = method.to_ascii_uppercase();
        if Method::from_bytes(normalized.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidMethod {
                host: host.to_string(),
                method: method.clone(),
            });
            continue;
        }
        if !seen.insert(normalized.clone()) {
            errors.push(ValidationError::DuplicateMethod {
                host: host.to_string(),
                method: normalized.clone(),
            });
        }
        for pattern in patterns {
            if let Err(e) = compile_pattern(pattern) {
                errors.push(ValidationError::InvalidPattern {
                    host: host.to_string(),
                    method: normalized.clone(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// True when `host` carries a `:port` suffix (bracketed IPv6 literals allowed).
fn has_port(host: &str) -> bool {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split_once(']').is_some_and(|(_, tail)| !tail.is_empty());
    }
    host.contains(':')
}
