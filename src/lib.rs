//! Policy-driven restrictive reverse proxy.
//!
//! Accepts HTTP traffic for several virtual hosts, checks each request
//! against the host's credentials and access policy, and forwards permitted
//! traffic to the host's upstream.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod routing;
pub mod security;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
pub use policy::{HostPolicy, PolicySet};
