//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → secrets.rs (resolve ${VAR} credential placeholders)
//!     → validation.rs (semantic checks, all errors at once)
//!     → ProxyConfig (validated, resolved)
//!     → PolicySet::from_config (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; any error is fatal
//! - All sections except `proxy` have defaults
//! - The request path never sees unresolved placeholders

pub mod loader;
pub mod schema;
pub mod secrets;
pub mod validation;

pub use loader::{load_config, load_config_from_str, ConfigError};
pub use schema::{
    CredentialConfig, HostConfig, ListenerConfig, LogFormat, Mode, ObservabilityConfig,
    ProxyConfig, TargetConfig, UpstreamConfig,
};
pub use validation::ValidationError;
