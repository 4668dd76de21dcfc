//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the Policy Set from the validated configuration
//! - Start metrics (optional) and signal handling
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::policy::{PolicyError, PolicySet};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("invalid {field} '{value}'")]
    Address { field: &'static str, value: String },

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to start metrics endpoint: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind address from config, with the port optionally overridden.
pub fn bind_address(config: &ProxyConfig, port: Option<u16>) -> Result<SocketAddr, StartupError> {
    let mut addr: SocketAddr =
        config
            .listener
            .bind_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "listener.bind_address",
                value: config.listener.bind_address.clone(),
            })?;
    if let Some(port) = port {
        addr.set_port(port);
    }
    Ok(addr)
}

/// Run the proxy until a termination signal arrives.
pub async fn serve(config: ProxyConfig, port: Option<u16>) -> Result<(), StartupError> {
    let policies = PolicySet::from_config(&config)?;
    for host in policies.hosts() {
        if let Some(policy) = policies.get(host) {
            tracing::info!(
                host = %host,
                upstream = %policy.upstream(),
                mode = %policy.mode(),
                inbound_auth = policy.inbound_credentials().is_some(),
                outbound_auth = policy.outbound_credentials().is_some(),
                methods = ?policy.restricted_methods(),
                "Configured host"
            );
            if policy.denies_everything() {
                tracing::warn!(
                    host = %host,
                    "Host is in RESTRICT mode without restrictions; every request will be denied"
                );
            }
        }
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "observability.metrics_address",
                value: config.observability.metrics_address.clone(),
            })?;
        metrics::init_metrics(addr)?;
    }

    let addr = bind_address(&config, port)?;
    let server = HttpServer::new(&config, policies)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
