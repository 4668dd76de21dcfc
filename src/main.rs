//! Restrictive Proxy
//!
//! A policy-driven reverse proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                 RESTRICTIVE PROXY                    │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────┐           │
//!   ──────────────────┼─▶│ routing │──▶│ security │──▶│  policy  │           │
//!                     │  │  (Host) │   │ (Basic)  │   │  engine  │           │
//!                     │  └────┬────┘   └────┬─────┘   └────┬─────┘           │
//!                     │   404 │         401 │         403  │ allow           │
//!                     │       ▼             ▼              ▼                 │
//!   Client Response   │  ┌──────────────────────┐   ┌─────────────┐          │
//!   ◀─────────────────┼──│   audit log (1/req)  │◀──│   forward   │◀─────────┼── Upstream
//!                     │  └──────────────────────┘   │ (502 / 504) │          │
//!                     │                             └─────────────┘          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use restrictive_proxy::config::{load_config, ProxyConfig};
use restrictive_proxy::http::forward::resolve_path;
use restrictive_proxy::lifecycle;
use restrictive_proxy::observability::{logging, AuditOutcome};
use restrictive_proxy::policy::{decide, PolicySet};

#[derive(Parser)]
#[command(name = "restrictive-proxy")]
#[command(about = "Policy-driven reverse proxy for multiple virtual hosts", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        env = "CONFIG_PATH",
        default_value = "/etc/restrictive-proxy.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy (default)
    Serve {
        /// Override the listener port.
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
    /// Load and validate the configuration, then exit
    Validate,
    /// Evaluate the access policy for a single request without serving
    Decide {
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => run(config, &cli.config, port).await,
        Commands::Validate => validate(&config),
        Commands::Decide { host, method, path } => evaluate(&config, &host, &method, &path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
    Ok(load_config(path)?)
}

async fn run(
    config: ProxyConfig,
    path: &Path,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        hosts = config.proxy.len(),
        "restrictive-proxy starting"
    );

    lifecycle::serve(config, port).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn validate(config: &ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let policies = PolicySet::from_config(config)?;
    for host in policies.hosts() {
        if let Some(policy) = policies.get(host) {
            println!("{}\t{}\t{}", host, policy.mode(), policy.upstream());
        }
    }
    println!("Configuration OK ({} hosts)", policies.len());
    Ok(())
}

fn evaluate(
    config: &ProxyConfig,
    host: &str,
    method: &str,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let policies = PolicySet::from_config(config)?;
    let policy = policies
        .get(host)
        .ok_or_else(|| format!("no policy configured for host '{}'", host))?;

    let path = resolve_path(policy.upstream(), path);
    let decision = decide(policy, method, &path);
    let outcome = if decision.allowed {
        AuditOutcome::forwarded(decision.matched)
    } else {
        AuditOutcome::Restricted
    };

    println!(
        "{} {} {} -> {} (allowed={}, matched={}, mode={})",
        host,
        method,
        path,
        outcome,
        decision.allowed,
        decision.matched,
        policy.mode()
    );
    Ok(())
}
