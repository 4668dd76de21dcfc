//! HTTP server setup and the per-request pipeline.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Run each request through host routing, authentication, access policy
//!   and forwarding, emitting one audit record per request
//! - Serve until the shutdown signal fires, draining in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::forward::{resolve_path, Forwarder};
use crate::http::request::{request_id, UuidRequestId};
use crate::observability::{AuditLog, AuditOutcome, AuditRecord, AuditSink};
use crate::policy::{AccessPolicy, PolicyEngine, PolicySet};
use crate::routing::{request_host, strip_port, HostRouter};
use crate::security::require_auth;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<HostRouter>,
    pub engine: Arc<dyn AccessPolicy>,
    pub forwarder: Arc<Forwarder>,
    pub audit: AuditLog,
}

impl AppState {
    /// State with the glob policy engine and the tracing audit sink.
    pub fn new(config: &ProxyConfig, policies: PolicySet) -> Result<Self, reqwest::Error> {
        Ok(Self {
            router: Arc::new(HostRouter::new(Arc::new(policies))),
            engine: Arc::new(PolicyEngine),
            forwarder: Arc::new(Forwarder::new(&config.upstream)?),
            audit: AuditLog::default(),
        })
    }

    pub fn with_access_policy(mut self, engine: Arc<dyn AccessPolicy>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = AuditLog::new(sink);
        self
    }
}

/// HTTP server for the restrictive proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and policies.
    pub fn new(config: &ProxyConfig, policies: PolicySet) -> Result<Self, reqwest::Error> {
        Ok(Self::from_state(AppState::new(config, policies)?))
    }

    /// Create a server around prepared state.
    pub fn from_state(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The fully layered router, e.g. for driving it without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
///
/// Host Router → Auth Gateway → Access Policy Engine → Forwarding Engine,
/// each stage short-circuiting with its own response and audit record.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request);
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let host_header = request_host(&request).to_string();
    let method = request.method().as_str().to_string();
    let raw_path = request.uri().path().to_string();

    let audit = |outcome: AuditOutcome,
                 host: &str,
                 path: &str,
                 status: u16,
                 detail: Option<String>| {
        state.audit.emit(AuditRecord {
            request_id: request_id.clone(),
            outcome,
            host: host.to_string(),
            method: method.clone(),
            path: path.to_string(),
            status,
            client,
            detail,
        });
    };

    // 1. Resolve host
    let policy = match state.router.resolve(&host_header) {
        Ok(policy) => policy,
        Err(e) => {
            audit(
                e.audit_outcome(),
                &host_header,
                &raw_path,
                e.status().as_u16(),
                None,
            );
            return e.into_response();
        }
    };
    let host = strip_port(host_header.trim());

    // 2. Inbound credentials
    if !require_auth(policy, request.headers()) {
        let e = ProxyError::Authentication;
        audit(e.audit_outcome(), host, &raw_path, e.status().as_u16(), None);
        return e.into_response();
    }

    // 3. Access policy, on the path the upstream will see
    let path = resolve_path(policy.upstream(), &raw_path);
    let decision = state.engine.decide(policy, &method, &path);
    if !decision.allowed {
        let e = ProxyError::PolicyDenied {
            method: method.clone(),
            path: path.clone(),
        };
        audit(e.audit_outcome(), host, &path, e.status().as_u16(), None);
        return e.into_response();
    }

    // 4. Forward
    match state
        .forwarder
        .forward(host, policy, request, &path, &request_id)
        .await
    {
        Ok(response) => {
            audit(
                AuditOutcome::forwarded(decision.matched),
                host,
                &path,
                response.status().as_u16(),
                None,
            );
            response
        }
        Err(e) => {
            audit(
                e.audit_outcome(),
                host,
                &path,
                e.status().as_u16(),
                Some(e.to_string()),
            );
            e.into_response()
        }
    }
}
