//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use restrictive_proxy::config::load_config_from_str;
use restrictive_proxy::observability::{AuditOutcome, AuditRecord, AuditSink};
use restrictive_proxy::policy::{AccessPolicy, Decision, HostPolicy, PolicyEngine, PolicySet};
use restrictive_proxy::{AppState, HttpServer};

/// A mock upstream that echoes what it received in `x-echo-*` headers.
pub struct Upstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock upstream on an ephemeral port.
///
/// - `/redirect` answers 302 → `/landing`
/// - `/slow` answers after 5 seconds
/// - anything else is echoed
pub async fn start_upstream() -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route(
            "/redirect",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/landing")]) }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .fallback(echo)
        .with_state(hits.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Upstream { addr, hits }
}

async fn echo(State(hits): State<Arc<AtomicUsize>>, request: Request<Body>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);

    let (parts, body) = request.into_parts();
    let echoed = {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        [
            ("x-echo-method", parts.method.to_string()),
            ("x-echo-uri", parts.uri.to_string()),
            ("x-echo-authorization", header("authorization")),
            ("x-echo-host", header("host")),
            ("x-echo-request-id", header("x-request-id")),
        ]
    };

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (StatusCode::OK, echoed, body).into_response()
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Audit sink that keeps every record.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<AuditOutcome> {
        self.records().into_iter().map(|r| r.outcome).collect()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Access policy that counts how often it is consulted.
#[derive(Default)]
pub struct CountingEngine {
    calls: AtomicUsize,
}

impl CountingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AccessPolicy for CountingEngine {
    fn decide(&self, policy: &HostPolicy, method: &str, path: &str) -> Decision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PolicyEngine.decide(policy, method, path)
    }
}

/// A proxy built from TOML, with recording audit sink and counting engine.
pub struct TestProxy {
    pub server: HttpServer,
    pub audit: Arc<RecordingSink>,
    pub engine: Arc<CountingEngine>,
}

impl TestProxy {
    pub fn new(config: &str) -> Self {
        let config = load_config_from_str(config, |_| None).expect("valid test config");
        let policies = PolicySet::from_config(&config).unwrap();
        let audit = Arc::new(RecordingSink::default());
        let engine = Arc::new(CountingEngine::default());

        let state = AppState::new(&config, policies)
            .unwrap()
            .with_audit_sink(audit.clone())
            .with_access_policy(engine.clone());

        Self {
            server: HttpServer::from_state(state),
            audit,
            engine,
        }
    }

    /// Drive one request through the full middleware stack.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.server.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, host: &str, uri: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::HOST, host)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn header_value(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
