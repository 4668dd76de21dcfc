//! End-to-end request flow through the proxy against mock upstreams.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use restrictive_proxy::observability::AuditOutcome;
use restrictive_proxy::Shutdown;
use tokio::net::TcpListener;

mod common;
use common::{body_text, dead_address, header_value, start_upstream, TestProxy};

fn restrict_host(name: &str, upstream: &str) -> String {
    format!(
        r#"
[proxy."{name}"]
mode = "RESTRICT"
to = {{ url = "{upstream}" }}
restrictions = {{ GET = ["/public/**", "/redirect", "/landing"], POST = ["/upload/*"] }}
"#
    )
}

fn watch_host(name: &str, upstream: &str) -> String {
    format!(
        r#"
[proxy."{name}"]
mode = "WATCH"
to = {{ url = "{upstream}" }}
restrictions = {{ GET = ["/public/**"] }}
"#
    )
}

#[tokio::test]
async fn unknown_host_is_rejected_without_contacting_upstream() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let response = proxy.get("other.test", "/public/file").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Unknown host");

    let response = proxy
        .send(
            Request::builder()
                .uri("/public/file")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(upstream.hits(), 0);
    assert_eq!(proxy.engine.calls(), 0);
    assert_eq!(
        proxy.audit.outcomes(),
        vec![AuditOutcome::UnknownHost, AuditOutcome::UnknownHost]
    );
}

#[tokio::test]
async fn host_header_port_is_ignored() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let response = proxy.get("git.test:8080", "/public/file").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(proxy.audit.records()[0].host, "git.test");
}

#[tokio::test]
async fn authentication_runs_before_policy() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&format!(
        r#"
[proxy."git.test"]
mode = "RESTRICT"
to = {{ url = "{}" }}
auth = {{ username = "ci", password = "pw" }}
restrictions = {{ GET = ["/public/**"] }}
"#,
        upstream.url()
    ));

    // No credentials
    let response = proxy.get("git.test", "/public/file").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        header_value(&response, "www-authenticate"),
        "Basic realm=\"Restrictive Proxy\""
    );
    assert_eq!(body_text(response).await, "Unauthorized");

    // Wrong password, even on a path the policy would deny
    let response = proxy
        .send(
            Request::builder()
                .uri("/private/file")
                .header(header::HOST, "git.test")
                .header(header::AUTHORIZATION, "Basic Y2k6d3Jvbmc=")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Not Basic at all
    let response = proxy
        .send(
            Request::builder()
                .uri("/public/file")
                .header(header::HOST, "git.test")
                .header(header::AUTHORIZATION, "Bearer token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(proxy.engine.calls(), 0);
    assert_eq!(upstream.hits(), 0);

    // ci:pw
    let response = proxy
        .send(
            Request::builder()
                .uri("/public/file")
                .header(header::HOST, "git.test")
                .header(header::AUTHORIZATION, "Basic Y2k6cHc=")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(proxy.engine.calls(), 1);
    assert_eq!(upstream.hits(), 1);

    assert_eq!(
        proxy.audit.outcomes(),
        vec![
            AuditOutcome::Unauthorized,
            AuditOutcome::Unauthorized,
            AuditOutcome::Unauthorized,
            AuditOutcome::Allowed,
        ]
    );
}

#[tokio::test]
async fn restrict_mode_forwards_only_matching_requests() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let response = proxy.get("git.test", "/public/file").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-echo-uri"), "/public/file");

    let response = proxy.get("git.test", "/private/file").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_text(response).await,
        "Forbidden: Access restricted by proxy policy"
    );

    let response = proxy
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/public/file")
                .header(header::HOST, "git.test")
                .body(Body::from("data"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Method with no restriction list at all
    let response = proxy
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri("/public/file")
                .header(header::HOST, "git.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(upstream.hits(), 1);
    assert_eq!(
        proxy.audit.outcomes(),
        vec![
            AuditOutcome::Allowed,
            AuditOutcome::Restricted,
            AuditOutcome::Restricted,
            AuditOutcome::Restricted,
        ]
    );
}

#[tokio::test]
async fn single_star_does_not_cross_segments() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let upload = |uri: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::HOST, "git.test")
            .body(Body::from("payload"))
            .unwrap()
    };

    let response = proxy.send(upload("/upload/one")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-echo-method"), "POST");
    assert_eq!(body_text(response).await, "payload");

    let response = proxy.send(upload("/upload/one/two")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dot_segments_are_resolved_before_the_policy_check() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    for uri in [
        "/public/../admin/secret",
        "/public/%2e%2e/admin/secret",
        "/public/%2E./admin/secret",
        "/public/./../admin/secret",
    ] {
        let response = proxy.get("git.test", uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
    assert_eq!(upstream.hits(), 0);

    let records = proxy.audit.records();
    assert_eq!(records.len(), 4);
    assert!(records
        .iter()
        .all(|r| r.outcome == AuditOutcome::Restricted && r.path == "/admin/secret"));

    // Resolving can also land inside an allowed prefix
    let response = proxy.get("git.test", "/private/../public/file?x=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-echo-uri"), "/public/file?x=1");
}

#[tokio::test]
async fn hidden_segments_need_an_explicit_pattern() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&format!(
        r#"
[proxy."git.test"]
mode = "RESTRICT"
to = {{ url = "{}" }}
restrictions = {{ GET = ["/pub/*", "/repo/**", "/.well-known/*"] }}
"#,
        upstream.url()
    ));

    for uri in ["/pub/.env", "/repo/.git/config", "/repo/a/.git/HEAD"] {
        let response = proxy.get("git.test", uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
    assert_eq!(upstream.hits(), 0);

    assert_eq!(proxy.get("git.test", "/pub/file.env").await.status(), StatusCode::OK);
    assert_eq!(
        proxy.get("git.test", "/.well-known/acme").await.status(),
        StatusCode::OK
    );
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test]
async fn watch_mode_forwards_everything_and_flags_unmatched() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&watch_host("docs.test", &upstream.url()));

    let response = proxy.get("docs.test", "/public/file").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = proxy.get("docs.test", "/private/file").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-echo-uri"), "/private/file");

    assert_eq!(upstream.hits(), 2);
    assert_eq!(
        proxy.audit.outcomes(),
        vec![AuditOutcome::Allowed, AuditOutcome::PotentiallyDisallowed]
    );
}

#[tokio::test]
async fn outbound_credentials_replace_caller_authorization() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&format!(
        r#"
[proxy."git.test"]
mode = "WATCH"
to = {{ url = "{}", username = "svc", password = "secret" }}
auth = {{ username = "ci", password = "pw" }}
"#,
        upstream.url()
    ));

    let response = proxy
        .send(
            Request::builder()
                .uri("/anything")
                .header(header::HOST, "git.test")
                .header(header::AUTHORIZATION, "Basic Y2k6cHc=")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_value(&response, "x-echo-authorization"),
        "Basic c3ZjOnNlY3JldA=="
    );
}

#[tokio::test]
async fn caller_authorization_passes_through_without_outbound_credentials() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&watch_host("docs.test", &upstream.url()));

    let response = proxy
        .send(
            Request::builder()
                .uri("/public/file")
                .header(header::HOST, "docs.test")
                .header(header::AUTHORIZATION, "Bearer caller-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        header_value(&response, "x-echo-authorization"),
        "Bearer caller-token"
    );
}

#[tokio::test]
async fn upstream_sees_its_own_host_and_the_inbound_query() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let response = proxy.get("git.test", "/public/file?x=1&y=two").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-echo-host"), upstream.addr.to_string());
    assert_eq!(header_value(&response, "x-echo-uri"), "/public/file?x=1&y=two");
}

#[tokio::test]
async fn request_id_reaches_upstream_and_client() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let response = proxy
        .send(
            Request::builder()
                .uri("/public/file")
                .header(header::HOST, "git.test")
                .header("x-request-id", "req-1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(header_value(&response, "x-request-id"), "req-1234");
    assert_eq!(header_value(&response, "x-echo-request-id"), "req-1234");
    assert_eq!(proxy.audit.records()[0].request_id, "req-1234");

    let response = proxy.get("git.test", "/private/file").await;
    assert!(!header_value(&response, "x-request-id").is_empty());
}

#[tokio::test]
async fn upstream_redirects_are_followed() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &upstream.url()));

    let response = proxy.get("git.test", "/redirect").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-echo-uri"), "/landing");
    assert_eq!(proxy.audit.outcomes(), vec![AuditOutcome::Allowed]);
}

#[tokio::test]
async fn redirects_are_relayed_when_following_is_disabled() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&format!(
        "[upstream]\nfollow_redirects = false\n{}",
        restrict_host("git.test", &upstream.url())
    ));

    let response = proxy.get("git.test", "/redirect").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header_value(&response, "location"), "/landing");
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let dead = dead_address().await;
    let proxy = TestProxy::new(&restrict_host("git.test", &format!("http://{dead}")));

    let response = proxy.get("git.test", "/public/file").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_text(response).await, "Bad Gateway");

    let records = proxy.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, AuditOutcome::ProxyError);
    assert_eq!(records[0].status, 502);
    assert!(records[0].detail.is_some());
}

#[tokio::test]
async fn hung_upstream_is_gateway_timeout() {
    let upstream = start_upstream().await;
    let proxy = TestProxy::new(&format!(
        "[upstream]\nread_timeout_secs = 1\n{}",
        watch_host("docs.test", &upstream.url())
    ));

    let response = proxy.get("docs.test", "/slow").await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_text(response).await, "Gateway Timeout");
    assert_eq!(proxy.audit.outcomes(), vec![AuditOutcome::ProxyError]);
}

#[tokio::test]
async fn one_failing_upstream_does_not_affect_other_hosts() {
    let upstream = start_upstream().await;
    let dead = dead_address().await;

    let config = format!(
        "{}{}",
        restrict_host("git.test", &upstream.url()),
        watch_host("broken.test", &format!("http://{dead}"))
    );
    let config = restrictive_proxy::config::load_config_from_str(&config, |_| None).unwrap();
    let policies = restrictive_proxy::PolicySet::from_config(&config).unwrap();
    let server = restrictive_proxy::HttpServer::new(&config, policies).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let url = format!("http://{proxy_addr}/public/file");

    let (healthy, broken) = tokio::join!(
        client.get(&url).header("host", "git.test").send(),
        client.get(&url).header("host", "broken.test").send(),
    );

    let healthy = healthy.unwrap();
    assert_eq!(healthy.status(), 200);
    assert!(healthy.headers().contains_key("x-request-id"));
    assert_eq!(broken.unwrap().status(), 502);

    let restricted = client
        .get(format!("http://{proxy_addr}/private/file"))
        .header("host", "git.test")
        .send()
        .await
        .unwrap();
    assert_eq!(restricted.status(), 403);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after shutdown")
        .unwrap()
        .unwrap();
}
