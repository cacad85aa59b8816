mod common;

use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::client;
use serde_json::{json, Value};
use tapback_config::{ProxyConfig, ProxyRoute};
use tapback_relay::ProxyEngine;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Local app standing in for a dev server on an ephemeral port.
async fn spawn_app(sibling_port: u16) -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let page = format!(
        r#"<script src="http://localhost:{port}/app.js"></script><a href="//127.0.0.1:{sibling_port}/x">sibling</a><a href="http://localhost:9/other">other</a>"#
    );
    let app = Router::new()
        .route(
            "/",
            get(move || async move { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page) }),
        )
        .route(
            "/logo.png",
            get(move || async move {
                (
                    [(header::CONTENT_TYPE, "image/png")],
                    format!("http://localhost:{port}"),
                )
            }),
        )
        .route("/headers", get(echo_headers))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route("/submit", post(|body: String| async move { format!("got {body}") }))
        .route(
            "/login",
            get(move || async move { Redirect::to(&format!("http://localhost:{port}/home")) }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });
    port
}

async fn echo_headers(headers: HeaderMap) -> impl IntoResponse {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    Json(json!({
        "host": get("host"),
        "origin": get("origin"),
        "referer": get("referer"),
        "x-forwarded-host": get("x-forwarded-host"),
        "x-forwarded-proto": get("x-forwarded-proto"),
        "x-forwarded-for": get("x-forwarded-for"),
    }))
}

/// Start the proxy for `routes`, serving `routes[0]` on `listener`.
fn serve_route(
    routes: Vec<ProxyRoute>,
    listener: TcpListener,
    shutdown: &CancellationToken,
) -> ProxyEngine {
    let config = ProxyConfig {
        routes: routes.clone(),
        ..ProxyConfig::default()
    };
    let engine = ProxyEngine::new(&config, "127.0.0.1", None).unwrap();
    let _server = engine.serve(routes[0], listener, shutdown.clone());
    engine
}

async fn ephemeral() -> (TcpListener, u16) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn html_bodies_are_rewritten_to_external_ports() {
    let (listener, ext) = ephemeral().await;
    let sibling_ext = ext.wrapping_add(1);
    let sibling_local = 45_173;
    let local = spawn_app(sibling_local).await;
    let shutdown = CancellationToken::new();
    let _engine = serve_route(
        vec![
            ProxyRoute::new(local, ext),
            ProxyRoute::new(sibling_local, sibling_ext),
        ],
        listener,
        &shutdown,
    );

    let response = client().get(format!("http://127.0.0.1:{ext}/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let declared: usize = response.headers()[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let body = response.text().await.unwrap();

    assert_eq!(declared, body.len());
    assert!(body.contains(&format!("http://127.0.0.1:{ext}/app.js")));
    assert!(body.contains(&format!("//127.0.0.1:{sibling_ext}/x")));
    assert!(!body.contains(&format!("localhost:{local}")));
    // Unrouted ports stay as they were.
    assert!(body.contains("http://localhost:9/other"));

    shutdown.cancel();
}

#[tokio::test]
async fn binary_bodies_pass_through_untouched() {
    let (listener, ext) = ephemeral().await;
    let local = spawn_app(1).await;
    let shutdown = CancellationToken::new();
    let _engine = serve_route(vec![ProxyRoute::new(local, ext)], listener, &shutdown);

    let body = client()
        .get(format!("http://127.0.0.1:{ext}/logo.png"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, format!("http://localhost:{local}"));

    shutdown.cancel();
}

#[tokio::test]
async fn upstream_sees_local_host_headers() {
    let (listener, ext) = ephemeral().await;
    let local = spawn_app(1).await;
    let shutdown = CancellationToken::new();
    let _engine = serve_route(vec![ProxyRoute::new(local, ext)], listener, &shutdown);

    let seen: Value = client()
        .get(format!("http://127.0.0.1:{ext}/headers"))
        .header("origin", format!("http://192.168.1.50:{ext}"))
        .header("referer", format!("http://192.168.1.50:{ext}/page?q=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(seen["host"], format!("localhost:{local}"));
    assert_eq!(seen["origin"], format!("http://localhost:{local}"));
    assert_eq!(seen["referer"], format!("http://localhost:{local}/page?q=1"));
    assert_eq!(seen["x-forwarded-host"], format!("127.0.0.1:{ext}"));
    assert_eq!(seen["x-forwarded-proto"], "http");
    assert_eq!(seen["x-forwarded-for"], "127.0.0.1");

    shutdown.cancel();
}

#[tokio::test]
async fn request_bodies_are_forwarded() {
    let (listener, ext) = ephemeral().await;
    let local = spawn_app(1).await;
    let shutdown = CancellationToken::new();
    let _engine = serve_route(vec![ProxyRoute::new(local, ext)], listener, &shutdown);

    let response = client()
        .post(format!("http://127.0.0.1:{ext}/submit"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "got hello");

    shutdown.cancel();
}

#[tokio::test]
async fn redirects_are_rewritten() {
    let (listener, ext) = ephemeral().await;
    let local = spawn_app(1).await;
    let shutdown = CancellationToken::new();
    let _engine = serve_route(vec![ProxyRoute::new(local, ext)], listener, &shutdown);

    let response = client()
        .get(format!("http://127.0.0.1:{ext}/login"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("http://127.0.0.1:{ext}/home").as_str()
    );

    shutdown.cancel();
}

#[tokio::test]
async fn unreachable_app_is_bad_gateway() {
    let (closed, closed_port) = ephemeral().await;
    drop(closed);
    let (listener, ext) = ephemeral().await;
    let shutdown = CancellationToken::new();
    let _engine = serve_route(vec![ProxyRoute::new(closed_port, ext)], listener, &shutdown);

    let response = client()
        .get(format!("http://127.0.0.1:{ext}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response.text().await.unwrap().contains(&closed_port.to_string()));

    shutdown.cancel();
}

#[tokio::test]
async fn slow_app_times_out_as_bad_gateway() {
    let (listener, ext) = ephemeral().await;
    let local = spawn_app(1).await;
    let config = ProxyConfig {
        read_timeout_secs: 1,
        routes: vec![ProxyRoute::new(local, ext)],
        ..ProxyConfig::default()
    };
    let engine = ProxyEngine::new(&config, "127.0.0.1", None).unwrap();
    let shutdown = CancellationToken::new();
    let _server = engine.serve(config.routes[0], listener, shutdown.clone());

    let started = Instant::now();
    let response = client()
        .get(format!("http://127.0.0.1:{ext}/slow"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(started.elapsed() < Duration::from_secs(4));
    let body = response.text().await.unwrap();
    assert!(body.contains(&local.to_string()));
    assert!(body.contains("timed out"));

    shutdown.cancel();
}

#[tokio::test]
async fn gated_routes_redirect_to_front_door() {
    use tapback_relay::auth::{AuthGate, Guard};

    let (listener, ext) = ephemeral().await;
    let local = spawn_app(1).await;
    let config = ProxyConfig {
        routes: vec![ProxyRoute::new(local, ext)],
        ..ProxyConfig::default()
    };
    let guard = Guard::new(AuthGate::with_pin("1234", "tok"), "http://127.0.0.1:8080/auth");
    let engine = ProxyEngine::new(&config, "127.0.0.1", Some(guard)).unwrap();
    let shutdown = CancellationToken::new();
    let _server = engine.serve(config.routes[0], listener, shutdown.clone());

    let denied = client()
        .get(format!("http://127.0.0.1:{ext}/logo.png"))
        .send()
        .await
        .unwrap();
    assert!(denied.status().is_redirection());
    assert_eq!(denied.headers()[header::LOCATION], "http://127.0.0.1:8080/auth");

    let allowed = client()
        .get(format!("http://127.0.0.1:{ext}/logo.png"))
        .header("cookie", "tapback_auth=tok")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    shutdown.cancel();
}
