//! Request forwarding for one proxy route.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
    LOCATION, ORIGIN, REFERER, TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tapback_config::ProxyRoute;

use super::rewrite::{is_textual, HostRewriter};
use crate::auth::AUTH_COOKIE;
use crate::pages;

/// Largest request body the proxy will buffer.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Replaced (or recomputed by the HTTP client) rather than copied.
const SKIPPED_REQUEST_HEADERS: [HeaderName; 7] = [
    HOST,
    CONNECTION,
    ACCEPT_ENCODING,
    TRANSFER_ENCODING,
    ORIGIN,
    REFERER,
    CONTENT_LENGTH,
];

/// The body may change length and is never re-encoded.
const SKIPPED_RESPONSE_HEADERS: [HeaderName; 5] = [
    TRANSFER_ENCODING,
    CONNECTION,
    KEEP_ALIVE,
    CONTENT_ENCODING,
    CONTENT_LENGTH,
];

pub struct Forwarder {
    route: ProxyRoute,
    relay_address: String,
    client: reqwest::Client,
    rewriter: Arc<HostRewriter>,
}

impl Forwarder {
    pub fn new(
        route: ProxyRoute,
        relay_address: impl Into<String>,
        client: reqwest::Client,
        rewriter: Arc<HostRewriter>,
    ) -> Self {
        Self {
            route,
            relay_address: relay_address.into(),
            client,
            rewriter,
        }
    }

    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.route.local_port, path_and_query)
    }

    /// Headers sent to the local app: the caller's headers with every
    /// host-identifying one pointed at `localhost:{local_port}`.
    pub fn upstream_headers(&self, incoming: &HeaderMap, peer: SocketAddr) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(incoming.len() + 4);
        for (name, value) in incoming {
            if SKIPPED_REQUEST_HEADERS.contains(name) {
                continue;
            }
            if name == COOKIE {
                if let Some(value) = without_auth_cookie(value) {
                    headers.append(COOKIE, value);
                }
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        let local_port = self.route.local_port;
        insert(&mut headers, HOST, format!("localhost:{local_port}"));
        if incoming.contains_key(ORIGIN) {
            insert(&mut headers, ORIGIN, format!("http://localhost:{local_port}"));
        }
        if let Some(referer) = incoming.get(REFERER).and_then(|v| v.to_str().ok()) {
            insert(&mut headers, REFERER, local_referer(referer, local_port));
        }
        insert(
            &mut headers,
            X_FORWARDED_HOST,
            format!("{}:{}", self.relay_address, self.route.external_port),
        );
        insert(&mut headers, X_FORWARDED_PROTO, "http".to_string());
        if !headers.contains_key(&X_FORWARDED_FOR) {
            insert(&mut headers, X_FORWARDED_FOR, peer.ip().to_string());
        }
        headers
    }

    /// Forward one request and rewrite the response.
    pub async fn forward(&self, req: Request, peer: SocketAddr) -> Response {
        let (parts, body) = req.into_parts();
        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(port = self.route.external_port, error = %e, "Failed to read request body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
            }
        };

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.target_url(path_and_query);

        let mut request = self
            .client
            .request(parts.method.clone(), &url)
            .headers(self.upstream_headers(&parts.headers, peer));
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return self.bad_gateway(&e),
        };

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return self.bad_gateway(&e),
        };

        tracing::debug!(
            method = %parts.method,
            path = %path_and_query,
            status = status.as_u16(),
            port = self.route.local_port,
            "Proxied request"
        );
        self.build_response(&parts.method, status, &headers, body)
    }

    /// Copy upstream headers, rewrite textual bodies, fix `Content-Length`.
    pub fn build_response(
        &self,
        method: &Method,
        status: StatusCode,
        upstream: &HeaderMap,
        body: Bytes,
    ) -> Response {
        let textual = upstream
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_textual);

        let rewritten = textual
            .then(|| std::str::from_utf8(&body).ok())
            .flatten()
            .and_then(|text| match self.rewriter.rewrite(text) {
                Cow::Owned(rewritten) => Some(rewritten),
                Cow::Borrowed(_) => None,
            });
        let body = rewritten.map(Bytes::from).unwrap_or(body);

        let mut headers = HeaderMap::with_capacity(upstream.len() + 1);
        for (name, value) in upstream {
            if SKIPPED_RESPONSE_HEADERS.contains(name) {
                continue;
            }
            if name == LOCATION {
                if let Some(location) = value
                    .to_str()
                    .ok()
                    .and_then(|v| HeaderValue::from_str(&self.rewriter.rewrite(v)).ok())
                {
                    headers.append(LOCATION, location);
                    continue;
                }
            }
            headers.append(name.clone(), value.clone());
        }

        // HEAD and 304 responses carry no body; keep the length the app advertised.
        let content_length = if *method == Method::HEAD || status == StatusCode::NOT_MODIFIED {
            upstream.get(CONTENT_LENGTH).cloned()
        } else {
            Some(HeaderValue::from(body.len()))
        };
        if let Some(length) = content_length {
            headers.insert(CONTENT_LENGTH, length);
        }

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    fn bad_gateway(&self, error: &reqwest::Error) -> Response {
        let reason = if error.is_timeout() {
            "The request timed out.".to_string()
        } else if error.is_connect() {
            "The connection was refused.".to_string()
        } else {
            error.to_string()
        };
        tracing::warn!(
            local_port = self.route.local_port,
            external_port = self.route.external_port,
            error = %error,
            "Upstream unreachable"
        );
        (
            StatusCode::BAD_GATEWAY,
            Html(pages::bad_gateway_page(self.route.local_port, &reason)),
        )
            .into_response()
    }
}

/// Fallback handler for every method and path on a route's listener.
pub async fn proxy_handler(
    State(forwarder): State<Arc<Forwarder>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    forwarder.forward(req, peer).await
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

/// The caller's `Cookie` header minus the relay's own auth cookie.
/// `None` when nothing else is left.
fn without_auth_cookie(value: &HeaderValue) -> Option<HeaderValue> {
    let Ok(text) = value.to_str() else {
        return Some(value.clone());
    };
    let kept: Vec<&str> = text
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split_once('=').map_or(*pair, |(key, _)| key) != AUTH_COOKIE)
        .collect();
    if kept.is_empty() {
        return None;
    }
    HeaderValue::from_str(&kept.join("; ")).ok()
}

/// Keep the referer's path, swap its origin for the local app's.
fn local_referer(referer: &str, local_port: u16) -> String {
    let path = referer
        .split_once("://")
        .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or("/");
    format!("http://localhost:{local_port}{path}")
}
