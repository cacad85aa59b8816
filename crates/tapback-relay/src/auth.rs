//! PIN gate: a 4-digit PIN exchanged for a short-lived HTTP-only cookie.
//!
//! PIN and token are minted on every relay start and never persisted, so a
//! restart invalidates every outstanding cookie.

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;

use crate::pages;

/// Name of the session cookie.
pub const AUTH_COOKIE: &str = "tapback_auth";

const COOKIE_MAX_AGE_SECS: u64 = 24 * 60 * 60;
const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct AuthGate {
    pin: Option<Arc<str>>,
    token: Arc<str>,
}

impl AuthGate {
    /// Mint a fresh PIN (when enabled) and auth token.
    pub fn generate(pin_enabled: bool) -> Self {
        let mut rng = rand::thread_rng();
        let pin = pin_enabled.then(|| format!("{:04}", rng.gen_range(0..10_000)));
        let token: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self {
            pin: pin.map(Arc::from),
            token: Arc::from(token),
        }
    }

    pub fn disabled() -> Self {
        Self::generate(false)
    }

    pub fn with_pin(pin: &str, token: &str) -> Self {
        Self {
            pin: Some(Arc::from(pin)),
            token: Arc::from(token),
        }
    }

    pub fn pin(&self) -> Option<&str> {
        self.pin.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.pin.is_some()
    }

    pub fn check_pin(&self, candidate: &str) -> bool {
        matches!(self.pin.as_deref(), Some(pin) if pin == candidate.trim())
    }

    /// Whether a request carrying `headers` may pass the gate.
    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        !self.is_enabled() || cookie_value(headers, AUTH_COOKIE) == Some(&*self.token)
    }

    /// `Set-Cookie` value granting access for 24 hours.
    pub fn session_cookie(&self) -> String {
        format!(
            "{AUTH_COOKIE}={}; Max-Age={COOKIE_MAX_AGE_SECS}; Path=/; HttpOnly; SameSite=Lax",
            self.token
        )
    }
}

/// Find a cookie by name across every `Cookie` header.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Middleware state: the gate plus where to send unauthenticated callers.
#[derive(Clone)]
pub struct Guard {
    gate: AuthGate,
    login_url: Arc<str>,
    exempt: fn(&Method, &str) -> bool,
}

impl Guard {
    pub fn new(gate: AuthGate, login_url: impl Into<Arc<str>>) -> Self {
        Self {
            gate,
            login_url: login_url.into(),
            exempt: |_, _| false,
        }
    }

    /// Let requests matching `exempt` through without a cookie.
    pub fn with_exemptions(mut self, exempt: fn(&Method, &str) -> bool) -> Self {
        self.exempt = exempt;
        self
    }
}

/// Redirect requests lacking a valid cookie to the login page.
pub async fn require_auth(State(guard): State<Guard>, req: Request, next: Next) -> Response {
    if (guard.exempt)(req.method(), req.uri().path()) || guard.gate.is_authorized(req.headers()) {
        return next.run(req).await;
    }
    tracing::debug!(path = %req.uri().path(), "Unauthenticated request redirected");
    Redirect::to(&guard.login_url).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PinForm {
    pub pin: String,
}

/// `GET /auth`
pub async fn login_page(State(gate): State<AuthGate>) -> Response {
    if !gate.is_enabled() {
        return Redirect::to("/").into_response();
    }
    Html(pages::pin_page(None)).into_response()
}

/// `POST /auth`
pub async fn submit_pin(
    State(gate): State<AuthGate>,
    form: Result<Form<PinForm>, FormRejection>,
) -> Response {
    if !gate.is_enabled() {
        return Redirect::to("/").into_response();
    }

    match form {
        Ok(Form(PinForm { pin })) if gate.check_pin(&pin) => {
            tracing::info!("PIN accepted");
            let mut response = Redirect::to("/").into_response();
            if let Ok(cookie) = HeaderValue::from_str(&gate.session_cookie()) {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            response
        }
        _ => {
            tracing::warn!("Rejected PIN attempt");
            (
                StatusCode::UNAUTHORIZED,
                Html(pages::pin_page(Some("Invalid PIN"))),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn generated_pin_is_four_digits() {
        for _ in 0..50 {
            let gate = AuthGate::generate(true);
            let pin = gate.pin().unwrap();
            assert_eq!(pin.len(), 4);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn tokens_differ_between_starts() {
        let a = AuthGate::generate(true);
        let b = AuthGate::generate(true);
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), TOKEN_LEN);
    }

    #[test]
    fn disabled_gate_passes_everything() {
        let gate = AuthGate::disabled();
        assert!(!gate.is_enabled());
        assert!(gate.is_authorized(&HeaderMap::new()));
        assert!(!gate.check_pin("0000"));
    }

    #[test]
    fn check_pin_compares_exactly() {
        let gate = AuthGate::with_pin("0420", "tok");
        assert!(gate.check_pin("0420"));
        assert!(gate.check_pin(" 0420\n"));
        assert!(!gate.check_pin("420"));
        assert!(!gate.check_pin("0421"));
    }

    #[test]
    fn cookie_must_match_token() {
        let gate = AuthGate::with_pin("1234", "secret-token");
        assert!(!gate.is_authorized(&HeaderMap::new()));
        assert!(!gate.is_authorized(&headers_with_cookie("tapback_auth=wrong")));
        assert!(gate.is_authorized(&headers_with_cookie("tapback_auth=secret-token")));
        assert!(gate.is_authorized(&headers_with_cookie(
            "theme=dark; tapback_auth=secret-token; other=1"
        )));
    }

    #[test]
    fn session_cookie_is_http_only_for_a_day() {
        let gate = AuthGate::with_pin("1234", "abc");
        let cookie = gate.session_cookie();
        assert!(cookie.starts_with("tapback_auth=abc;"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("HttpOnly"));
    }
}
