//! Front door: the main page, the viewer WebSocket, the JSON API and the
//! PIN gate, plus startup of the poll loop and the proxy listeners.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRef, Path, State, WebSocketUpgrade};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tapback_common::{RelayError, Result};
use tapback_config::TapbackConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{self, require_auth, AuthGate, Guard};
use crate::bridge::Multiplexer;
use crate::connection::handle_viewer;
use crate::hub::Hub;
use crate::net;
use crate::pages;
use crate::proxy::{ProxyEngine, RouteLink};
use crate::status::{StatusStore, StatusUpdate};

/// Shared state for every front-door handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub auth: AuthGate,
    pub routes: Arc<Vec<RouteLink>>,
    pub shutdown: CancellationToken,
    pub default_directory: Arc<str>,
}

impl FromRef<AppState> for AuthGate {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Paths reachable without the auth cookie.
fn is_public(method: &Method, path: &str) -> bool {
    match path {
        "/auth" | "/health" => true,
        "/api/claude-status" => method == Method::POST,
        _ => false,
    }
}

/// Build the front-door router.
pub fn router(state: AppState) -> Router {
    let guard = Guard::new(state.auth.clone(), "/auth").with_exemptions(is_public);

    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_upgrade))
        .route("/auth", get(auth::login_page).post(auth::submit_pin))
        .route("/health", get(health))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/{name}", delete(kill_session))
        .route("/api/claude-status", get(list_status).post(push_status))
        .route("/api/routes", get(list_routes))
        .layer(middleware::from_fn_with_state(guard, require_auth))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(pages::main_page(&state.routes))
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_viewer(socket, addr, state.hub, state.shutdown))
}

#[derive(Debug, Serialize)]
struct SessionEntry {
    name: String,
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionEntry>> {
    let sessions = state.hub.bridge().list_sessions().await;
    Json(sessions.into_iter().map(|name| SessionEntry { name }).collect())
}

#[derive(Debug, Deserialize)]
struct CreateSession {
    name: String,
    #[serde(default)]
    directory: Option<String>,
}

async fn create_session(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CreateSession = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return bad_request(e.to_string()),
    };
    let name = request.name.trim();
    if name.is_empty() {
        return bad_request("session name is required");
    }

    let directory = request
        .directory
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| state.default_directory.to_string());
    let ok = state.hub.bridge().create_session(name, &directory).await;
    tracing::info!(session = %name, directory = %directory, ok, "Create session");
    Json(json!({ "ok": ok })).into_response()
}

async fn kill_session(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<serde_json::Value> {
    tracing::info!(session = %name, "Kill session");
    let hub = state.hub.clone();
    tokio::spawn(async move {
        hub.bridge().kill_session(&name).await;
    });
    Json(json!({ "ok": true }))
}

async fn list_status(State(state): State<AppState>) -> Response {
    Json(state.hub.status().get_all().await).into_response()
}

async fn push_status(State(state): State<AppState>, body: Bytes) -> Response {
    let update: StatusUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed status push");
            return bad_request(e.to_string());
        }
    };
    let Some(record) = update.into_record(Utc::now()) else {
        return bad_request("session_id or project_dir is required");
    };
    state.hub.publish_status(record).await;
    Json(json!({ "ok": true })).into_response()
}

async fn list_routes(State(state): State<AppState>) -> Json<Vec<RouteLink>> {
    Json(state.routes.as_ref().clone())
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "ok": false, "error": error.into() })),
    )
        .into_response()
}

/// Directory new sessions start in when the caller names none.
fn default_directory(configured: &str) -> String {
    if !configured.trim().is_empty() {
        return configured.to_string();
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .to_string_lossy()
        .into_owned()
}

/// A configured, not yet started relay.
pub struct Relay {
    config: TapbackConfig,
    bridge: Arc<dyn Multiplexer>,
    auth: Option<AuthGate>,
}

impl Relay {
    pub fn new(config: TapbackConfig, bridge: Arc<dyn Multiplexer>) -> Self {
        Self {
            config,
            bridge,
            auth: None,
        }
    }

    /// Use a fixed gate instead of minting a fresh PIN on start.
    pub fn with_auth(mut self, auth: AuthGate) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Bind the front door and every proxy route, then start serving.
    ///
    /// Only a front-door bind failure is fatal; an unbindable proxy route
    /// is logged and skipped.
    pub async fn start(self) -> Result<RunningRelay> {
        let config = self.config;
        let relay_address = net::resolve_relay_address(&config.server.relay_address);
        let auth = self
            .auth
            .unwrap_or_else(|| AuthGate::generate(config.auth.pin_enabled));
        let shutdown = CancellationToken::new();

        let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;

        let mut tasks = Vec::new();

        // Poll loop
        let status = StatusStore::new(Duration::from_secs(config.status.retention_secs));
        let hub = Arc::new(Hub::new(
            self.bridge,
            status,
            Duration::from_millis(config.hub.poll_interval_ms),
        ));
        tasks.push(tokio::spawn(hub.clone().run(shutdown.clone())));

        // Proxy listeners
        let proxy_guard = (auth.is_enabled() && config.proxy.require_auth).then(|| {
            Guard::new(
                auth.clone(),
                format!("http://{relay_address}:{}/auth", addr.port()),
            )
        });
        let proxy = ProxyEngine::new(&config.proxy, &relay_address, proxy_guard)?;
        tasks.extend(proxy.start(&config.server.bind, shutdown.clone()).await);

        // Front door
        let state = AppState {
            hub,
            auth: auth.clone(),
            routes: Arc::new(proxy.links()),
            shutdown: shutdown.clone(),
            default_directory: Arc::from(default_directory(&config.tmux.default_directory)),
        };
        let app = router(state);
        let front_shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(front_shutdown.cancelled_owned())
            .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Front door server failed");
            }
        }));

        tracing::info!(addr = %addr, relay = %relay_address, "Relay listening");

        Ok(RunningRelay {
            addr,
            relay_address,
            auth,
            shutdown,
            tasks,
        })
    }
}

/// Handle to a started relay.
pub struct RunningRelay {
    addr: SocketAddr,
    relay_address: String,
    auth: AuthGate,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningRelay {
    /// Bound front-door address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn relay_address(&self) -> &str {
        &self.relay_address
    }

    /// The PIN for this run, if PIN auth is enabled.
    pub fn pin(&self) -> Option<&str> {
        self.auth.pin()
    }

    /// URL a remote device should open.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.relay_address, self.addr.port())
    }

    /// Signal every loop and listener to stop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Wait for every task to finish after [`RunningRelay::stop`].
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Relay task ended abnormally");
            }
        }
    }
}
