//! Reverse proxy engine: one listener per configured route.
//!
//! Each route forwards every method and path on its external port to
//! `127.0.0.1:{local_port}`, then rewrites the response so the app works
//! from a remote device. Routes are read once, when the engine starts.

mod forward;
mod rewrite;

pub use forward::{proxy_handler, Forwarder};
pub use rewrite::{is_textual, HostRewriter};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use serde::Serialize;
use tapback_common::RelayError;
use tapback_config::{ProxyConfig, ProxyRoute};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{require_auth, Guard};

/// A route as advertised to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteLink {
    pub local_port: u16,
    pub external_port: u16,
    pub url: String,
}

pub struct ProxyEngine {
    routes: Vec<ProxyRoute>,
    relay_address: String,
    client: reqwest::Client,
    rewriter: Arc<HostRewriter>,
    guard: Option<Guard>,
}

impl ProxyEngine {
    /// `guard`, when present, gates every route behind the auth cookie.
    pub fn new(
        config: &ProxyConfig,
        relay_address: &str,
        guard: Option<Guard>,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| RelayError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            routes: config.routes.clone(),
            relay_address: relay_address.to_string(),
            client,
            rewriter: Arc::new(HostRewriter::new(relay_address, &config.routes)),
            guard,
        })
    }

    pub fn routes(&self) -> &[ProxyRoute] {
        &self.routes
    }

    pub fn links(&self) -> Vec<RouteLink> {
        self.routes
            .iter()
            .map(|route| RouteLink {
                local_port: route.local_port,
                external_port: route.external_port,
                url: format!("http://{}:{}", self.relay_address, route.external_port),
            })
            .collect()
    }

    /// Router forwarding everything on one route's listener.
    pub fn router(&self, route: ProxyRoute) -> Router {
        let forwarder = Forwarder::new(
            route,
            self.relay_address.clone(),
            self.client.clone(),
            self.rewriter.clone(),
        );
        let router = Router::new()
            .fallback(proxy_handler)
            .with_state(Arc::new(forwarder));

        match &self.guard {
            Some(guard) => router.layer(middleware::from_fn_with_state(guard.clone(), require_auth)),
            None => router,
        }
    }

    /// Serve one route on an already-bound listener until `shutdown`.
    pub fn serve(
        &self,
        route: ProxyRoute,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let app = self.router(route);
        tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
            if let Err(e) = result {
                tracing::error!(port = route.external_port, error = %e, "Proxy listener failed");
            }
        })
    }

    /// Bind and serve every route. A route whose port cannot be bound is
    /// logged and skipped; the others still start.
    pub async fn start(&self, bind: &str, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            let addr = format!("{bind}:{}", route.external_port);
            match TcpListener::bind(&addr).await {
                Ok(listener) => {
                    tracing::info!(
                        local_port = route.local_port,
                        external_port = route.external_port,
                        "Proxy route listening on {addr}"
                    );
                    handles.push(self.serve(*route, listener, shutdown.clone()));
                }
                Err(e) => {
                    tracing::error!(addr = %addr, error = %e, "Failed to bind proxy route");
                }
            }
        }
        handles
    }
}
