//! Front door listener and PIN gate settings.

use serde::{Deserialize, Serialize};

/// Terminal front door listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the front door (pages, API, WebSocket) listens on.
    pub port: u16,
    /// Interface to bind every listener to.
    pub bind: String,
    /// Address advertised to remote devices. Empty means auto-detect the
    /// primary LAN address.
    pub relay_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "0.0.0.0".into(),
            relay_address: String::new(),
        }
    }
}

/// PIN gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require the 4-digit PIN before serving any gated route.
    pub pin_enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { pin_enabled: true }
    }
}
