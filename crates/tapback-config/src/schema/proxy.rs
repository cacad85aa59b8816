//! Reverse proxy route table.

use serde::{Deserialize, Serialize};

/// A single `local_port -> external_port` forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyRoute {
    /// Port of the local application on 127.0.0.1.
    pub local_port: u16,
    /// Port the relay listens on for this route.
    pub external_port: u16,
}

impl ProxyRoute {
    pub fn new(local_port: u16, external_port: u16) -> Self {
        Self {
            local_port,
            external_port,
        }
    }
}

impl std::str::FromStr for ProxyRoute {
    type Err = String;

    /// Parses `LOCAL:EXTERNAL`, e.g. `3000:8081`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, external) = s
            .split_once(':')
            .ok_or_else(|| format!("expected LOCAL:EXTERNAL, got '{s}'"))?;
        let local_port = local
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid local port '{local}': {e}"))?;
        let external_port = external
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid external port '{external}': {e}"))?;
        Ok(Self::new(local_port, external_port))
    }
}

/// Reverse proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Seconds to wait for the local app to accept a connection.
    pub connect_timeout_secs: u64,
    /// Seconds to wait for the local app to finish responding.
    pub read_timeout_secs: u64,
    /// Apply the PIN gate to proxied apps as well.
    pub require_auth: bool,
    pub routes: Vec<ProxyRoute>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            require_auth: true,
            routes: Vec::new(),
        }
    }
}
