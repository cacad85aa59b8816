//! Configuration schema types for Tapback.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod proxy;
mod server;
mod system;
mod tmux;

pub use proxy::*;
pub use server::*;
pub use system::*;
pub use tmux::*;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TapbackConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub tmux: TmuxConfig,
    pub hub: HubConfig,
    pub status: StatusConfig,
    pub proxy: ProxyConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: TapbackConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.auth.pin_enabled);
        assert_eq!(config.tmux.capture_lines, 300);
        assert_eq!(config.hub.poll_interval_ms, 1000);
        assert_eq!(config.status.retention_secs, 3600);
        assert!(config.proxy.routes.is_empty());
    }

    #[test]
    fn full_toml_round_trip_values() {
        let toml_str = r#"
[server]
port = 9000
relay_address = "192.168.1.20"

[auth]
pin_enabled = false

[[proxy.routes]]
local_port = 3000
external_port = 8081

[[proxy.routes]]
local_port = 5173
external_port = 8082
"#;
        let config: TapbackConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.relay_address, "192.168.1.20");
        assert!(!config.auth.pin_enabled);
        assert_eq!(config.proxy.routes.len(), 2);
        assert_eq!(config.proxy.routes[1], ProxyRoute::new(5173, 8082));
    }
}
