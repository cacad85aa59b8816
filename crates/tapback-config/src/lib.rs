//! Tapback configuration system.
//!
//! TOML-based configuration for the relay: listening port, PIN gate,
//! multiplexer invocation, poll cadence, status retention and the
//! reverse-proxy route table. Every section uses serde defaults so a
//! partial (or missing) file works out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tapback_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("relay port: {}", config.server.port);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    AuthConfig, HubConfig, LogLevel, LoggingConfig, ProxyConfig, ProxyRoute, ServerConfig,
    StatusConfig, TapbackConfig, TmuxConfig,
};

use std::path::Path;

use tapback_common::ConfigError;

/// Load config from the platform default path.
///
/// Creates a commented default file when none exists. Not validated:
/// callers apply their overrides first, then run [`validation::validate`].
pub fn load_config() -> Result<TapbackConfig, ConfigError> {
    toml_loader::load_default()
}

/// Load config from an explicit path, which must exist.
pub fn load_config_from(path: &Path) -> Result<TapbackConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    toml_loader::load_from_path(path)
}
