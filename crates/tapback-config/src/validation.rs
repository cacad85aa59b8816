//! Full configuration validation.
//!
//! Validates numeric ranges and the proxy route table: every port non-zero,
//! local ports unique, external ports unique and distinct from the front
//! door's own port.

use std::collections::HashSet;

use crate::schema::TapbackConfig;
use tapback_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TapbackConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if config.server.port == 0 {
        errors.push("server.port must be non-zero".into());
    }

    validate_range(&mut errors, "tmux.capture_lines", config.tmux.capture_lines as u64, 1, 10_000);
    validate_range(&mut errors, "tmux.timeout_ms", config.tmux.timeout_ms, 100, 60_000);
    validate_range(&mut errors, "hub.poll_interval_ms", config.hub.poll_interval_ms, 100, 60_000);
    validate_range(&mut errors, "status.retention_secs", config.status.retention_secs, 1, u64::MAX);
    validate_range(
        &mut errors,
        "proxy.connect_timeout_secs",
        config.proxy.connect_timeout_secs,
        1,
        300,
    );
    validate_range(&mut errors, "proxy.read_timeout_secs", config.proxy.read_timeout_secs, 1, 3600);

    validate_routes(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_routes(errors: &mut Vec<String>, config: &TapbackConfig) {
    let mut local_ports = HashSet::new();
    let mut external_ports = HashSet::new();

    for (i, route) in config.proxy.routes.iter().enumerate() {
        if route.local_port == 0 {
            errors.push(format!("proxy.routes[{i}].local_port must be non-zero"));
        }
        if route.external_port == 0 {
            errors.push(format!("proxy.routes[{i}].external_port must be non-zero"));
        }
        if !local_ports.insert(route.local_port) {
            errors.push(format!(
                "proxy.routes[{i}].local_port = {} is already routed",
                route.local_port
            ));
        }
        if !external_ports.insert(route.external_port) {
            errors.push(format!(
                "proxy.routes[{i}].external_port = {} is used by another route",
                route.external_port
            ));
        }
        if route.external_port == config.server.port {
            errors.push(format!(
                "proxy.routes[{i}].external_port = {} collides with server.port",
                route.external_port
            ));
        }
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&TapbackConfig::default()).is_ok());
    }

    #[test]
    fn distinct_routes_are_valid() {
        let mut config = TapbackConfig::default();
        config.proxy.routes = vec![ProxyRoute::new(3000, 8081), ProxyRoute::new(5173, 8082)];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn duplicate_external_port_is_rejected() {
        let mut config = TapbackConfig::default();
        config.proxy.routes = vec![ProxyRoute::new(3000, 8081), ProxyRoute::new(5173, 8081)];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("used by another route"));
    }

    #[test]
    fn duplicate_local_port_is_rejected() {
        let mut config = TapbackConfig::default();
        config.proxy.routes = vec![ProxyRoute::new(3000, 8081), ProxyRoute::new(3000, 8082)];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("already routed"));
    }

    #[test]
    fn external_port_equal_to_server_port_is_rejected() {
        let mut config = TapbackConfig::default();
        config.proxy.routes = vec![ProxyRoute::new(3000, config.server.port)];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("collides with server.port"));
    }

    #[test]
    fn zero_ports_are_rejected() {
        let mut config = TapbackConfig::default();
        config.proxy.routes = vec![ProxyRoute::new(0, 0)];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("local_port must be non-zero"));
        assert!(err.contains("external_port must be non-zero"));
    }

    #[test]
    fn out_of_range_poll_interval_is_rejected() {
        let mut config = TapbackConfig::default();
        config.hub.poll_interval_ms = 10;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("hub.poll_interval_ms = 10 is out of range"));
    }

    #[test]
    fn errors_are_collected_together() {
        let mut config = TapbackConfig::default();
        config.tmux.capture_lines = 0;
        config.status.retention_secs = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("tmux.capture_lines"));
        assert!(err.contains("status.retention_secs"));
    }
}
