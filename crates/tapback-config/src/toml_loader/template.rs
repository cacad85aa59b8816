//! Default TOML config template with documentation comments.

/// Generate the default TOML config content with comments.
pub(super) fn default_config_toml() -> &'static str {
    r##"# Tapback Configuration
# Only override what you want to change -- missing fields use defaults.

[server]
# port = 8080
# bind = "0.0.0.0"
# relay_address = ""     # empty = detect the LAN address

[auth]
# pin_enabled = true     # a new 4-digit PIN is printed on every start

[tmux]
# program = "tmux"
# capture_lines = 300    # 1-10000
# timeout_ms = 5000      # 100-60000
# default_directory = "" # empty = home directory

[hub]
# poll_interval_ms = 1000

[status]
# retention_secs = 3600

[proxy]
# connect_timeout_secs = 5
# read_timeout_secs = 30
# require_auth = true

# [[proxy.routes]]
# local_port = 3000
# external_port = 8081

[logging]
# level = "info"         # trace, debug, info, warn, error
"##
}
