//! tapback-relay: mirror tmux sessions to a phone and proxy local web apps
//! onto LAN-reachable ports.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tapback_common::ConfigError;
use tapback_config::{validation, LogLevel, ProxyRoute, TapbackConfig};
use tapback_relay::{Relay, TmuxBridge};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(name = "tapback-relay", about = "Local relay for remote terminal viewing")]
struct Args {
    /// Path to a config file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the main page and viewer connections.
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the PIN gate.
    #[arg(long)]
    no_pin: bool,

    /// Proxy route as LOCAL:EXTERNAL. Repeatable; replaces configured routes.
    #[arg(long = "route", value_name = "LOCAL:EXTERNAL")]
    routes: Vec<ProxyRoute>,

    /// Address advertised to remote devices (auto-detected when omitted).
    #[arg(long)]
    relay_address: Option<String>,

    /// Log filter directive, e.g. `debug` or `tapback_relay=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut TapbackConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.no_pin {
            config.auth.pin_enabled = false;
        }
        if !self.routes.is_empty() {
            config.proxy.routes = self.routes.clone();
        }
        if let Some(addr) = &self.relay_address {
            config.server.relay_address = addr.clone();
        }
    }
}

/// Explicit `--config` paths must load; a broken default file falls back
/// to defaults.
fn load(args: &Args) -> Result<TapbackConfig, ConfigError> {
    match &args.config {
        Some(path) => tapback_config::load_config_from(path),
        None => Ok(tapback_config::load_config().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {e}");
            TapbackConfig::default()
        })),
    }
}

const DEFAULT_LOG_DIRECTIVES: &str = "tapback_relay=info,tapback_config=info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber before any config is read. `RUST_LOG`, then
/// `--log-level`, pin the filter; otherwise the returned handle lets the
/// `[logging] level` value replace the default once the config is loaded.
fn init_logging(args: &Args) -> Option<FilterHandle> {
    let (filter, follows_config) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, false),
        Err(_) => match &args.log_level {
            Some(directive) => (EnvFilter::new(directive), false),
            None => (EnvFilter::new(DEFAULT_LOG_DIRECTIVES), true),
        },
    };
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    follows_config.then_some(handle)
}

fn config_filter(level: LogLevel) -> EnvFilter {
    match level {
        LogLevel::Info => EnvFilter::new(DEFAULT_LOG_DIRECTIVES),
        level => EnvFilter::new(level.as_directive()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_filter = init_logging(&args);

    let mut config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(handle) = log_filter {
        if let Err(e) = handle.reload(config_filter(config.logging.level)) {
            tracing::warn!("Failed to apply configured log level: {e}");
        }
    }

    args.apply(&mut config);
    if let Err(e) = validation::validate(&config) {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }

    let bridge = Arc::new(TmuxBridge::new(&config.tmux));
    let relay = match Relay::new(config, bridge).start().await {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!("Failed to start relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Open {} on your phone", relay.url());
    match relay.pin() {
        Some(pin) => tracing::info!("PIN: {pin}"),
        None => tracing::warn!("PIN auth disabled; anyone on the network can connect"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutting down");
    relay.stop();
    relay.wait().await;
    ExitCode::SUCCESS
}
