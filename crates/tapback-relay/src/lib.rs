//! tapback-relay: local relay that mirrors terminal multiplexer sessions to
//! remote viewers and reverse-proxies local web apps onto LAN-reachable
//! ports.

pub mod auth;
pub mod bridge;
pub mod connection;
pub mod hub;
pub mod net;
pub mod pages;
pub mod protocol;
pub mod proxy;
pub mod server;
pub mod status;

pub use bridge::{Multiplexer, TmuxBridge};
pub use hub::Hub;
pub use proxy::{ProxyEngine, RouteLink};
pub use server::{Relay, RunningRelay};
pub use status::{AgentStatus, StatusRecord, StatusStore};
