#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tapback_config::TapbackConfig;
use tapback_relay::auth::AuthGate;
use tapback_relay::{Multiplexer, Relay, RunningRelay};

/// In-memory multiplexer: sessions with fixed pane text and a log of
/// every keystroke and lifecycle call.
#[derive(Default)]
pub struct FakeMux {
    sessions: Mutex<Vec<(String, String)>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub created: Mutex<Vec<(String, String)>>,
    pub killed: Mutex<Vec<String>>,
}

impl FakeMux {
    pub fn with_sessions(sessions: &[(&str, &str)]) -> Arc<Self> {
        let mux = FakeMux::default();
        *mux.sessions.lock().unwrap() = sessions
            .iter()
            .map(|(name, pane)| (name.to_string(), pane.to_string()))
            .collect();
        Arc::new(mux)
    }

    pub fn set_pane(&self, session: &str, text: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.iter_mut().find(|(name, _)| name == session) {
            entry.1 = text.to_string();
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Multiplexer for FakeMux {
    async fn list_sessions(&self) -> Vec<String> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    async fn capture_pane(&self, session: &str) -> String {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == session)
            .map(|(_, pane)| pane.clone())
            .unwrap_or_default()
    }

    async fn send_keys(&self, session: &str, text: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((session.to_string(), text.to_string()));
    }

    async fn current_directory(&self, session: &str) -> Option<String> {
        Some(format!("/work/{session}"))
    }

    async fn create_session(&self, name: &str, directory: &str) -> bool {
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), directory.to_string()));
        self.sessions
            .lock()
            .unwrap()
            .push((name.to_string(), String::new()));
        true
    }

    async fn kill_session(&self, name: &str) {
        self.killed.lock().unwrap().push(name.to_string());
        self.sessions.lock().unwrap().retain(|(n, _)| n != name);
    }
}

/// Loopback config on an ephemeral port with a fast poll loop.
pub fn test_config() -> TapbackConfig {
    let mut config = TapbackConfig::default();
    config.server.bind = "127.0.0.1".into();
    config.server.port = 0;
    config.server.relay_address = "127.0.0.1".into();
    config.hub.poll_interval_ms = 100;
    config
}

pub async fn start_relay(mux: Arc<FakeMux>, auth: AuthGate) -> RunningRelay {
    Relay::new(test_config(), mux)
        .with_auth(auth)
        .start()
        .await
        .expect("start relay")
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("build client")
}
