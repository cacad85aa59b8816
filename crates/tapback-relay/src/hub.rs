//! Terminal relay hub: viewer registry, shared poll loop, input routing.
//!
//! One poll loop serves every viewer: each tick lists live sessions,
//! captures every pane and broadcasts one output frame per session. New
//! viewers get a catch-up snapshot queued ahead of any broadcast frame.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tapback_common::ViewerId;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::bridge::Multiplexer;
use crate::protocol::ServerFrame;
use crate::status::{StatusRecord, StatusStore};

/// Default interval between session polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outbound queue of serialized frames for one viewer.
pub type ViewerRx = mpsc::UnboundedReceiver<String>;

pub struct Hub {
    bridge: Arc<dyn Multiplexer>,
    status: StatusStore,
    viewers: Mutex<HashMap<ViewerId, mpsc::UnboundedSender<String>>>,
    poll_interval: Duration,
}

impl Hub {
    pub fn new(bridge: Arc<dyn Multiplexer>, status: StatusStore, poll_interval: Duration) -> Self {
        Self {
            bridge,
            status,
            viewers: Mutex::new(HashMap::new()),
            poll_interval,
        }
    }

    pub fn bridge(&self) -> &Arc<dyn Multiplexer> {
        &self.bridge
    }

    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    /// Register a viewer. The returned queue already holds one output frame
    /// per live session and one status frame per known record.
    pub async fn attach(&self) -> (ViewerId, ViewerRx) {
        let id = ViewerId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let outputs = self.snapshot().await;

        let mut viewers = self.viewers.lock().await;
        for frame in &outputs {
            let _ = tx.send(frame.to_json());
        }
        // Taken under the registry lock so a concurrent status push is
        // either in this snapshot or broadcast to the new entry.
        for record in self.status.get_all().await {
            let _ = tx.send(ServerFrame::Status { record }.to_json());
        }
        viewers.insert(id.clone(), tx);
        tracing::info!(viewer = %id, viewers = viewers.len(), "Viewer attached");

        (id, rx)
    }

    pub async fn detach(&self, id: &ViewerId) {
        let mut viewers = self.viewers.lock().await;
        if viewers.remove(id).is_some() {
            tracing::info!(viewer = %id, viewers = viewers.len(), "Viewer detached");
        }
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.lock().await.len()
    }

    /// Queue a frame for every viewer. A viewer whose queue is gone misses
    /// this frame only. Returns how many viewers it was queued for.
    pub async fn broadcast(&self, frame: &ServerFrame) -> usize {
        let viewers = self.viewers.lock().await;
        send_all(&viewers, &frame.to_json())
    }

    /// Store a status record and push it to every viewer immediately.
    ///
    /// The registry lock is held across both steps, so viewers receive
    /// concurrent pushes in the order the store applied them.
    pub async fn publish_status(&self, record: StatusRecord) {
        tracing::debug!(key = %record.key(), status = ?record.status, "Status update");
        let viewers = self.viewers.lock().await;
        self.status.update(record.clone()).await;
        send_all(&viewers, &ServerFrame::Status { record }.to_json());
    }

    /// Forward keystrokes to a live session. Returns `false` (and does
    /// nothing) when the session is not in the multiplexer's current list.
    pub async fn route_input(&self, session: &str, text: &str) -> bool {
        let live = self.bridge.list_sessions().await;
        if !live.iter().any(|name| name == session) {
            tracing::debug!(session = %session, "Input for unknown session dropped");
            return false;
        }
        self.bridge.send_keys(session, text).await;
        true
    }

    /// Capture every live session: one output frame each.
    pub async fn snapshot(&self) -> Vec<ServerFrame> {
        let sessions = self.bridge.list_sessions().await;
        let captures = sessions.into_iter().map(|name| async move {
            let (content, path) = tokio::join!(
                self.bridge.capture_pane(&name),
                self.bridge.current_directory(&name)
            );
            ServerFrame::output(name, content, path)
        });
        join_all(captures).await
    }

    /// Poll loop. Runs until `shutdown` is cancelled; skips the
    /// multiplexer entirely while no viewer is attached.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::debug!(interval_ms = self.poll_interval.as_millis() as u64, "Poll loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if self.viewer_count().await == 0 {
                        continue;
                    }
                    for frame in self.snapshot().await {
                        self.broadcast(&frame).await;
                    }
                }
            }
        }

        tracing::debug!("Poll loop stopped");
    }
}

fn send_all(viewers: &HashMap<ViewerId, mpsc::UnboundedSender<String>>, json: &str) -> usize {
    let mut delivered = 0;
    for (id, tx) in viewers {
        if tx.send(json.to_string()).is_ok() {
            delivered += 1;
        } else {
            tracing::debug!(viewer = %id, "Dropped frame for closed viewer queue");
        }
    }
    delivered
}
