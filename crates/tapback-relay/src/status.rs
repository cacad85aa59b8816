//! Status store: last-known coding-assistant status per project.
//!
//! Records are keyed by project directory (falling back to the reporting
//! session id) and evicted once older than the retention window. Eviction
//! runs on every write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Default retention window for status records.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Lifecycle state reported by a coding assistant hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Starting,
    Processing,
    Idle,
    Waiting,
    Ended,
}

/// Last reported status for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub session_id: String,
    pub status: AgentStatus,
    pub project_dir: Option<String>,
    pub model: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    /// Store key: the project directory, or the session id when absent.
    pub fn key(&self) -> &str {
        match self.project_dir.as_deref() {
            Some(dir) if !dir.is_empty() => dir,
            _ => &self.session_id,
        }
    }
}

/// Body of an inbound status push.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub session_id: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub project_dir: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl StatusUpdate {
    /// Stamp the update. Returns `None` when it carries no usable key.
    pub fn into_record(self, now: DateTime<Utc>) -> Option<StatusRecord> {
        let record = StatusRecord {
            session_id: self.session_id,
            status: self.status,
            project_dir: self.project_dir.filter(|dir| !dir.is_empty()),
            model: self.model.filter(|model| !model.is_empty()),
            updated_at: now,
        };
        (!record.key().is_empty()).then_some(record)
    }
}

/// Thread-safe status store.
#[derive(Clone)]
pub struct StatusStore {
    records: Arc<RwLock<HashMap<String, StatusRecord>>>,
    retention: chrono::Duration,
}

impl StatusStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Upsert by key, then evict everything past the retention window.
    pub async fn update(&self, record: StatusRecord) {
        let mut map = self.records.write().await;
        map.insert(record.key().to_string(), record);

        let Some(cutoff) = Utc::now().checked_sub_signed(self.retention) else {
            return;
        };
        map.retain(|key, record| {
            let fresh = record.updated_at >= cutoff;
            if !fresh {
                tracing::debug!(key = %key, "Evicting stale status record");
            }
            fresh
        });
    }

    /// All records, most recent first.
    pub async fn get_all(&self) -> Vec<StatusRecord> {
        let map = self.records.read().await;
        let mut records: Vec<StatusRecord> = map.values().cloned().collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records
    }

    pub async fn get(&self, project_dir: &str) -> Option<StatusRecord> {
        self.records.read().await.get(project_dir).cloned()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}
