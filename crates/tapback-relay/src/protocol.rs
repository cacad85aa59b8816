//! Viewer wire protocol. Frames are single-line JSON objects tagged by `t`.
//!
//! Decoding happens once, here; handlers only ever see the typed frames.

use serde::{Deserialize, Serialize};

use crate::status::StatusRecord;

/// Frames pushed to viewers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t")]
pub enum ServerFrame {
    /// Latest pane capture of one session.
    #[serde(rename = "o")]
    Output {
        id: String,
        #[serde(rename = "c")]
        content: String,
        path: String,
    },

    #[serde(rename = "status")]
    Status {
        #[serde(rename = "d")]
        record: StatusRecord,
    },
}

impl ServerFrame {
    pub fn output(id: impl Into<String>, content: impl Into<String>, path: Option<String>) -> Self {
        ServerFrame::Output {
            id: id.into(),
            content: content.into(),
            path: path.unwrap_or_default(),
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize server frame");
            String::new()
        })
    }
}

/// Frames received from viewers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "t")]
pub enum ClientFrame {
    /// Keystrokes for a session.
    #[serde(rename = "i")]
    Input {
        id: String,
        #[serde(rename = "c", default)]
        content: String,
    },
}

impl ClientFrame {
    /// Parse an inbound text frame. Malformed or unknown frames yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
