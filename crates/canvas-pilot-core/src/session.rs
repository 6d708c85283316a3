//! Live canvas session values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which canvas the bound client currently shows.
///
/// Empty ids mean "unknown"; `connected` tracks the upstream subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasSession {
    pub client_id: String,
    pub client_name: String,
    pub canvas_id: String,
    pub canvas_name: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CanvasSession {
    /// A session for a freshly bound client with no canvas observed yet.
    pub fn bound(client_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: client_name.into(),
            ..Self::default()
        }
    }

    /// Fold one upstream event into the session.
    pub fn apply(&mut self, event: CanvasEvent) {
        self.canvas_id = event.canvas_id;
        self.canvas_name = event.canvas_name;
        self.connected = true;
        self.updated_at = Some(event.timestamp);
    }

    /// True once a canvas id has been observed.
    pub fn has_canvas(&self) -> bool {
        !self.canvas_id.is_empty()
    }
}

/// One parsed upstream frame naming the active canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasEvent {
    pub canvas_id: String,
    pub canvas_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct WorkspaceFrame {
    canvas_id: Option<serde_json::Value>,
    canvas_name: Option<serde_json::Value>,
}

impl CanvasEvent {
    /// Parse the JSON payload of a `data:` frame.
    ///
    /// Returns `None` for malformed JSON, non-objects, or frames without a
    /// non-empty string `canvas_id`. A non-string `canvas_name` is treated
    /// as absent.
    pub fn from_frame(payload: &str) -> Option<Self> {
        let frame: WorkspaceFrame = serde_json::from_str(payload).ok()?;
        let canvas_id = frame.canvas_id?.as_str()?.to_string();
        if canvas_id.is_empty() {
            return None;
        }
        let canvas_name = frame
            .canvas_name
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Some(Self {
            canvas_id,
            canvas_name,
            timestamp: Utc::now(),
        })
    }
}
