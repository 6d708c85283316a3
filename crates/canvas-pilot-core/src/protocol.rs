//! Local wire protocol: fan-out events and macro request/response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::CanvasSession;

/// SSE event name carrying a [`CanvasUpdate`].
pub const CANVAS_UPDATE_EVENT: &str = "canvas_update";

/// Payload of a `canvas_update` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasUpdate {
    pub canvas_id: String,
    pub canvas_name: String,
    pub client_name: String,
    pub client_id: String,
    pub timestamp: DateTime<Utc>,
}

impl CanvasUpdate {
    pub fn from_session(session: &CanvasSession) -> Self {
        Self {
            canvas_id: session.canvas_id.clone(),
            canvas_name: session.canvas_name.clone(),
            client_name: session.client_name.clone(),
            client_id: session.client_id.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Read-only status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub canvas_id: String,
    pub canvas_name: String,
    pub client_id: String,
    pub client_name: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&CanvasSession> for StatusPayload {
    fn from(session: &CanvasSession) -> Self {
        Self {
            canvas_id: session.canvas_id.clone(),
            canvas_name: session.canvas_name.clone(),
            client_id: session.client_id.clone(),
            client_name: session.client_name.clone(),
            connected: session.connected,
            updated_at: session.updated_at,
        }
    }
}

/// A required request field was missing or blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required field '{0}'")]
pub struct MissingField(pub &'static str);

fn require(value: Option<String>, field: &'static str) -> Result<String, MissingField> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(MissingField(field))
}

/// Body of single-zone macros (pin, unpin, auto-grid, grouping).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRequest {
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl ZoneRequest {
    pub fn validate(self) -> Result<String, MissingField> {
        require(self.zone_id, "zoneId")
    }
}

/// Body of two-zone macros (move, copy).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocateRequest {
    #[serde(default)]
    pub source_zone_id: Option<String>,
    #[serde(default)]
    pub target_zone_id: Option<String>,
}

impl RelocateRequest {
    /// Returns `(source, target)` zone ids.
    pub fn validate(self) -> Result<(String, String), MissingField> {
        let source = require(self.source_zone_id, "sourceZoneId")?;
        let target = require(self.target_zone_id, "targetZoneId")?;
        Ok((source, target))
    }
}

/// Reply to every macro endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MacroResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_request_validation() {
        let req: ZoneRequest = serde_json::from_str(r#"{"zoneId":"a-1"}"#).unwrap();
        assert_eq!(req.validate().unwrap(), "a-1");

        let req: ZoneRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.validate(), Err(MissingField("zoneId")));

        let req: ZoneRequest = serde_json::from_str(r#"{"zoneId":"  "}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_relocate_request_validation() {
        let req: RelocateRequest =
            serde_json::from_str(r#"{"sourceZoneId":"s","targetZoneId":"t"}"#).unwrap();
        assert_eq!(req.validate().unwrap(), ("s".to_string(), "t".to_string()));

        let req: RelocateRequest = serde_json::from_str(r#"{"sourceZoneId":"s"}"#).unwrap();
        assert_eq!(req.validate(), Err(MissingField("targetZoneId")));
    }

    #[test]
    fn test_macro_response_shape() {
        let ok = serde_json::to_value(MacroResponse::ok("Moved 3 widgets")).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "message": "Moved 3 widgets"}));

        let err = serde_json::to_value(MacroResponse::err("boom")).unwrap();
        assert_eq!(err, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_canvas_update_fields() {
        let mut session = CanvasSession::bound("cid", "wall");
        session.canvas_id = "c-1".into();
        let value = serde_json::to_value(CanvasUpdate::from_session(&session)).unwrap();
        for key in ["canvas_id", "canvas_name", "client_name", "client_id", "timestamp"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
