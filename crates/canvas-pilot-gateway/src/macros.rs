//! `POST /api/macros/{name}`: zone macro endpoints.

use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use canvas_pilot_core::protocol::{MacroResponse, RelocateRequest, ZoneRequest};
use canvas_pilot_engine::{EngineError, MacroKind, MacroOutcome};

use crate::state::GatewayState;

/// Engine failure rendered as `{success: false, error}`.
pub struct ApiError(pub EngineError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::Upstream(_) | EngineError::Parse(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(MacroResponse::err(self.0.to_string()))).into_response()
    }
}

/// Parse a JSON body; an empty body counts as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, EngineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| EngineError::InvalidRequest(format!("malformed request body: {e}")))
}

pub async fn macro_handler(
    State(state): State<Arc<GatewayState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let Some(kind) = MacroKind::from_name(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(MacroResponse::err(format!("unknown macro '{name}'"))),
        )
            .into_response();
    };

    #[cfg(feature = "metrics")]
    let started = Instant::now();

    // Detached so a dropped connection cannot cancel a half-applied batch.
    let task = tokio::spawn(async move { run_macro(&state, kind, &body).await });
    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!(macro_kind = %kind, error = %e, "Macro task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MacroResponse::err(format!("macro '{kind}' aborted"))),
            )
                .into_response();
        }
    };

    #[cfg(feature = "metrics")]
    crate::metrics::record_macro(kind.as_str(), started.elapsed().as_secs_f64(), result.as_ref().ok());

    match result {
        Ok(outcome) => {
            info!(macro_kind = %kind, message = %outcome.message(), "Macro request done");
            Json(MacroResponse::ok(outcome.message())).into_response()
        }
        Err(e) => {
            let e = ApiError(e);
            warn!(macro_kind = %kind, status = %e.status(), error = %e.0, "Macro request failed");
            e.into_response()
        }
    }
}

async fn run_macro(
    state: &GatewayState,
    kind: MacroKind,
    body: &Bytes,
) -> Result<MacroOutcome, EngineError> {
    let engine = &state.engine;
    if kind.is_relocation() {
        let (source, target) = parse_body::<RelocateRequest>(body)?.validate()?;
        match kind {
            MacroKind::Move => engine.move_zone(&source, &target).await,
            _ => engine.copy_zone(&source, &target).await,
        }
    } else {
        let zone_id = parse_body::<ZoneRequest>(body)?.validate()?;
        engine.run_in_zone(kind, &zone_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (EngineError::Unavailable("x".into()), 503),
            (EngineError::InvalidRequest("x".into()), 400),
            (EngineError::Upstream("x".into()), 502),
            (EngineError::Parse("x".into()), 502),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError(err).status().as_u16(), code);
        }
    }

    #[test]
    fn test_parse_body() {
        let empty: ZoneRequest = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(empty.zone_id.is_none());

        let req: RelocateRequest =
            parse_body(&Bytes::from_static(br#"{"sourceZoneId":"a","targetZoneId":"b"}"#)).unwrap();
        assert_eq!(req.validate().unwrap(), ("a".to_string(), "b".to_string()));

        let err = parse_body::<ZoneRequest>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }
}
