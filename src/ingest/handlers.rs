use axum::body::Body;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::classifier;
use crate::error::IngestError;

use super::payload::{BetPayload, HeartbeatPayload};
use super::MAX_INGEST_BODY_BYTES;

/// `POST /live/ingest`. Single route, two payload shapes discriminated by
/// `type`.
///
/// Reads the body by hand rather than through the `Json<Value>` extractor
/// so an oversized payload comes back as this crate's own
/// `{"error":"payload_too_large"}` envelope instead of axum's opaque
/// built-in rejection body.
pub async fn ingest(
    State(state): State<AppState>,
    body: Body,
) -> Result<impl IntoResponse, IngestError> {
    // `to_bytes`'s cap is the only enforcement of `MAX_INGEST_BODY_BYTES`
    // on this route - reading a raw `Body` by hand bypasses
    // `DefaultBodyLimit` entirely, which only gates axum's own
    // body-consuming extractors. Any error here is treated as
    // `payload_too_large` since that's overwhelmingly the only way
    // reading a loopback-only request body fails in practice.
    let bytes = axum::body::to_bytes(body, MAX_INGEST_BODY_BYTES)
        .await
        .map_err(|_| IngestError::PayloadTooLarge)?;

    let body: Value = serde_json::from_slice(&bytes)
        .map_err(|e| IngestError::Validation(e.to_string()))?;

    let kind = body
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::Validation("missing \"type\" field".to_string()))?;

    match kind {
        "heartbeat" => handle_heartbeat(&state, body).await,
        "bet" => handle_bet(&state, body).await,
        other => Err(IngestError::UnsupportedType(other.to_string())),
    }
}

async fn handle_heartbeat(
    state: &AppState,
    body: Value,
) -> Result<Json<Value>, IngestError> {
    let payload: HeartbeatPayload = serde_json::from_value(body)
        .map_err(|e| IngestError::Validation(e.to_string()))?;

    let observation = classifier::validate_heartbeat(
        payload.server_seed_hashed,
        payload.client_seed,
        payload.nonce,
        payload.round_result,
    )?;

    classifier::classify_heartbeat(state, observation)?;

    Ok(Json(json!({ "ok": true })))
}

async fn handle_bet(state: &AppState, body: Value) -> Result<Json<Value>, IngestError> {
    let payload: BetPayload =
        serde_json::from_value(body).map_err(|e| IngestError::Validation(e.to_string()))?;

    let observation = classifier::validate_bet(
        payload.server_seed_hashed,
        payload.client_seed,
        payload.id,
        payload.date_time,
        payload.nonce,
        payload.amount,
        payload.payout,
        payload.difficulty,
        payload.round_target,
        payload.round_result,
    )?;

    let (_, acceptance) = classifier::classify_bet(state, observation)?;

    Ok(Json(serde_json::to_value(acceptance).unwrap()))
}
