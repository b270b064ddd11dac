//! Wire shapes for `POST /live/ingest`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Deserialized manually in `handlers.rs` rather than via a tagged enum:
/// an unrecognized `type` needs to map to `unsupported_type`, not a
/// generic serde error, so the discriminator is inspected before the
/// matching payload shape is parsed.
#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    pub nonce: i64,
    #[serde(rename = "roundResult")]
    pub round_result: f64,
    #[serde(rename = "clientSeed")]
    pub client_seed: String,
    #[serde(rename = "serverSeedHashed")]
    pub server_seed_hashed: String,
}

#[derive(Debug, Deserialize)]
pub struct BetPayload {
    pub id: String,
    #[serde(rename = "dateTime")]
    pub date_time: Option<DateTime<Utc>>,
    pub nonce: i64,
    pub amount: f64,
    pub payout: f64,
    pub difficulty: String,
    #[serde(rename = "roundTarget")]
    pub round_target: Option<f64>,
    #[serde(rename = "roundResult")]
    pub round_result: f64,
    #[serde(rename = "clientSeed")]
    pub client_seed: String,
    #[serde(rename = "serverSeedHashed")]
    pub server_seed_hashed: String,
}
