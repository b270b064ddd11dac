//! Turns a validated ingest payload into a durable row and the matching
//! event bus publication.

use chrono::{DateTime, Utc};

use crate::app_state::AppState;
use crate::error::IngestError;
use crate::events::ConnectionState;
use crate::models::{BetAcceptance, BetSource, StreamId};
use crate::store::BetInput;

/// Validated heartbeat fields, post field-range checks.
#[derive(Debug, Clone)]
pub struct HeartbeatObservation {
    pub server_seed_hashed: String,
    pub client_seed: String,
    pub nonce: i64,
    pub round_result: f64,
}

/// Validated bet fields, post field-range checks.
#[derive(Debug, Clone)]
pub struct BetObservation {
    pub server_seed_hashed: String,
    pub client_seed: String,
    pub external_bet_id: String,
    pub date_time: DateTime<Utc>,
    pub nonce: i64,
    pub amount: f64,
    pub payout: f64,
    pub difficulty: String,
    pub round_target: Option<f64>,
    pub round_result: f64,
}

fn validate_nonce(nonce: i64) -> Result<i64, IngestError> {
    if nonce <= 0 {
        return Err(IngestError::Validation(
            "nonce must be a positive integer".to_string(),
        ));
    }
    Ok(nonce)
}

fn validate_round_result(value: f64) -> Result<f64, IngestError> {
    if !value.is_finite() || value < 0.0 {
        return Err(IngestError::Validation(
            "roundResult must be a finite non-negative number".to_string(),
        ));
    }
    Ok(value)
}

fn validate_non_negative(value: f64, field: &str) -> Result<f64, IngestError> {
    if !value.is_finite() || value < 0.0 {
        return Err(IngestError::Validation(format!(
            "{field} must be a finite non-negative number"
        )));
    }
    Ok(value)
}

fn validate_non_empty(value: &str, field: &str) -> Result<(), IngestError> {
    if value.is_empty() {
        return Err(IngestError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Step 1 of the classifier algorithm: field validation, never synthesizing
/// a missing timestamp.
pub fn validate_heartbeat(
    server_seed_hashed: String,
    client_seed: String,
    nonce: i64,
    round_result: f64,
) -> Result<HeartbeatObservation, IngestError> {
    validate_non_empty(&server_seed_hashed, "serverSeedHashed")?;
    validate_non_empty(&client_seed, "clientSeed")?;
    let nonce = validate_nonce(nonce)?;
    let round_result = validate_round_result(round_result)?;

    Ok(HeartbeatObservation {
        server_seed_hashed,
        client_seed,
        nonce,
        round_result,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn validate_bet(
    server_seed_hashed: String,
    client_seed: String,
    external_bet_id: String,
    date_time: Option<DateTime<Utc>>,
    nonce: i64,
    amount: f64,
    payout: f64,
    difficulty: String,
    round_target: Option<f64>,
    round_result: f64,
) -> Result<BetObservation, IngestError> {
    validate_non_empty(&server_seed_hashed, "serverSeedHashed")?;
    validate_non_empty(&client_seed, "clientSeed")?;
    validate_non_empty(&external_bet_id, "id")?;
    let nonce = validate_nonce(nonce)?;
    let amount = validate_non_negative(amount, "amount")?;
    let payout = validate_non_negative(payout, "payout")?;
    let round_result = validate_round_result(round_result)?;
    if let Some(target) = round_target {
        validate_non_negative(target, "roundTarget")?;
    }

    // dateTime must be parseable; missing is a validation failure, never
    // synthesized from wall-clock time.
    let date_time = date_time.ok_or_else(|| {
        IngestError::Validation("dateTime is missing or unparseable".to_string())
    })?;

    Ok(BetObservation {
        server_seed_hashed,
        client_seed,
        external_bet_id,
        date_time,
        nonce,
        amount,
        payout,
        difficulty: difficulty.to_lowercase(),
        round_target,
        round_result,
    })
}

/// Resolves the stream, writes the round, advances `lastObservedNonce`,
/// and publishes `tick`.
pub fn classify_heartbeat(
    state: &AppState,
    observation: HeartbeatObservation,
) -> Result<StreamId, IngestError> {
    let stream_id = state
        .store
        .find_or_create_stream(&observation.server_seed_hashed, &observation.client_seed)?;

    state
        .store
        .insert_round(stream_id, observation.nonce, observation.round_result)?;
    state.store.update_last_observed(stream_id, observation.nonce)?;

    state
        .events
        .publish_tick(stream_id, observation.nonce, observation.round_result);

    Ok(stream_id)
}

/// Resolves the stream, inserts the bet (idempotent on duplicate), and
/// publishes `newrows` only when genuinely accepted.
pub fn classify_bet(
    state: &AppState,
    observation: BetObservation,
) -> Result<(StreamId, BetAcceptance), IngestError> {
    let stream_id = state
        .store
        .find_or_create_stream(&observation.server_seed_hashed, &observation.client_seed)?;

    let input = BetInput {
        external_bet_id: observation.external_bet_id,
        source: BetSource::Ingest,
        script_hash: String::new(),
        session_id: String::new(),
        date_time: observation.date_time,
        nonce: observation.nonce,
        amount: observation.amount,
        payout: observation.payout,
        difficulty: observation.difficulty,
        round_target: observation.round_target,
        round_result: observation.round_result,
    };

    let acceptance = state.store.insert_bet(stream_id, &input)?;

    if acceptance.accepted {
        state.store.touch_last_seen(stream_id)?;
        state.events.publish_new_rows(stream_id, None);
    }

    Ok((stream_id, acceptance))
}

/// Emits a `status` signal for a stream; called by `ws::handle_socket` on
/// connect/disconnect.
pub fn publish_connection_state(state: &AppState, stream_id: StreamId, connected: bool) {
    let signal = if connected {
        ConnectionState::Connected
    } else {
        ConnectionState::Disconnected
    };
    state.events.publish_status(stream_id, signal);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_heartbeat_rejects_non_positive_nonce() {
        let err = validate_heartbeat("h".into(), "c".into(), 0, 1.0).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn validate_heartbeat_rejects_non_finite_result() {
        let err = validate_heartbeat("h".into(), "c".into(), 1, f64::NAN).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn validate_bet_requires_date_time() {
        let err = validate_bet(
            "h".into(),
            "c".into(),
            "ext".into(),
            None,
            1,
            1.0,
            2.0,
            "Expert".into(),
            None,
            2.0,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn validate_bet_lowercases_difficulty() {
        let bet = validate_bet(
            "h".into(),
            "c".into(),
            "ext".into(),
            Some(Utc::now()),
            1,
            1.0,
            2.0,
            "EXPERT".into(),
            Some(2.0),
            2.0,
        )
        .unwrap();
        assert_eq!(bet.difficulty, "expert");
    }

    #[test]
    fn classify_heartbeat_out_of_order_does_not_regress_last_observed() {
        use crate::config::Config;
        use crate::events::EventBus;
        use crate::store::Store;

        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(
            store,
            EventBus::new(8),
            Config {
                port: 0,
                ingest_token: None,
                database_path: std::path::PathBuf::new(),
                event_queue_capacity: 8,
            },
        );

        let high = validate_heartbeat("h".into(), "c".into(), 50, 1.0).unwrap();
        classify_heartbeat(&state, high).unwrap();

        let low = validate_heartbeat("h".into(), "c".into(), 10, 1.0).unwrap();
        let stream_id = classify_heartbeat(&state, low).unwrap();

        let stream = state.store.get_stream(stream_id).unwrap().stream;
        assert_eq!(stream.last_observed_nonce, 50);

        // the out-of-order round is still stored
        let rounds = state.store.get_recent_rounds(stream_id, None).unwrap();
        assert!(rounds.iter().any(|r| r.nonce == 10));
    }
}
