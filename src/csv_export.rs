//! Hand-rolled CSV writer for bet export.
//!
//! No `csv` crate: the header is fixed and the formatting rules (8
//! decimals for amount/payout, 2 for target/result, RFC-3339 with
//! nanoseconds) are simple enough that `std::io::Write` plus `format!`
//! is the whole implementation, matching SPEC_FULL.md's grounding note
//! that no repo in the corpus depends on a CSV crate.

use std::io::Write;

use crate::error::StoreError;
use crate::models::Bet;
use crate::store::Store;

pub const CSV_HEADER: &str =
    "id,nonce,date_time,amount,payout,difficulty,round_target,round_result,source,script_hash,session_id";

/// Escapes a field for CSV: wraps in quotes and doubles embedded quotes
/// only when the value actually needs it, avoiding noise on the common
/// case of plain tokens like `expert` or an external bet id.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_row<W: Write>(writer: &mut W, bet: &Bet) -> std::io::Result<()> {
    let round_target = bet
        .round_target
        .map(|v| format!("{v:.2}"))
        .unwrap_or_default();

    writeln!(
        writer,
        "{},{},{},{:.8},{:.8},{},{},{:.2},{},{},{}",
        csv_field(&bet.external_bet_id),
        bet.nonce,
        bet.date_time.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        bet.amount,
        bet.payout,
        csv_field(&bet.difficulty),
        round_target,
        bet.round_result,
        bet.source.as_str(),
        csv_field(&bet.script_hash),
        csv_field(&bet.session_id),
    )
}

/// Streams every bet for `stream_id` in ascending `nonce` order, one row
/// at a time off the `rusqlite` cursor - no intermediate `Vec` of the
/// whole history, so memory use stays flat regardless of stream length.
pub fn export_bets_csv<W: Write>(
    store: &Store,
    stream_id: crate::models::StreamId,
    writer: &mut W,
) -> Result<(), StoreError> {
    writeln!(writer, "{CSV_HEADER}").map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
    store.for_each_bet_by_nonce(stream_id, |bet| {
        write_row(writer, bet).map_err(|e| StoreError::InvalidArgument(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BetSource;
    use crate::store::BetInput;
    use chrono::Utc;

    #[test]
    fn export_emits_fixed_header_and_precision() {
        let store = Store::open_in_memory().unwrap();
        let id = store.find_or_create_stream("h", "c").unwrap();
        store
            .insert_bet(
                id,
                &BetInput {
                    external_bet_id: "ext-1".to_string(),
                    source: BetSource::Ingest,
                    script_hash: "".to_string(),
                    session_id: "".to_string(),
                    date_time: Utc::now(),
                    nonce: 1,
                    amount: 1.5,
                    payout: 3.0,
                    difficulty: "expert".to_string(),
                    round_target: Some(2.0),
                    round_result: 3.14159265,
                },
            )
            .unwrap();

        let mut buf = Vec::new();
        export_bets_csv(&store, id, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER);
        let row = lines.next().unwrap();
        assert!(row.contains("1.50000000"));
        assert!(row.contains("3.00000000"));
        assert!(row.contains("2.00"));
        assert!(row.contains("3.14"));
    }

    #[test]
    fn export_escapes_commas_in_free_text_fields() {
        let store = Store::open_in_memory().unwrap();
        let id = store.find_or_create_stream("h", "c").unwrap();
        store
            .insert_bet(
                id,
                &BetInput {
                    external_bet_id: "ext-1".to_string(),
                    source: BetSource::Ingest,
                    script_hash: "hash,with,commas".to_string(),
                    session_id: "".to_string(),
                    date_time: Utc::now(),
                    nonce: 1,
                    amount: 1.0,
                    payout: 1.0,
                    difficulty: "expert".to_string(),
                    round_target: None,
                    round_result: 1.0,
                },
            )
            .unwrap();

        let mut buf = Vec::new();
        export_bets_csv(&store, id, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"hash,with,commas\""));
    }
}
