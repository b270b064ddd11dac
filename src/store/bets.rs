use chrono::{DateTime, Utc};
use rusqlite::params;

use super::streams::parse_ts;
use super::{clamp_limit, Store};
use crate::error::StoreError;
use crate::models::{Bet, BetAcceptance, BetSource, SortOrder, StreamId};

/// Everything `insertBet` needs beyond the stream it resolved to
///. `received_at` is not part of the input - it is
/// stamped by the store at insert time.
#[derive(Debug, Clone)]
pub struct BetInput {
    pub external_bet_id: String,
    pub source: BetSource,
    pub script_hash: String,
    pub session_id: String,
    pub date_time: DateTime<Utc>,
    pub nonce: i64,
    pub amount: f64,
    pub payout: f64,
    pub difficulty: String,
    pub round_target: Option<f64>,
    pub round_result: f64,
}

impl Store {
    /// Keyed by `(streamId, externalBetId)`; a repeat is rejected as a
    /// duplicate rather than overwritten, unlike `insertRound`. Returns
    /// the acceptance outcome rather than an error so the
    /// ingest handler can report `{accepted:false,reason:"duplicate"}`
    /// as a 200, not a failure.
    pub fn insert_bet(
        &self,
        stream_id: StreamId,
        input: &BetInput,
    ) -> Result<BetAcceptance, StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        let changed = conn.execute(
            "INSERT OR IGNORE INTO bets \
             (stream_id, external_bet_id, source, script_hash, session_id, \
              received_at, date_time, nonce, amount, payout, difficulty, \
              round_target, round_result) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                stream_id,
                input.external_bet_id,
                input.source.as_str(),
                input.script_hash,
                input.session_id,
                now,
                input.date_time.to_rfc3339(),
                input.nonce,
                input.amount,
                input.payout,
                input.difficulty,
                input.round_target,
                input.round_result,
            ],
        )?;

        if changed == 0 {
            return Ok(BetAcceptance::duplicate());
        }
        Ok(BetAcceptance::accepted())
    }

    /// Offset pagination ordered by `id`; `order` controls direction and
    /// `minResult`, when given, filters to `roundResult >= minResult`
    ///. `limit` clamps to `[1, 10000]`, default 500.
    pub fn list_bets(
        &self,
        stream_id: StreamId,
        min_result: Option<f64>,
        limit: Option<usize>,
        offset: usize,
        order: SortOrder,
    ) -> Result<(Vec<Bet>, i64), StoreError> {
        let limit = clamp_limit(limit, 500, 10_000);
        let conn = self.conn.lock();
        let min_result = min_result.unwrap_or(f64::MIN);

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bets WHERE stream_id = ?1 AND round_result >= ?2",
            params![stream_id, min_result],
            |row| row.get(0),
        )?;

        let query = match order {
            SortOrder::Asc => {
                "SELECT id, stream_id, external_bet_id, source, script_hash, session_id, \
                        received_at, date_time, nonce, amount, payout, difficulty, \
                        round_target, round_result \
                 FROM bets WHERE stream_id = ?1 AND round_result >= ?2 \
                 ORDER BY id ASC LIMIT ?3 OFFSET ?4"
            }
            SortOrder::Desc => {
                "SELECT id, stream_id, external_bet_id, source, script_hash, session_id, \
                        received_at, date_time, nonce, amount, payout, difficulty, \
                        round_target, round_result \
                 FROM bets WHERE stream_id = ?1 AND round_result >= ?2 \
                 ORDER BY id DESC LIMIT ?3 OFFSET ?4"
            }
        };

        let mut stmt = conn.prepare(query)?;
        let rows = stmt
            .query_map(
                params![stream_id, min_result, limit as i64, offset as i64],
                row_to_bet,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, total))
    }

    /// Returns bets with `id > sinceId` ascending, the cursor live
    /// clients poll with. `limit` clamps to `[1, 5000]`,
    /// default 1000.
    pub fn tail_bets(
        &self,
        stream_id: StreamId,
        since_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Bet>, StoreError> {
        let limit = clamp_limit(limit, 1000, 5000);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, stream_id, external_bet_id, source, script_hash, session_id, \
                    received_at, date_time, nonce, amount, payout, difficulty, \
                    round_target, round_result \
             FROM bets WHERE stream_id = ?1 AND id > ?2 ORDER BY id ASC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![stream_id, since_id, limit as i64], row_to_bet)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every bet for a stream, ascending by `nonce` - the order CSV
    /// export wants, distinct from the ascending-`id` order `tailBets`
    /// uses for live reconciliation. Calls `f` once per row as the
    /// `rusqlite` cursor yields it, with no limit and no intermediate
    /// `Vec`, so a caller writing each row straight through (CSV export)
    /// stays memory-bounded regardless of stream length.
    pub fn for_each_bet_by_nonce<F>(&self, stream_id: StreamId, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&Bet) -> Result<(), StoreError>,
    {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, stream_id, external_bet_id, source, script_hash, session_id, \
                    received_at, date_time, nonce, amount, payout, difficulty, \
                    round_target, round_result \
             FROM bets WHERE stream_id = ?1 ORDER BY nonce ASC",
        )?;
        let mut rows = stmt.query(params![stream_id])?;
        while let Some(row) = rows.next()? {
            let bet = row_to_bet(row)?;
            f(&bet)?;
        }
        Ok(())
    }
}

fn row_to_bet(row: &rusqlite::Row) -> rusqlite::Result<Bet> {
    let source: String = row.get(3)?;
    let received_at: String = row.get(6)?;
    let date_time: String = row.get(7)?;

    Ok(Bet {
        id: row.get(0)?,
        stream_id: row.get(1)?,
        external_bet_id: row.get(2)?,
        source: BetSource::parse(&source),
        script_hash: row.get(4)?,
        session_id: row.get(5)?,
        received_at: parse_ts(&received_at),
        date_time: parse_ts(&date_time),
        nonce: row.get(8)?,
        amount: row.get(9)?,
        payout: row.get(10)?,
        difficulty: row.get(11)?,
        round_target: row.get(12)?,
        round_result: row.get(13)?,
    })
}
