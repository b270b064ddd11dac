use chrono::Utc;
use rusqlite::params;

use super::streams::parse_ts;
use super::{clamp_limit, Store};
use crate::error::StoreError;
use crate::models::{Round, StreamId};

impl Store {
    /// Idempotent on `(streamId, nonce)`; overwrites `roundResult` and
    /// `receivedAt` on conflict. Never touches stream aggregates itself -
    /// the classifier calls `updateLastObserved` separately.
    pub fn insert_round(
        &self,
        stream_id: StreamId,
        nonce: i64,
        round_result: f64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO rounds (stream_id, nonce, round_result, received_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(stream_id, nonce) DO UPDATE SET \
               round_result = excluded.round_result, \
               received_at = excluded.received_at",
            params![stream_id, nonce, round_result, now],
        )?;
        Ok(())
    }

    /// Same shape as `listBets`, ordered by `nonce` descending for UI
    /// paging.
    pub fn list_rounds(
        &self,
        stream_id: StreamId,
        min_result: Option<f64>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<(Vec<Round>, i64), StoreError> {
        let limit = clamp_limit(limit, 500, 10_000);
        let conn = self.conn.lock();
        let min_result = min_result.unwrap_or(f64::MIN);

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM rounds WHERE stream_id = ?1 AND round_result >= ?2",
            params![stream_id, min_result],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT stream_id, nonce, round_result, received_at FROM rounds \
             WHERE stream_id = ?1 AND round_result >= ?2 \
             ORDER BY nonce DESC LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
            .query_map(
                params![stream_id, min_result, limit as i64, offset as i64],
                row_to_round,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    }

    /// Returns rounds with `nonce > sinceNonce` ascending; the only
    /// round query used during live updates.
    pub fn tail_rounds(
        &self,
        stream_id: StreamId,
        since_nonce: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Round>, StoreError> {
        let limit = clamp_limit(limit, 1000, 5000);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT stream_id, nonce, round_result, received_at FROM rounds \
             WHERE stream_id = ?1 AND nonce > ?2 \
             ORDER BY nonce ASC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![stream_id, since_nonce, limit as i64], row_to_round)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Ordered by `nonce` descending; default 200, ceiling >= 20000 since
    /// the analytics engine needs thousands of rounds.
    pub fn get_recent_rounds(
        &self,
        stream_id: StreamId,
        limit: Option<usize>,
    ) -> Result<Vec<Round>, StoreError> {
        let limit = clamp_limit(limit, 200, 50_000);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT stream_id, nonce, round_result, received_at FROM rounds \
             WHERE stream_id = ?1 ORDER BY nonce DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![stream_id, limit as i64], row_to_round)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Retains the N rounds with the highest nonces; deletes the rest.
    /// Bets are never pruned by retention. Returns the
    /// number of rows deleted.
    pub fn cleanup_old_rounds(
        &self,
        stream_id: StreamId,
        keep_last_n: usize,
    ) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM rounds WHERE stream_id = ?1 AND nonce NOT IN ( \
               SELECT nonce FROM rounds WHERE stream_id = ?1 \
               ORDER BY nonce DESC LIMIT ?2 \
             )",
            params![stream_id, keep_last_n as i64],
        )?;
        Ok(deleted)
    }
}

fn row_to_round(row: &rusqlite::Row) -> rusqlite::Result<Round> {
    let received_at: String = row.get(3)?;
    Ok(Round {
        stream_id: row.get(0)?,
        nonce: row.get(1)?,
        round_result: row.get(2)?,
        received_at: parse_ts(&received_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_round_overwrites_on_conflict() {
        let store = Store::open_in_memory().unwrap();
        let id = store.find_or_create_stream("h", "c").unwrap();

        store.insert_round(id, 5, 1.5).unwrap();
        store.insert_round(id, 5, 9.9).unwrap();

        let rounds = store.get_recent_rounds(id, None).unwrap();
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].round_result, 9.9);
    }

    #[test]
    fn tail_rounds_returns_ascending_after_cursor() {
        let store = Store::open_in_memory().unwrap();
        let id = store.find_or_create_stream("h", "c").unwrap();
        for n in 1..=10 {
            store.insert_round(id, n, n as f64).unwrap();
        }

        let tailed = store.tail_rounds(id, 7, None).unwrap();
        let nonces: Vec<i64> = tailed.iter().map(|r| r.nonce).collect();
        assert_eq!(nonces, vec![8, 9, 10]);
    }

    #[test]
    fn cleanup_old_rounds_keeps_highest_n() {
        let store = Store::open_in_memory().unwrap();
        let id = store.find_or_create_stream("h", "c").unwrap();
        for n in 1..=60 {
            store.insert_round(id, n, n as f64).unwrap();
        }

        let deleted = store.cleanup_old_rounds(id, 50).unwrap();
        assert_eq!(deleted, 10);

        let remaining = store.tail_rounds(id, 0, Some(100)).unwrap();
        let nonces: Vec<i64> = remaining.iter().map(|r| r.nonce).collect();
        let expected: Vec<i64> = (11..=60).collect();
        assert_eq!(nonces, expected);

        let tail = store.tail_rounds(id, 50, Some(100)).unwrap();
        let tail_nonces: Vec<i64> = tail.iter().map(|r| r.nonce).collect();
        assert_eq!(tail_nonces, (51..=60).collect::<Vec<_>>());
    }
}
