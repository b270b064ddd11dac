use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{clamp_limit, Store};
use crate::error::StoreError;
use crate::models::{Stream, StreamId, StreamWithAggregates};

impl Store {
    /// Atomic find-or-create on `(server_seed_hashed, client_seed)`. A
    /// concurrent insert racing this one loses the `INSERT OR IGNORE` and
    /// the subsequent `SELECT` picks up the winner's row - a "re-select
    /// on conflict" loop, bounded to a handful of retries since the row
    /// is guaranteed to exist after the first
    /// writer commits.
    pub fn find_or_create_stream(
        &self,
        server_seed_hashed: &str,
        client_seed: &str,
    ) -> Result<StreamId, StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        for _ in 0..8 {
            conn.execute(
                "INSERT OR IGNORE INTO streams \
                 (server_seed_hashed, client_seed, created_at, last_seen_at, notes, last_observed_nonce) \
                 VALUES (?1, ?2, ?3, ?3, '', 0)",
                params![server_seed_hashed, client_seed, now],
            )?;

            let found: Option<StreamId> = conn
                .query_row(
                    "SELECT id FROM streams WHERE server_seed_hashed = ?1 AND client_seed = ?2",
                    params![server_seed_hashed, client_seed],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = found {
                return Ok(id);
            }
        }

        Err(StoreError::InvalidArgument(
            "failed to resolve stream id after bounded retries".to_string(),
        ))
    }

    /// Sets `lastObservedNonce := max(current, nonce)`, refreshing
    /// `lastObservedAt` only when the nonce actually advanced, and always
    /// refreshing `lastSeenAt`.
    pub fn update_last_observed(&self, stream_id: StreamId, nonce: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        let changed = conn.execute(
            "UPDATE streams SET \
               last_observed_at = CASE WHEN ?2 > last_observed_nonce THEN ?3 ELSE last_observed_at END, \
               last_observed_nonce = MAX(last_observed_nonce, ?2), \
               last_seen_at = ?3 \
             WHERE id = ?1",
            params![stream_id, nonce, now],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("stream {stream_id}")));
        }
        Ok(())
    }

    /// Refreshes `lastSeenAt` only, used after an accepted bet.
    pub fn touch_last_seen(&self, stream_id: StreamId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE streams SET last_seen_at = ?2 WHERE id = ?1",
            params![stream_id, now],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("stream {stream_id}")));
        }
        Ok(())
    }

    /// Existence check used by every other stream-scoped read/write so it
    /// can answer `not_found` for a well-formed but unknown id rather than
    /// silently returning an empty page, per spec.md §4.6.
    pub fn stream_exists(&self, id: StreamId) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let exists = conn
            .prepare("SELECT 1 FROM streams WHERE id = ?1")?
            .exists(params![id])?;
        Ok(exists)
    }

    pub fn get_stream(&self, id: StreamId) -> Result<StreamWithAggregates, StoreError> {
        let conn = self.conn.lock();

        let stream = conn
            .query_row(
                "SELECT id, server_seed_hashed, client_seed, created_at, last_seen_at, \
                        notes, last_observed_nonce, last_observed_at \
                 FROM streams WHERE id = ?1",
                params![id],
                row_to_stream,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("stream {id}")))?;

        let total_bets: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bets WHERE stream_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        let highest_result: f64 = conn.query_row(
            "SELECT COALESCE(MAX(round_result), 0.0) FROM bets WHERE stream_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        Ok(StreamWithAggregates {
            stream,
            total_bets,
            highest_result,
        })
    }

    /// Ordered by `lastSeenAt` descending; `limit` clamped to `[1, 500]`
    /// with default 100.
    pub fn list_streams(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Stream>, StoreError> {
        let limit = clamp_limit(limit, 100, 500);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, server_seed_hashed, client_seed, created_at, last_seen_at, \
                    notes, last_observed_nonce, last_observed_at \
             FROM streams ORDER BY last_seen_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], row_to_stream)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Last-write-wins; the UI may apply this optimistically.
    pub fn update_notes(&self, id: StreamId, notes: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE streams SET notes = ?2 WHERE id = ?1",
            params![id, notes],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("stream {id}")));
        }
        Ok(())
    }

    /// Destroys the stream and every child row atomically (`ON DELETE
    /// CASCADE` on rounds/bets); never optimistic.
    pub fn delete_stream(&self, id: StreamId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM streams WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("stream {id}")));
        }
        Ok(())
    }
}

fn row_to_stream(row: &rusqlite::Row) -> rusqlite::Result<Stream> {
    let created_at: String = row.get(3)?;
    let last_seen_at: String = row.get(4)?;
    let last_observed_at: Option<String> = row.get(7)?;

    Ok(Stream {
        id: row.get(0)?,
        server_seed_hashed: row.get(1)?,
        client_seed: row.get(2)?,
        created_at: parse_ts(&created_at),
        last_seen_at: parse_ts(&last_seen_at),
        notes: row.get(5)?,
        last_observed_nonce: row.get(6)?,
        last_observed_at: last_observed_at.map(|s| parse_ts(&s)),
    })
}

pub(crate) fn parse_ts(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
