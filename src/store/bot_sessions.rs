use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::streams::parse_ts;
use super::{clamp_limit, Store};
use crate::error::StoreError;
use crate::models::{BotSession, BotSessionState};

impl Store {
    /// Allocates an opaque id rather than accepting one from the caller -
    /// a bot session is attribution metadata the ingest side never
    /// invents itself.
    pub fn create_bot_session(
        &self,
        game: &str,
        currency: &str,
        starting_balance: f64,
        script_hash: &str,
        script_source: &str,
    ) -> Result<BotSession, StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO bot_sessions \
             (id, started_at, ended_at, game, currency, starting_balance, ending_balance, \
              script_hash, script_source, state, updated_at) \
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, NULL, ?6, ?7, ?8, ?2)",
            params![
                id,
                now,
                game,
                currency,
                starting_balance,
                script_hash,
                script_source,
                BotSessionState::Running.as_str(),
            ],
        )?;

        self.get_bot_session(&id)
    }

    pub fn get_bot_session(&self, id: &str) -> Result<BotSession, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, started_at, ended_at, game, currency, starting_balance, \
                    ending_balance, script_hash, script_source, state \
             FROM bot_sessions WHERE id = ?1",
            params![id],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("bot session {id}")))
    }

    /// Ordered by `startedAt` descending; `limit` clamps to `[1, 500]`,
    /// default 100.
    pub fn list_bot_sessions(&self, limit: Option<usize>) -> Result<Vec<BotSession>, StoreError> {
        let limit = clamp_limit(limit, 100, 500);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, started_at, ended_at, game, currency, starting_balance, \
                    ending_balance, script_hash, script_source, state \
             FROM bot_sessions ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Transitions state and, for terminal states, stamps `endedAt` and
    /// `endingBalance`. `updatedAt` always advances (schema v2
    /// supplement).
    pub fn update_bot_session_state(
        &self,
        id: &str,
        state: BotSessionState,
        ending_balance: Option<f64>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        let ended_at = matches!(
            state,
            BotSessionState::Stopped | BotSessionState::Error | BotSessionState::Completed
        )
        .then(|| now.clone());

        let changed = conn.execute(
            "UPDATE bot_sessions SET \
               state = ?2, \
               updated_at = ?3, \
               ended_at = COALESCE(?4, ended_at), \
               ending_balance = COALESCE(?5, ending_balance) \
             WHERE id = ?1",
            params![id, state.as_str(), now, ended_at, ending_balance],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("bot session {id}")));
        }
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<BotSession> {
    let started_at: String = row.get(1)?;
    let ended_at: Option<String> = row.get(2)?;
    let state: String = row.get(9)?;

    Ok(BotSession {
        id: row.get(0)?,
        started_at: parse_ts(&started_at),
        ended_at: ended_at.map(|s| parse_ts(&s)),
        game: row.get(3)?,
        currency: row.get(4)?,
        starting_balance: row.get(5)?,
        ending_balance: row.get(6)?,
        script_hash: row.get(7)?,
        script_source: row.get(8)?,
        state: BotSessionState::parse(&state).unwrap_or(BotSessionState::Error),
    })
}
