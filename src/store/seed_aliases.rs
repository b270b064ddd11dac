use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::streams::parse_ts;
use super::Store;
use crate::error::StoreError;
use crate::models::SeedAlias;

impl Store {
    /// Upserts the hashed->plain mapping. `serverSeedPlain` may arrive
    /// later than the hash itself (a round often reveals the hash long
    /// before the seed is rotated out), so a second call with `Some(..)`
    /// always wins over a prior `None`.
    pub fn upsert_seed_alias(
        &self,
        server_seed_hashed: &str,
        server_seed_plain: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO seed_aliases \
             (server_seed_hashed, server_seed_plain, first_seen_at, last_seen_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(server_seed_hashed) DO UPDATE SET \
               server_seed_plain = COALESCE(excluded.server_seed_plain, seed_aliases.server_seed_plain), \
               last_seen_at = excluded.last_seen_at",
            params![server_seed_hashed, server_seed_plain, now],
        )?;
        Ok(())
    }

    pub fn get_seed_alias(&self, server_seed_hashed: &str) -> Result<SeedAlias, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT server_seed_hashed, server_seed_plain, first_seen_at, last_seen_at \
             FROM seed_aliases WHERE server_seed_hashed = ?1",
            params![server_seed_hashed],
            row_to_alias,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("seed alias {server_seed_hashed}")))
    }
}

fn row_to_alias(row: &rusqlite::Row) -> rusqlite::Result<SeedAlias> {
    let first_seen_at: String = row.get(2)?;
    let last_seen_at: String = row.get(3)?;
    Ok(SeedAlias {
        server_seed_hashed: row.get(0)?,
        server_seed_plain: row.get(1)?,
        first_seen_at: parse_ts(&first_seen_at),
        last_seen_at: parse_ts(&last_seen_at),
    })
}
