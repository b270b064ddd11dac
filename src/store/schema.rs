//! Schema definition and additive migrations.
//!
//! Modeled on `backtest_v2::artifact_store::ArtifactStore`: a
//! `schema_version` table holds a single row; `initialize` walks forward
//! from whatever version it finds, applying one `ALTER TABLE` step at a
//! time, until the database is at `SCHEMA_VERSION`. Every step only adds
//! columns or tables with `DEFAULT` values, so re-opening an up-to-date
//! database is always a no-op and no existing row is ever rewritten.
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

/// Schema version history:
/// - v1: streams, rounds, bets, seed_aliases, bot_sessions
/// - v2: bot_sessions.updated_at (bumped on every state transition)
pub const SCHEMA_VERSION: u32 = 2;

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA cache_size = -16000;
PRAGMA temp_store = MEMORY;
"#;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS streams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_seed_hashed TEXT NOT NULL,
    client_seed TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    last_observed_nonce INTEGER NOT NULL DEFAULT 0,
    last_observed_at TEXT,
    UNIQUE(server_seed_hashed, client_seed)
);

CREATE INDEX IF NOT EXISTS idx_streams_last_seen ON streams(last_seen_at DESC);

CREATE TABLE IF NOT EXISTS rounds (
    stream_id INTEGER NOT NULL REFERENCES streams(id) ON DELETE CASCADE,
    nonce INTEGER NOT NULL,
    round_result REAL NOT NULL,
    received_at TEXT NOT NULL,
    PRIMARY KEY (stream_id, nonce)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_rounds_stream_result ON rounds(stream_id, round_result);

CREATE TABLE IF NOT EXISTS bets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stream_id INTEGER NOT NULL REFERENCES streams(id) ON DELETE CASCADE,
    external_bet_id TEXT NOT NULL,
    source TEXT NOT NULL,
    script_hash TEXT NOT NULL DEFAULT '',
    session_id TEXT NOT NULL DEFAULT '',
    received_at TEXT NOT NULL,
    date_time TEXT NOT NULL,
    nonce INTEGER NOT NULL,
    amount REAL NOT NULL,
    payout REAL NOT NULL,
    difficulty TEXT NOT NULL DEFAULT '',
    round_target REAL,
    round_result REAL NOT NULL,
    UNIQUE(stream_id, external_bet_id)
);

CREATE INDEX IF NOT EXISTS idx_bets_stream_id ON bets(stream_id, id);
CREATE INDEX IF NOT EXISTS idx_bets_stream_nonce ON bets(stream_id, nonce);
CREATE INDEX IF NOT EXISTS idx_bets_stream_result ON bets(stream_id, round_result);

CREATE TABLE IF NOT EXISTS seed_aliases (
    server_seed_hashed TEXT PRIMARY KEY,
    server_seed_plain TEXT,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS bot_sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    game TEXT NOT NULL,
    currency TEXT NOT NULL,
    starting_balance REAL NOT NULL,
    ending_balance REAL,
    script_hash TEXT NOT NULL DEFAULT '',
    script_source TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL
) WITHOUT ROWID;
"#;

pub fn initialize(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(PRAGMAS)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        [],
    )?;

    let current: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    let mut version = match current {
        None => {
            conn.execute_batch(SCHEMA_V1)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (1)",
                [],
            )?;
            info!("created schema at v1");
            1
        }
        Some(v) => v,
    };

    if version < 2 {
        migrate_v1_to_v2(conn)?;
        version = 2;
    }

    conn.execute("UPDATE schema_version SET version = ?1", [version])?;
    info!(version, "schema up to date");
    Ok(())
}

/// v1 -> v2: bot_sessions gains `updated_at`, bumped on every state
/// transition.
fn migrate_v1_to_v2(conn: &Connection) -> Result<(), StoreError> {
    let has_column: bool = conn
        .prepare("SELECT 1 FROM pragma_table_info('bot_sessions') WHERE name = 'updated_at'")?
        .exists([])?;

    if !has_column {
        conn.execute_batch(
            "ALTER TABLE bot_sessions ADD COLUMN updated_at TEXT NOT NULL DEFAULT '1970-01-01T00:00:00Z';",
        )?;
        info!("migrated schema v1 -> v2 (bot_sessions.updated_at)");
    }
    Ok(())
}
