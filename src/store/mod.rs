//! The embedded single-writer relational store.
//!
//! A single `rusqlite::Connection` behind a `parking_lot::Mutex`, the same
//! shape as `signals::db_storage::DbSignalStorage` and
//! `backtest_v2::artifact_store::ArtifactStore`: WAL journal mode lets
//! readers proceed concurrently with the writer, and the mutex is only
//! ever held for the duration of a single statement or transaction, never
//! across an `.await` point.

mod bets;
mod bot_sessions;
mod rounds;
mod schema;
mod seed_aliases;
mod streams;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::StoreError;

pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Reclaims space left by deleted rows (retention pruning, stream
    /// deletion) and rebuilds the file contiguously. Not run automatically -
    /// exposed for the `vacuum` CLI subcommand.
    pub fn vacuum(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

/// Clamp a caller-supplied limit to `[1, ceiling]`, substituting `default`
/// when the caller didn't specify one. Every paged/tailed read in this
/// module goes through this helper so the clamp ranges stay centralized.
pub(crate) fn clamp_limit(requested: Option<usize>, default: usize, ceiling: usize) -> usize {
    requested.unwrap_or(default).clamp(1, ceiling)
}

pub use bets::BetInput;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_uses_default_when_absent() {
        assert_eq!(clamp_limit(None, 100, 500), 100);
    }

    #[test]
    fn clamp_limit_clamps_to_ceiling() {
        assert_eq!(clamp_limit(Some(10_000), 100, 500), 500);
    }

    #[test]
    fn clamp_limit_clamps_to_floor() {
        assert_eq!(clamp_limit(Some(0), 100, 500), 1);
    }
}
