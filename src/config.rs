//! Environment-driven configuration, in the style of the teacher's
//! `Config::from_env` / `resolve_data_path`.

use std::path::{Path, PathBuf};

/// The two environment variables the ingest server recognizes, plus the
/// database path resolution spec.md §6 requires.
#[derive(Debug, Clone)]
pub struct Config {
    /// `LIVE_INGEST_PORT`, default 17888.
    pub port: u16,
    /// `LIVE_INGEST_TOKEN`; when empty, the token header is not required.
    pub ingest_token: Option<String>,
    /// Resolved path to the sqlite database file.
    pub database_path: PathBuf,
    /// Bound for the per-subscriber event queue.
    pub event_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        load_dotenv();

        let port = std::env::var("LIVE_INGEST_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(17888);

        let ingest_token = std::env::var("LIVE_INGEST_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let database_path = resolve_database_path()?;

        let event_queue_capacity = std::env::var("LIVE_EVENT_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(128);

        Ok(Self {
            port,
            ingest_token,
            database_path,
            event_queue_capacity,
        })
    }
}

/// Standard dotenv search (cwd + parents), mirroring the teacher's `load_env`.
fn load_dotenv() {
    let _ = dotenv::dotenv();
}

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "stake-pf";
const APP_NAME: &str = "live-core";
const DB_FILENAME: &str = "live.sqlite3";
const LEGACY_DB_FILENAME: &str = "pump_expert_live.sqlite3";

/// Resolves the canonical database path under the OS-appropriate per-user
/// config directory, honoring an explicit override, and performs the
/// one-shot legacy-path migration described in spec.md §6/§9.
fn resolve_database_path() -> anyhow::Result<PathBuf> {
    if let Ok(explicit) = std::env::var("LIVE_DB_PATH") {
        if !explicit.trim().is_empty() {
            return Ok(PathBuf::from(explicit));
        }
    }

    let base = dirs::config_dir()
        .map(|d| d.join(APP_ORG).join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(format!("{APP_QUALIFIER}.{APP_ORG}.{APP_NAME}")));

    std::fs::create_dir_all(&base)?;
    let canonical = base.join(DB_FILENAME);

    migrate_legacy_db_path(&canonical, &base.join(LEGACY_DB_FILENAME))?;

    Ok(canonical)
}

/// If `canonical` does not exist but `legacy` does, move it into place.
/// Idempotent: a repeat call with `canonical` already present is a no-op.
fn migrate_legacy_db_path(canonical: &Path, legacy: &Path) -> anyhow::Result<()> {
    if !canonical.exists() && legacy.exists() {
        std::fs::rename(legacy, canonical)?;
        tracing::info!(
            from = %legacy.display(),
            to = %canonical.display(),
            "migrated legacy database path"
        );
    }
    Ok(())
}
