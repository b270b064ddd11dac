//! Domain types for streams, rounds, bets, seed aliases, and bot sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type StreamId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub server_seed_hashed: String,
    pub client_seed: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub notes: String,
    pub last_observed_nonce: i64,
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// `getStream` aggregates computed on read, per spec.md §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamWithAggregates {
    #[serde(flatten)]
    pub stream: Stream,
    pub total_bets: i64,
    pub highest_result: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub stream_id: StreamId,
    pub nonce: i64,
    pub round_result: f64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetSource {
    Ingest,
    Bot,
}

impl BetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "bot" => Self::Bot,
            _ => Self::Ingest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    /// Monotonically assigned rowid; the cursor used by `tailBets`.
    pub id: i64,
    pub stream_id: StreamId,
    pub external_bet_id: String,
    pub source: BetSource,
    pub script_hash: String,
    pub session_id: String,
    pub received_at: DateTime<Utc>,
    pub date_time: DateTime<Utc>,
    pub nonce: i64,
    pub amount: f64,
    pub payout: f64,
    pub difficulty: String,
    pub round_target: Option<f64>,
    pub round_result: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlias {
    pub server_seed_hashed: String,
    pub server_seed_plain: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotSessionState {
    Running,
    Stopped,
    Error,
    Completed,
}

impl BotSessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub game: String,
    pub currency: String,
    pub starting_balance: f64,
    pub ending_balance: Option<f64>,
    pub script_hash: String,
    pub script_source: String,
    pub state: BotSessionState,
}

/// Offset-pagination sort order for `listBets` / `listRounds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Result of `insertBet`, per spec.md §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetAcceptance {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BetAcceptance {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            accepted: false,
            reason: Some("duplicate".to_string()),
        }
    }
}
