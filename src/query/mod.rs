//! Read-only query API surface, sharing the same
//! `AppState` and router as the Ingest Server (same host, same port).

mod handlers;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/streams", get(handlers::list_streams))
        .route(
            "/streams/:id",
            get(handlers::get_stream).delete(handlers::delete_stream),
        )
        .route("/streams/:id/notes", patch(handlers::update_notes))
        .route("/streams/:id/bets", get(handlers::list_bets))
        .route("/streams/:id/bets/tail", get(handlers::tail_bets))
        .route("/streams/:id/bets/export.csv", get(handlers::export_csv))
        .route("/streams/:id/rounds", get(handlers::list_rounds))
        .route("/streams/:id/rounds/tail", get(handlers::tail_rounds))
        .route(
            "/streams/:id/rounds/recent",
            get(handlers::get_recent_rounds),
        )
        .route(
            "/streams/:id/seed-quality",
            get(handlers::get_seed_quality),
        )
        .route("/seed-aliases/:hash", get(handlers::get_seed_alias))
        .route("/seed-aliases", post(handlers::upsert_seed_alias))
}
