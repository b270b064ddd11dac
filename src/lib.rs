//! The ingest/classify/store/query/analytics core for a single-user
//! provable-fairness telemetry pipeline.
//!
//! The binary (`src/main.rs`) wires these modules into an axum server and
//! a small CLI; everything here is usable standalone for tests and for
//! the `export-csv`/`vacuum` subcommands, which touch the store directly
//! without starting the HTTP listener.

pub mod analytics;
pub mod app_state;
pub mod classifier;
pub mod config;
pub mod csv_export;
pub mod error;
pub mod events;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod query;
pub mod store;
pub mod ws;

use axum::routing::get;
use axum::{middleware as axum_middleware, Router};
use tower_http::cors::CorsLayer;

use app_state::AppState;

/// Assembles the full router: the ingest surface, the read-only query
/// API, and the per-stream event bus websocket bridge share one host and
/// port, with structured request logging wrapping all three.
/// `CorsLayer::permissive()` mirrors the teacher's own `main.rs`, which
/// needs it so its desktop webview frontend (a different origin than the
/// loopback listener) can call the API at all.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(ingest::router(state.clone()))
        .merge(query::router())
        .route("/live/ws/:stream_id", get(ws::stream_ws))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::request_logging))
        .layer(CorsLayer::permissive())
}
