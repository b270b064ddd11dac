//! The loopback-only ingest HTTP surface.

mod handlers;
mod payload;

use axum::{middleware, routing::post, Router};

use crate::app_state::AppState;
use crate::middleware::{require_ingest_token, require_loopback};

/// Bodies above this cap are rejected as `payload_too_large`. Enforced
/// by `handlers::ingest` reading the body itself via `axum::body::to_bytes`
/// rather than through a `DefaultBodyLimit` layer: this route takes a raw
/// `Body` and never goes through one of axum's body-consuming extractors
/// (`Bytes`, `Json<T>`, ...), which is what `DefaultBodyLimit` actually
/// gates, so a layer here would never fire.
const MAX_INGEST_BODY_BYTES: usize = 256 * 1024;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/live/ingest", post(handlers::ingest))
        .layer(middleware::from_fn_with_state(
            state,
            require_ingest_token,
        ))
        .layer(middleware::from_fn(require_loopback))
}
