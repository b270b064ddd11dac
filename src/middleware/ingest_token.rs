//! Optional bearer-token enforcement on the ingest endpoint.
//!
//! Modeled on the shape of a JWT auth middleware, but there is no token
//! issuance here - just a single shared secret configured via
//! `LIVE_INGEST_TOKEN` compared against the `X-Ingest-Token` header. When
//! no secret is configured the header is not required at all.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::error::IngestError;

const INGEST_TOKEN_HEADER: &str = "x-ingest-token";

pub async fn require_ingest_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    match &state.config.ingest_token {
        None => next.run(request).await,
        Some(expected) => {
            let presented = headers
                .get(INGEST_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok());
            match presented {
                Some(token) if token == expected => next.run(request).await,
                _ => IngestError::Unauthorized.into_response(),
            }
        }
    }
}
