//! Error taxonomy for the ingest/classify/store/query pipeline.
//!
//! Each layer gets its own enum rather than one crate-wide error type,
//! the way `backtest_v2::artifact_store::ArtifactStoreError` stays scoped
//! to its own store rather than reusing a generic error across the crate.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use uuid::Uuid;

/// Errors raised by the `Store`. Never constructed for conditions the
/// Store treats as ordinary outcomes (e.g. a duplicate bet is a return
/// value, not an error).
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    NotFound(String),
    InvalidArgument(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "storage error: {e}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// Errors surfaced by the ingest endpoint, one variant per taxonomy kind
/// from the ingest contract.
#[derive(Debug)]
pub enum IngestError {
    Validation(String),
    Unauthorized,
    PayloadTooLarge,
    UnsupportedType(String),
    NotFound(String),
    Internal(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation_error: {msg}"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::PayloadTooLarge => write!(f, "payload_too_large"),
            Self::UnsupportedType(t) => write!(f, "unsupported_type: {t}"),
            Self::NotFound(what) => write!(f, "not_found: {what}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::InvalidArgument(msg) => Self::Validation(msg),
            StoreError::Sqlite(err) => Self::Internal(err.to_string()),
        }
    }
}

impl IngestError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::PayloadTooLarge => "payload_too_large",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        // internal_error never leaks its cause to the client: the cause is
        // logged here instead, tagged with a request id the client can
        // quote back when asking for diagnostics, the same id/cause-log
        // shape `api::simple::post_trade_order` returns to its own callers.
        let (message, request_id) = if let Self::Internal(cause) = &self {
            let request_id = Uuid::new_v4().to_string();
            tracing::error!(request_id = %request_id, cause = %cause, "internal error");
            ("internal error".to_string(), Some(request_id))
        } else {
            (self.to_string(), None)
        };

        (
            status,
            Json(json!({
                "error": self.kind(),
                "message": message,
                "request_id": request_id,
            })),
        )
            .into_response()
    }
}

/// Errors surfaced by the read-only query API.
#[derive(Debug)]
pub enum QueryError {
    NotFound(String),
    InvalidArgument(String),
    Internal(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not_found: {what}"),
            Self::InvalidArgument(msg) => write!(f, "validation_error: {msg}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            StoreError::Sqlite(err) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let (message, request_id) = if let Self::Internal(cause) = &self {
            let request_id = Uuid::new_v4().to_string();
            tracing::error!(request_id = %request_id, cause = %cause, "internal error");
            ("internal error".to_string(), Some(request_id))
        } else {
            (self.to_string(), None)
        };
        (
            status,
            Json(json!({ "error": kind, "message": message, "request_id": request_id })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_error_redacts_cause_but_carries_a_request_id() {
        let response = IngestError::Internal("disk full".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "internal error");
        assert!(body["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn validation_error_carries_no_request_id() {
        let response = IngestError::Validation("bad nonce".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "validation_error: bad nonce");
        assert!(body["request_id"].is_null());
    }
}
