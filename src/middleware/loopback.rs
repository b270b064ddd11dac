//! Rejects any request whose peer address is not loopback.
//!
//! The ingest socket is bound to `127.0.0.1` already, but a misconfigured
//! reverse proxy or container port mapping can still present a non-loopback
//! `ConnectInfo`; this middleware is the belt-and-suspenders check that
//! refuses requests from non-loopback peers outright.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::IngestError;

pub async fn require_loopback(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !addr.ip().is_loopback() {
        return IngestError::Unauthorized.into_response();
    }
    next.run(request).await
}
