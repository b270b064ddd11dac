use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analytics::{self, tiers, RoundPoint};
use crate::app_state::AppState;
use crate::csv_export;
use crate::error::QueryError;
use crate::models::{SortOrder, StreamId};

fn parse_stream_id(id: &str) -> Result<StreamId, QueryError> {
    id.parse::<StreamId>()
        .map_err(|_| QueryError::InvalidArgument(format!("invalid stream id: {id}")))
}

/// Every handler that reads or writes a stream-scoped table (rather than
/// the `streams` row itself) calls this first: a well-formed but unknown
/// id must answer `not_found` rather than silently paging an empty table,
/// per spec.md §4.6.
fn require_stream(state: &AppState, id: StreamId) -> Result<(), QueryError> {
    if state.store.stream_exists(id)? {
        Ok(())
    } else {
        Err(QueryError::NotFound(format!("stream {id}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

pub async fn list_streams(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let streams = state.store.list_streams(q.limit, q.offset.unwrap_or(0))?;
    Ok(Json(streams))
}

pub async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    let stream = state.store.get_stream(id)?;
    Ok(Json(stream))
}

#[derive(Debug, Deserialize)]
pub struct ListBetsQuery {
    min_result: Option<f64>,
    order: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PagedResponse<T> {
    rows: Vec<T>,
    total: i64,
}

pub async fn list_bets(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ListBetsQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    require_stream(&state, id)?;
    let order = match q.order.as_deref() {
        Some("desc") => SortOrder::Desc,
        _ => SortOrder::Asc,
    };
    let (rows, total) = state
        .store
        .list_bets(id, q.min_result, q.limit, q.offset.unwrap_or(0), order)?;
    Ok(Json(PagedResponse { rows, total }))
}

#[derive(Debug, Deserialize)]
pub struct TailBetsQuery {
    since_id: Option<i64>,
    limit: Option<usize>,
}

pub async fn tail_bets(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<TailBetsQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    require_stream(&state, id)?;
    let rows = state
        .store
        .tail_bets(id, q.since_id.unwrap_or(0), q.limit)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ListRoundsQuery {
    min_result: Option<f64>,
    limit: Option<usize>,
    offset: Option<usize>,
}

pub async fn list_rounds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ListRoundsQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    require_stream(&state, id)?;
    let (rows, total) = state
        .store
        .list_rounds(id, q.min_result, q.limit, q.offset.unwrap_or(0))?;
    Ok(Json(PagedResponse { rows, total }))
}

#[derive(Debug, Deserialize)]
pub struct TailRoundsQuery {
    since_nonce: Option<i64>,
    limit: Option<usize>,
}

pub async fn tail_rounds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<TailRoundsQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    require_stream(&state, id)?;
    let rows = state
        .store
        .tail_rounds(id, q.since_nonce.unwrap_or(0), q.limit)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct RecentRoundsQuery {
    limit: Option<usize>,
}

pub async fn get_recent_rounds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RecentRoundsQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    require_stream(&state, id)?;
    let rows = state.store.get_recent_rounds(id, q.limit)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct SeedQualityQuery {
    window: Option<usize>,
}

pub async fn get_seed_quality(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<SeedQualityQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    let stream = state.store.get_stream(id)?;

    // typically >= 5000 rounds so the consistency stats have enough data;
    // callers may request less.
    let window_size = q.window.unwrap_or(5000);
    let mut rows = state.store.get_recent_rounds(id, Some(window_size))?;
    rows.reverse(); // store returns nonce descending; engine wants ascending

    let window: Vec<RoundPoint> = rows
        .iter()
        .map(|r| RoundPoint {
            nonce: r.nonce,
            round_result: r.round_result,
        })
        .collect();

    let quality = analytics::compute_seed_quality(
        &window,
        &tiers::PUMP_EXPERT_TIERS,
        &tiers::PRIMARY_TIER_THRESHOLDS,
        tiers::DEFAULT_LAST_K,
        stream.stream.last_observed_nonce,
    );

    Ok(Json(quality))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotesBody {
    notes: String,
}

pub async fn update_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateNotesBody>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    state.store.update_notes(id, &body.notes)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    state.store.delete_stream(id)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, QueryError> {
    let id = parse_stream_id(&id)?;
    require_stream(&state, id)?;
    let mut buf = Vec::new();
    csv_export::export_bets_csv(&state.store, id, &mut buf)?;
    Ok((
        [(axum::http::header::CONTENT_TYPE, "text/csv")],
        buf,
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpsertSeedAliasBody {
    server_seed_hashed: String,
    server_seed_plain: Option<String>,
}

pub async fn upsert_seed_alias(
    State(state): State<AppState>,
    Json(body): Json<UpsertSeedAliasBody>,
) -> Result<impl IntoResponse, QueryError> {
    state
        .store
        .upsert_seed_alias(&body.server_seed_hashed, body.server_seed_plain.as_deref())?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn get_seed_alias(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, QueryError> {
    let alias = state.store.get_seed_alias(&hash)?;
    Ok(Json(alias))
}
