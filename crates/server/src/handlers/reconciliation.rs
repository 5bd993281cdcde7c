//! Handlers for the `/bank-reconciliation` routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use concilia_core::{BankStatement, EntryStatus, EntryType, StatementEntry};
use concilia_engine::{self as engine, DateRange, EngineError};
use concilia_storage::{self as storage, EntryFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::TenantContext;
use crate::handlers::ok;
use crate::router::AppState;

const SUGGESTION_LIMIT: usize = 10;

pub async fn summary(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Value>, ApiError> {
    let data = engine::summary(&state.pool, ctx.tenant_id).await?;
    Ok(ok(data))
}

#[derive(Serialize)]
struct StatementPayload {
    #[serde(flatten)]
    statement: BankStatement,
    entries_count: i64,
}

#[derive(Serialize)]
struct StatementList {
    total: usize,
    data: Vec<StatementPayload>,
}

pub async fn list_statements(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Value>, ApiError> {
    let statements = storage::statements::list_statements(&state.pool, ctx.tenant_id).await?;

    let data: Vec<StatementPayload> = statements
        .into_iter()
        .map(|(statement, entries_count)| StatementPayload {
            statement,
            entries_count,
        })
        .collect();

    Ok(ok(StatementList {
        total: data.len(),
        data,
    }))
}

#[derive(Deserialize)]
pub struct EntriesQuery {
    status: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    search: Option<String>,
}

impl EntriesQuery {
    fn into_filter(self) -> Result<EntryFilter, ApiError> {
        let status = self
            .status
            .map(|s| s.parse::<EntryStatus>().map_err(ApiError::BadRequest))
            .transpose()?;
        let entry_type = self
            .entry_type
            .map(|t| t.parse::<EntryType>().map_err(ApiError::BadRequest))
            .transpose()?;

        Ok(EntryFilter {
            status,
            entry_type,
            search: self.search,
        })
    }
}

pub async fn list_entries(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(statement_id): Path<i64>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = query.into_filter()?;

    let mut conn = state.pool.acquire().await?;
    storage::statements::get_statement(&mut conn, ctx.tenant_id, statement_id)
        .await?
        .ok_or(EngineError::NotFound("statement"))?;
    drop(conn);

    let entries =
        storage::entries::list_for_statement(&state.pool, ctx.tenant_id, statement_id, &filter)
            .await?;
    Ok(ok(entries))
}

#[derive(Deserialize)]
pub struct MatchBody {
    matched_type: String,
    matched_id: i64,
}

pub async fn match_entry(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(entry_id): Path<i64>,
    Json(body): Json<MatchBody>,
) -> Result<Json<Value>, ApiError> {
    let entry = engine::match_entry(
        &state.pool,
        ctx.tenant_id,
        ctx.user_id,
        entry_id,
        &body.matched_type,
        body.matched_id,
    )
    .await?;
    Ok(ok(entry))
}

pub async fn unmatch_entry(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(entry_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let entry = engine::unmatch_entry(&state.pool, ctx.tenant_id, entry_id).await?;
    Ok(ok(entry))
}

pub async fn ignore_entry(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(entry_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let entry = engine::ignore_entry(&state.pool, ctx.tenant_id, ctx.user_id, entry_id).await?;
    Ok(ok(entry))
}

#[derive(Deserialize)]
pub struct BulkBody {
    action: engine::BulkAction,
    entry_ids: Vec<i64>,
}

pub async fn bulk(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<BulkBody>,
) -> Result<Json<Value>, ApiError> {
    let processed = engine::bulk_apply(
        &state.pool,
        ctx.tenant_id,
        ctx.user_id,
        body.action,
        &body.entry_ids,
    )
    .await?;
    Ok(ok(serde_json::json!({ "processed": processed })))
}

async fn load_entry(
    state: &AppState,
    tenant_id: i64,
    entry_id: i64,
) -> Result<StatementEntry, ApiError> {
    let mut conn = state.pool.acquire().await?;
    let entry = storage::entries::get_entry(&mut conn, tenant_id, entry_id)
        .await?
        .ok_or(EngineError::NotFound("entry"))?;
    Ok(entry)
}

pub async fn suggestions(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(entry_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let entry = load_entry(&state, ctx.tenant_id, entry_id).await?;

    let mut conn = state.pool.acquire().await?;
    let suggestions = engine::suggestions(&mut conn, &entry, SUGGESTION_LIMIT).await?;
    Ok(ok(suggestions))
}

pub async fn suggest_rule(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(entry_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let entry = load_entry(&state, ctx.tenant_id, entry_id).await?;
    Ok(ok(engine::learn_rule(&entry)))
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, ApiError> {
    // Each missing bound defaults on its own: start to 30 days back, end
    // to today.
    let range = match (query.start_date, query.end_date) {
        (None, None) => None,
        (start, end) => {
            let today = Utc::now().date_naive();
            Some(DateRange {
                start: start.unwrap_or_else(|| today - Duration::days(30)),
                end: end.unwrap_or(today),
            })
        }
    };

    let data = engine::summarize(&state.pool, ctx.tenant_id, range).await?;
    Ok(ok(data))
}
