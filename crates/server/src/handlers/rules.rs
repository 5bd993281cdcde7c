//! Handlers for the `/reconciliation-rules` routes.

use axum::extract::{Path, State};
use axum::Json;
use concilia_core::RuleDraft;
use concilia_engine::{self as engine, EngineError};
use concilia_storage as storage;
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::TenantContext;
use crate::handlers::ok;
use crate::router::AppState;

/// Sample size returned by the dry-run endpoint.
const DRY_RUN_SAMPLE: usize = 10;

pub async fn list(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Value>, ApiError> {
    let rules = storage::rules::list_rules(&state.pool, ctx.tenant_id).await?;
    Ok(ok(rules))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(draft): Json<RuleDraft>,
) -> Result<Json<Value>, ApiError> {
    engine::validate_draft(&draft)?;

    let mut conn = state.pool.acquire().await?;
    let id = storage::rules::insert_rule(&mut conn, ctx.tenant_id, &draft).await?;
    let rule = storage::rules::get_rule(&mut conn, ctx.tenant_id, id)
        .await?
        .ok_or(EngineError::NotFound("rule"))?;

    tracing::info!(rule_id = id, tenant_id = ctx.tenant_id, "rule created");

    Ok(ok(rule))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(rule_id): Path<i64>,
    Json(draft): Json<RuleDraft>,
) -> Result<Json<Value>, ApiError> {
    engine::validate_draft(&draft)?;

    let mut conn = state.pool.acquire().await?;
    if !storage::rules::update_rule(&mut conn, ctx.tenant_id, rule_id, &draft).await? {
        return Err(EngineError::NotFound("rule").into());
    }
    let rule = storage::rules::get_rule(&mut conn, ctx.tenant_id, rule_id)
        .await?
        .ok_or(EngineError::NotFound("rule"))?;

    Ok(ok(rule))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(rule_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    if !storage::rules::delete_rule(&mut conn, ctx.tenant_id, rule_id).await? {
        return Err(EngineError::NotFound("rule").into());
    }

    tracing::info!(rule_id, tenant_id = ctx.tenant_id, "rule deleted");

    Ok(ok(Value::Null))
}

pub async fn toggle(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(rule_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    if !storage::rules::toggle_rule(&mut conn, ctx.tenant_id, rule_id).await? {
        return Err(EngineError::NotFound("rule").into());
    }
    let rule = storage::rules::get_rule(&mut conn, ctx.tenant_id, rule_id)
        .await?
        .ok_or(EngineError::NotFound("rule"))?;

    Ok(ok(rule))
}

/// Dry-run a draft against recent entries. Applies nothing.
pub async fn test(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(draft): Json<RuleDraft>,
) -> Result<Json<Value>, ApiError> {
    let report = engine::dry_run(&state.pool, ctx.tenant_id, &draft, DRY_RUN_SAMPLE).await?;
    Ok(ok(report))
}
