use chrono::{DateTime, Utc};
use concilia_core::{Money, ReconciliationRule, RuleAction, RuleDraft, RuleField, RuleOperator};
use sqlx::SqliteConnection;

use crate::{decode, DbPool};

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: i64,
    tenant_id: i64,
    name: String,
    match_field: String,
    match_operator: String,
    match_value: Option<String>,
    match_amount_min_cents: Option<i64>,
    match_amount_max_cents: Option<i64>,
    action: String,
    category: Option<String>,
    priority: i64,
    is_active: bool,
    times_applied: i64,
    created_at: DateTime<Utc>,
}

impl RuleRow {
    fn into_domain(self) -> Result<ReconciliationRule, sqlx::Error> {
        Ok(ReconciliationRule {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            match_field: decode::<RuleField>(&self.match_field)?,
            match_operator: decode::<RuleOperator>(&self.match_operator)?,
            match_value: self.match_value,
            match_amount_min: self.match_amount_min_cents.map(Money::from_cents),
            match_amount_max: self.match_amount_max_cents.map(Money::from_cents),
            action: decode::<RuleAction>(&self.action)?,
            category: self.category,
            priority: self.priority,
            is_active: self.is_active,
            times_applied: self.times_applied,
            created_at: self.created_at,
        })
    }
}

const COLUMNS: &str = "id, tenant_id, name, match_field, match_operator, match_value, \
     match_amount_min_cents, match_amount_max_cents, action, category, priority, is_active, \
     times_applied, created_at";

pub async fn list_rules(
    pool: &DbPool,
    tenant_id: i64,
) -> Result<Vec<ReconciliationRule>, sqlx::Error> {
    let rows: Vec<RuleRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM reconciliation_rules
         WHERE tenant_id = ? ORDER BY priority, id"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(RuleRow::into_domain).collect()
}

/// Active rules in evaluation order: ascending priority, then id for a
/// stable tie-break.
pub async fn active_rules(
    conn: &mut SqliteConnection,
    tenant_id: i64,
) -> Result<Vec<ReconciliationRule>, sqlx::Error> {
    let rows: Vec<RuleRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM reconciliation_rules
         WHERE tenant_id = ? AND is_active = 1
         ORDER BY priority, id"
    ))
    .bind(tenant_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(RuleRow::into_domain).collect()
}

pub async fn get_rule(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    id: i64,
) -> Result<Option<ReconciliationRule>, sqlx::Error> {
    let row: Option<RuleRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM reconciliation_rules WHERE tenant_id = ? AND id = ?"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(RuleRow::into_domain).transpose()
}

pub async fn insert_rule(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    draft: &RuleDraft,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO reconciliation_rules
         (tenant_id, name, match_field, match_operator, match_value,
          match_amount_min_cents, match_amount_max_cents, action, category, priority,
          is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(tenant_id)
    .bind(&draft.name)
    .bind(draft.match_field.as_str())
    .bind(draft.match_operator.as_str())
    .bind(&draft.match_value)
    .bind(draft.match_amount_min.map(Money::to_cents))
    .bind(draft.match_amount_max.map(Money::to_cents))
    .bind(draft.action.as_str())
    .bind(&draft.category)
    .bind(draft.priority)
    .bind(draft.is_active)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Full-row update. Returns false when the rule does not exist for this
/// tenant.
pub async fn update_rule(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    id: i64,
    draft: &RuleDraft,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reconciliation_rules
         SET name = ?, match_field = ?, match_operator = ?, match_value = ?,
             match_amount_min_cents = ?, match_amount_max_cents = ?, action = ?,
             category = ?, priority = ?, is_active = ?
         WHERE tenant_id = ? AND id = ?",
    )
    .bind(&draft.name)
    .bind(draft.match_field.as_str())
    .bind(draft.match_operator.as_str())
    .bind(&draft.match_value)
    .bind(draft.match_amount_min.map(Money::to_cents))
    .bind(draft.match_amount_max.map(Money::to_cents))
    .bind(draft.action.as_str())
    .bind(&draft.category)
    .bind(draft.priority)
    .bind(draft.is_active)
    .bind(tenant_id)
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_rule(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reconciliation_rules WHERE tenant_id = ? AND id = ?")
        .bind(tenant_id)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Flip `is_active`. Deactivating never erases `times_applied` or past
/// entry annotations.
pub async fn toggle_rule(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reconciliation_rules SET is_active = NOT is_active
         WHERE tenant_id = ? AND id = ?",
    )
    .bind(tenant_id)
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn increment_times_applied(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE reconciliation_rules SET times_applied = times_applied + 1 WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}
