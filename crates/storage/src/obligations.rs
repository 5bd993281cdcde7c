use chrono::NaiveDate;
use concilia_core::{Money, Obligation, ObligationKind, ObligationStatus};
use sqlx::SqliteConnection;

use crate::decode;

#[derive(sqlx::FromRow)]
struct ObligationRow {
    id: i64,
    tenant_id: i64,
    kind: String,
    description: String,
    amount_cents: i64,
    paid_cents: i64,
    due_date: NaiveDate,
    status: String,
    matched_entry_id: Option<i64>,
}

impl ObligationRow {
    fn into_domain(self) -> Result<Obligation, sqlx::Error> {
        Ok(Obligation {
            id: self.id,
            tenant_id: self.tenant_id,
            kind: decode::<ObligationKind>(&self.kind)?,
            description: self.description,
            amount: Money::from_cents(self.amount_cents),
            paid: Money::from_cents(self.paid_cents),
            due_date: self.due_date,
            status: decode::<ObligationStatus>(&self.status)?,
            matched_entry_id: self.matched_entry_id,
        })
    }
}

const COLUMNS: &str =
    "id, tenant_id, kind, description, amount_cents, paid_cents, due_date, status, \
     matched_entry_id";

pub struct NewObligation<'a> {
    pub tenant_id: i64,
    pub kind: ObligationKind,
    pub description: &'a str,
    pub amount_cents: i64,
    pub paid_cents: i64,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
}

/// Obligations are owned by the wider financial module; the engine inserts
/// them only in tests and fixtures.
pub async fn insert_obligation(
    conn: &mut SqliteConnection,
    obligation: NewObligation<'_>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO obligations
         (tenant_id, kind, description, amount_cents, paid_cents, due_date, status)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(obligation.tenant_id)
    .bind(obligation.kind.as_str())
    .bind(obligation.description)
    .bind(obligation.amount_cents)
    .bind(obligation.paid_cents)
    .bind(obligation.due_date)
    .bind(obligation.status.as_str())
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Unscoped lookup, used for the cross-tenant check before a manual match.
pub async fn get_obligation(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Obligation>, sqlx::Error> {
    let row: Option<ObligationRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM obligations WHERE id = ?"))
            .bind(id)
            .fetch_optional(conn)
            .await?;

    row.map(ObligationRow::into_domain).transpose()
}

/// Best auto-match candidate: same tenant and kind, still outstanding,
/// unclaimed, with outstanding amount inside `[min_cents, max_cents]`.
/// Ordering is due date closest to the entry date, then lowest id, so the
/// result is deterministic when several candidates qualify.
pub async fn find_candidate(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    kind: ObligationKind,
    min_cents: i64,
    max_cents: i64,
    entry_date: NaiveDate,
) -> Result<Option<Obligation>, sqlx::Error> {
    let row: Option<ObligationRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM obligations
         WHERE tenant_id = ? AND kind = ? AND status IN ('pending', 'partial')
           AND matched_entry_id IS NULL
           AND (amount_cents - paid_cents) BETWEEN ? AND ?
         ORDER BY ABS(julianday(due_date) - julianday(?)), id
         LIMIT 1"
    ))
    .bind(tenant_id)
    .bind(kind.as_str())
    .bind(min_cents)
    .bind(max_cents)
    .bind(entry_date)
    .fetch_optional(conn)
    .await?;

    row.map(ObligationRow::into_domain).transpose()
}

/// Outstanding obligations of one kind with an amount near the given value,
/// for suggestion scoring. `spread` widens the window on both sides.
pub async fn list_near_amount(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    kind: ObligationKind,
    min_cents: i64,
    max_cents: i64,
    limit: i64,
) -> Result<Vec<Obligation>, sqlx::Error> {
    let rows: Vec<ObligationRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM obligations
         WHERE tenant_id = ? AND kind = ? AND status IN ('pending', 'partial')
           AND amount_cents BETWEEN ? AND ?
         ORDER BY due_date, id
         LIMIT ?"
    ))
    .bind(tenant_id)
    .bind(kind.as_str())
    .bind(min_cents)
    .bind(max_cents)
    .bind(limit)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(ObligationRow::into_domain).collect()
}

/// Claim an obligation for an entry. The `matched_entry_id IS NULL` guard
/// makes the claim first-writer-wins: a false return means another entry got
/// there first and the caller must look for a different candidate.
pub async fn claim(
    conn: &mut SqliteConnection,
    obligation_id: i64,
    entry_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE obligations SET matched_entry_id = ?
         WHERE id = ? AND matched_entry_id IS NULL",
    )
    .bind(entry_id)
    .bind(obligation_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Release whatever claim an entry holds, if any.
pub async fn release_for_entry(
    conn: &mut SqliteConnection,
    entry_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE obligations SET matched_entry_id = NULL WHERE matched_entry_id = ?")
        .bind(entry_id)
        .execute(conn)
        .await?;

    Ok(())
}
