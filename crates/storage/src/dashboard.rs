//! Aggregate queries feeding the dashboard and the tenant summary.
//!
//! These return raw counts and cent sums; shaping into the API payload is
//! the engine's job.

use chrono::NaiveDate;

use crate::entries::{EntryRow, COLUMNS};
use crate::DbPool;
use concilia_core::StatementEntry;

#[derive(Debug, Clone, Default)]
pub struct KpiCounts {
    pub total: i64,
    pub pending: i64,
    pub matched: i64,
    pub ignored: i64,
    pub auto_matched: i64,
    pub manual_matched: i64,
    pub credits_cents: i64,
    pub debits_cents: i64,
}

pub async fn kpi_counts(
    pool: &DbPool,
    tenant_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<KpiCounts, sqlx::Error> {
    let row: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'matched' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'ignored' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'matched'
                              AND reconciled_by IN ('auto', 'rule') THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'matched'
                              AND reconciled_by = 'manual' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN type = 'credit' THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN type = 'debit' THEN amount_cents ELSE 0 END), 0)
         FROM bank_statement_entries
         WHERE tenant_id = ? AND date BETWEEN ? AND ?",
    )
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(KpiCounts {
        total: row.0,
        pending: row.1,
        matched: row.2,
        ignored: row.3,
        auto_matched: row.4,
        manual_matched: row.5,
        credits_cents: row.6,
        debits_cents: row.7,
    })
}

/// Credit/debit totals per ISO-ish week (`%Y-%W`), in range order.
pub async fn weekly_series(
    pool: &DbPool,
    tenant_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(String, i64, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT strftime('%Y-%W', date) AS week,
                COALESCE(SUM(CASE WHEN type = 'credit' THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN type = 'debit' THEN amount_cents ELSE 0 END), 0)
         FROM bank_statement_entries
         WHERE tenant_id = ? AND date BETWEEN ? AND ?
         GROUP BY week
         ORDER BY week",
    )
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Per-day status counts: `(day, pending, matched, ignored)`.
pub async fn daily_progress(
    pool: &DbPool,
    tenant_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, i64, i64, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT date,
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'matched' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'ignored' THEN 1 ELSE 0 END), 0)
         FROM bank_statement_entries
         WHERE tenant_id = ? AND date BETWEEN ? AND ?
         GROUP BY date
         ORDER BY date",
    )
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Top categories by entry count: `(category, count, amount_cents)`.
pub async fn category_breakdown(
    pool: &DbPool,
    tenant_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    limit: i64,
) -> Result<Vec<(String, i64, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT category, COUNT(*), COALESCE(SUM(amount_cents), 0)
         FROM bank_statement_entries
         WHERE tenant_id = ? AND date BETWEEN ? AND ? AND category IS NOT NULL
         GROUP BY category
         ORDER BY COUNT(*) DESC, category
         LIMIT ?",
    )
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Largest still-pending entries in the range, biggest first.
pub async fn top_unreconciled(
    pool: &DbPool,
    tenant_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    limit: i64,
) -> Result<Vec<StatementEntry>, sqlx::Error> {
    let rows: Vec<EntryRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM bank_statement_entries
         WHERE tenant_id = ? AND date BETWEEN ? AND ? AND status = 'pending'
         ORDER BY amount_cents DESC, id
         LIMIT ?"
    ))
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(EntryRow::into_domain).collect()
}

#[derive(Debug, Clone, Default)]
pub struct SummaryCounts {
    pub total: i64,
    pub pending: i64,
    pub matched: i64,
    pub ignored: i64,
    pub credits_cents: i64,
    pub debits_cents: i64,
    pub duplicates: i64,
}

/// All-time per-tenant totals for the summary endpoint.
pub async fn summary_counts(pool: &DbPool, tenant_id: i64) -> Result<SummaryCounts, sqlx::Error> {
    let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'matched' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'ignored' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN type = 'credit' THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN type = 'debit' THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN possible_duplicate THEN 1 ELSE 0 END), 0)
         FROM bank_statement_entries
         WHERE tenant_id = ?",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;

    Ok(SummaryCounts {
        total: row.0,
        pending: row.1,
        matched: row.2,
        ignored: row.3,
        credits_cents: row.4,
        debits_cents: row.5,
        duplicates: row.6,
    })
}
