use chrono::{DateTime, Utc};
use concilia_core::{BankStatement, StatementFormat};
use sqlx::SqliteConnection;

use crate::{decode, DbPool};

#[derive(sqlx::FromRow)]
struct StatementRow {
    id: i64,
    tenant_id: i64,
    filename: String,
    format: String,
    imported_at: DateTime<Utc>,
    created_by: i64,
    total_entries: i64,
    matched_entries: i64,
}

impl StatementRow {
    fn into_domain(self) -> Result<BankStatement, sqlx::Error> {
        Ok(BankStatement {
            id: self.id,
            tenant_id: self.tenant_id,
            filename: self.filename,
            format: decode::<StatementFormat>(&self.format)?,
            imported_at: self.imported_at,
            created_by: self.created_by,
            total_entries: self.total_entries,
            matched_entries: self.matched_entries,
        })
    }
}

const COLUMNS: &str =
    "id, tenant_id, filename, format, imported_at, created_by, total_entries, matched_entries";

pub async fn insert_statement(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    filename: &str,
    format: StatementFormat,
    created_by: i64,
    total_entries: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO bank_statements
         (tenant_id, filename, format, imported_at, created_by, total_entries, matched_entries)
         VALUES (?, ?, ?, ?, ?, ?, 0)",
    )
    .bind(tenant_id)
    .bind(filename)
    .bind(format.as_str())
    .bind(Utc::now())
    .bind(created_by)
    .bind(total_entries)
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_statement(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    id: i64,
) -> Result<Option<BankStatement>, sqlx::Error> {
    let row: Option<StatementRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM bank_statements WHERE tenant_id = ? AND id = ?"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(StatementRow::into_domain).transpose()
}

/// Statements for a tenant, newest first, each with its live entry count.
pub async fn list_statements(
    pool: &DbPool,
    tenant_id: i64,
) -> Result<Vec<(BankStatement, i64)>, sqlx::Error> {
    let rows: Vec<(i64, i64, String, String, DateTime<Utc>, i64, i64, i64, i64)> =
        sqlx::query_as(
            "SELECT s.id, s.tenant_id, s.filename, s.format, s.imported_at, s.created_by,
                    s.total_entries, s.matched_entries,
                    (SELECT COUNT(*) FROM bank_statement_entries e
                      WHERE e.bank_statement_id = s.id) AS entries_count
             FROM bank_statements s
             WHERE s.tenant_id = ?
             ORDER BY s.imported_at DESC, s.id DESC",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|r| {
            Ok((
                BankStatement {
                    id: r.0,
                    tenant_id: r.1,
                    filename: r.2,
                    format: decode::<StatementFormat>(&r.3)?,
                    imported_at: r.4,
                    created_by: r.5,
                    total_entries: r.6,
                    matched_entries: r.7,
                },
                r.8,
            ))
        })
        .collect()
}

/// Recompute `matched_entries` from a fresh count of matched entries.
///
/// Always derived, never incremented: concurrent or repeated mutations on the
/// same statement converge to the true count instead of compounding deltas.
pub async fn sync_matched_entries(
    conn: &mut SqliteConnection,
    statement_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bank_statements
         SET matched_entries = (
             SELECT COUNT(*) FROM bank_statement_entries
             WHERE bank_statement_id = ? AND status = 'matched'
         )
         WHERE id = ?",
    )
    .bind(statement_id)
    .bind(statement_id)
    .execute(conn)
    .await?;

    Ok(())
}
