use chrono::{DateTime, NaiveDate, Utc};
use concilia_core::{
    EntryStatus, EntryType, Money, ObligationKind, ReconciledBy, StatementEntry,
};
use sqlx::SqliteConnection;

use crate::{decode, DbPool};

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    id: i64,
    bank_statement_id: i64,
    tenant_id: i64,
    date: NaiveDate,
    description: String,
    amount_cents: i64,
    #[sqlx(rename = "type")]
    entry_type: String,
    status: String,
    category: Option<String>,
    possible_duplicate: bool,
    matched_kind: Option<String>,
    matched_id: Option<i64>,
    reconciled_by: Option<String>,
    reconciled_at: Option<DateTime<Utc>>,
    reconciled_by_user: Option<i64>,
    rule_id: Option<i64>,
}

impl EntryRow {
    pub(crate) fn into_domain(self) -> Result<StatementEntry, sqlx::Error> {
        Ok(StatementEntry {
            id: self.id,
            bank_statement_id: self.bank_statement_id,
            tenant_id: self.tenant_id,
            date: self.date,
            description: self.description,
            amount: Money::from_cents(self.amount_cents),
            entry_type: decode::<EntryType>(&self.entry_type)?,
            status: decode::<EntryStatus>(&self.status)?,
            category: self.category,
            possible_duplicate: self.possible_duplicate,
            matched_kind: self
                .matched_kind
                .as_deref()
                .map(decode::<ObligationKind>)
                .transpose()?,
            matched_id: self.matched_id,
            reconciled_by: self
                .reconciled_by
                .as_deref()
                .map(decode::<ReconciledBy>)
                .transpose()?,
            reconciled_at: self.reconciled_at,
            reconciled_by_user: self.reconciled_by_user,
            rule_id: self.rule_id,
        })
    }
}

pub(crate) const COLUMNS: &str = "id, bank_statement_id, tenant_id, date, description, \
     amount_cents, type, status, category, possible_duplicate, matched_kind, matched_id, \
     reconciled_by, reconciled_at, reconciled_by_user, rule_id";

pub struct NewEntry<'a> {
    pub bank_statement_id: i64,
    pub tenant_id: i64,
    pub date: NaiveDate,
    pub description: &'a str,
    pub amount_cents: i64,
    pub entry_type: EntryType,
    pub possible_duplicate: bool,
}

pub async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: NewEntry<'_>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO bank_statement_entries
         (bank_statement_id, tenant_id, date, description, amount_cents, type, status,
          possible_duplicate)
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)",
    )
    .bind(entry.bank_statement_id)
    .bind(entry.tenant_id)
    .bind(entry.date)
    .bind(entry.description)
    .bind(entry.amount_cents)
    .bind(entry.entry_type.as_str())
    .bind(entry.possible_duplicate)
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_entry(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    id: i64,
) -> Result<Option<StatementEntry>, sqlx::Error> {
    let row: Option<EntryRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM bank_statement_entries WHERE tenant_id = ? AND id = ?"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(EntryRow::into_domain).transpose()
}

/// Pending entries of one statement, in import order.
pub async fn list_pending(
    conn: &mut SqliteConnection,
    statement_id: i64,
) -> Result<Vec<StatementEntry>, sqlx::Error> {
    let rows: Vec<EntryRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM bank_statement_entries
         WHERE bank_statement_id = ? AND status = 'pending'
         ORDER BY id"
    ))
    .bind(statement_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(EntryRow::into_domain).collect()
}

/// Most recent entries of a tenant, for rule dry runs.
pub async fn list_recent(
    pool: &DbPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<StatementEntry>, sqlx::Error> {
    let rows: Vec<EntryRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM bank_statement_entries
         WHERE tenant_id = ?
         ORDER BY date DESC, id DESC
         LIMIT ?"
    ))
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(EntryRow::into_domain).collect()
}

#[derive(Debug, Default, Clone)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
    pub entry_type: Option<EntryType>,
    pub search: Option<String>,
}

pub async fn list_for_statement(
    pool: &DbPool,
    tenant_id: i64,
    statement_id: i64,
    filter: &EntryFilter,
) -> Result<Vec<StatementEntry>, sqlx::Error> {
    let mut sql = format!(
        "SELECT {COLUMNS} FROM bank_statement_entries
         WHERE tenant_id = ? AND bank_statement_id = ?"
    );
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.entry_type.is_some() {
        sql.push_str(" AND type = ?");
    }
    if filter.search.is_some() {
        sql.push_str(" AND description LIKE ?");
    }
    sql.push_str(" ORDER BY date, id");

    let mut query = sqlx::query_as::<_, EntryRow>(&sql)
        .bind(tenant_id)
        .bind(statement_id);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(entry_type) = filter.entry_type {
        query = query.bind(entry_type.as_str());
    }
    if let Some(search) = &filter.search {
        query = query.bind(format!("%{search}%"));
    }

    let rows = query.fetch_all(pool).await?;
    rows.into_iter().map(EntryRow::into_domain).collect()
}

/// Whether another statement of the same tenant already holds an entry with
/// the same date, same description, and an amount within one cent.
pub async fn duplicate_exists(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    statement_id: i64,
    date: NaiveDate,
    amount_cents: i64,
    description: &str,
) -> Result<bool, sqlx::Error> {
    let (n,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM bank_statement_entries
         WHERE tenant_id = ? AND bank_statement_id != ? AND date = ?
           AND amount_cents BETWEEN ? AND ? AND description = ?",
    )
    .bind(tenant_id)
    .bind(statement_id)
    .bind(date)
    .bind(amount_cents - 1)
    .bind(amount_cents + 1)
    .bind(description)
    .fetch_one(conn)
    .await?;

    Ok(n > 0)
}

pub struct MatchUpdate<'a> {
    pub kind: ObligationKind,
    pub obligation_id: i64,
    pub reconciled_by: ReconciledBy,
    pub reconciled_by_user: Option<i64>,
    pub rule_id: Option<i64>,
    pub category: Option<&'a str>,
}

pub async fn apply_match(
    conn: &mut SqliteConnection,
    entry_id: i64,
    update: MatchUpdate<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bank_statement_entries
         SET status = 'matched', matched_kind = ?, matched_id = ?, reconciled_by = ?,
             reconciled_at = ?, reconciled_by_user = ?, rule_id = ?,
             category = COALESCE(?, category)
         WHERE id = ?",
    )
    .bind(update.kind.as_str())
    .bind(update.obligation_id)
    .bind(update.reconciled_by.as_str())
    .bind(Utc::now())
    .bind(update.reconciled_by_user)
    .bind(update.rule_id)
    .bind(update.category)
    .bind(entry_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Ignore an entry. Match fields are always cleared: ignored entries never
/// reference an obligation.
pub async fn apply_ignore(
    conn: &mut SqliteConnection,
    entry_id: i64,
    reconciled_by: ReconciledBy,
    reconciled_by_user: Option<i64>,
    rule_id: Option<i64>,
    category: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bank_statement_entries
         SET status = 'ignored', matched_kind = NULL, matched_id = NULL,
             reconciled_by = ?, reconciled_at = ?, reconciled_by_user = ?, rule_id = ?,
             category = COALESCE(?, category)
         WHERE id = ?",
    )
    .bind(reconciled_by.as_str())
    .bind(Utc::now())
    .bind(reconciled_by_user)
    .bind(rule_id)
    .bind(category)
    .bind(entry_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Revert an entry to pending, clearing every reconciliation field.
pub async fn clear_reconciliation(
    conn: &mut SqliteConnection,
    entry_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bank_statement_entries
         SET status = 'pending', matched_kind = NULL, matched_id = NULL,
             reconciled_by = NULL, reconciled_at = NULL, reconciled_by_user = NULL,
             rule_id = NULL
         WHERE id = ?",
    )
    .bind(entry_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Attach a category label without touching match status.
pub async fn set_category(
    conn: &mut SqliteConnection,
    entry_id: i64,
    category: &str,
    rule_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bank_statement_entries
         SET category = ?, reconciled_by = 'rule', reconciled_at = ?, rule_id = ?
         WHERE id = ?",
    )
    .bind(category)
    .bind(Utc::now())
    .bind(rule_id)
    .bind(entry_id)
    .execute(conn)
    .await?;

    Ok(())
}
