//! Statement import pipeline.
//!
//! Detect the format, parse best-effort, then persist everything in a single
//! transaction: the statement header, its entries, the auto-match pass, and
//! the rule pass. A failure anywhere rolls the whole import back; a file
//! that parses to zero entries still imports as an empty statement.

use std::path::Path;

use concilia_core::{BankStatement, EntryType, StatementFormat};
use concilia_import::{detect_format, parse, RawTransaction};
use concilia_storage::{self as storage, DbPool, NewEntry};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::EngineError;
use crate::matcher;
use crate::rules;

/// What an import did: the persisted statement plus per-phase counts.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub statement: BankStatement,
    pub format: StatementFormat,
    pub imported: usize,
    pub skipped: usize,
    pub auto_matched: usize,
    pub rules_applied: usize,
    pub duplicates_flagged: usize,
}

/// Import a statement from raw file bytes.
pub async fn import_bytes(
    pool: &DbPool,
    tenant_id: i64,
    user_id: i64,
    filename: &str,
    content: &[u8],
) -> Result<ImportReport, EngineError> {
    let format = detect_format(Some(filename), content)?;
    let outcome = parse(format, content);

    tracing::info!(
        tenant_id,
        filename,
        format = %format,
        parsed = outcome.transactions.len(),
        skipped = outcome.skipped,
        "importing statement"
    );

    let mut tx = pool.begin().await?;

    let statement_id = storage::statements::insert_statement(
        &mut tx,
        tenant_id,
        filename,
        format,
        user_id,
        outcome.transactions.len() as i64,
    )
    .await?;

    let mut duplicates_flagged = 0;
    for raw in &outcome.transactions {
        if insert_transaction(&mut tx, tenant_id, statement_id, raw).await? {
            duplicates_flagged += 1;
        }
    }

    let auto_matched = matcher::auto_match_statement(&mut tx, statement_id).await?;
    let rules_applied = rules::apply_rules(&mut tx, statement_id).await?;

    let statement = storage::statements::get_statement(&mut tx, tenant_id, statement_id)
        .await?
        .ok_or(EngineError::NotFound("statement"))?;

    tx.commit().await?;

    Ok(ImportReport {
        statement,
        format,
        imported: outcome.transactions.len(),
        skipped: outcome.skipped,
        auto_matched,
        rules_applied,
        duplicates_flagged,
    })
}

/// Import a statement from disk. The stored filename is the path's final
/// component.
pub async fn import_file(
    pool: &DbPool,
    tenant_id: i64,
    user_id: i64,
    path: &Path,
) -> Result<ImportReport, EngineError> {
    let content = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    import_bytes(pool, tenant_id, user_id, &filename, &content).await
}

/// Import content already known to be OFX, bypassing detection. Kept for
/// callers that upload through the OFX-only endpoint.
pub async fn import_ofx(
    pool: &DbPool,
    tenant_id: i64,
    user_id: i64,
    filename: &str,
    content: &[u8],
) -> Result<ImportReport, EngineError> {
    let outcome = parse(StatementFormat::Ofx, content);
    if outcome.transactions.is_empty() && outcome.skipped == 0 {
        // Nothing OFX-shaped at all.
        if !String::from_utf8_lossy(content).to_uppercase().contains("<OFX") {
            return Err(EngineError::UnsupportedFormat);
        }
    }
    import_bytes(pool, tenant_id, user_id, filename, content).await
}

/// Returns whether the entry was flagged as a possible duplicate.
async fn insert_transaction(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    statement_id: i64,
    raw: &RawTransaction,
) -> Result<bool, EngineError> {
    let entry_type = if raw.amount_cents < 0 {
        EntryType::Debit
    } else {
        EntryType::Credit
    };
    let amount_cents = raw.amount_cents.abs();

    let possible_duplicate = storage::entries::duplicate_exists(
        conn,
        tenant_id,
        statement_id,
        raw.date,
        amount_cents,
        &raw.description,
    )
    .await?;

    storage::entries::insert_entry(
        conn,
        NewEntry {
            bank_statement_id: statement_id,
            tenant_id,
            date: raw.date,
            description: &raw.description,
            amount_cents,
            entry_type,
            possible_duplicate,
        },
    )
    .await?;

    Ok(possible_duplicate)
}
