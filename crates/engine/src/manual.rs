//! Manual reconciliation: match, unmatch, and ignore driven by a user.
//!
//! Each operation runs in one transaction that ends by recomputing the
//! statement's matched counter, so the counter can never drift from the
//! entry rows.

use std::collections::BTreeSet;

use concilia_core::{EntryStatus, ObligationKind, ReconciledBy, StatementEntry};
use concilia_storage::{self as storage, DbPool, MatchUpdate};
use serde::Deserialize;
use sqlx::SqliteConnection;

use crate::error::EngineError;
use crate::matcher;

async fn load_entry(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    entry_id: i64,
) -> Result<StatementEntry, EngineError> {
    storage::entries::get_entry(conn, tenant_id, entry_id)
        .await?
        .ok_or(EngineError::NotFound("entry"))
}

/// Manually match an entry against an obligation.
///
/// `kind` accepts the short names (`receivable`, `payable`) and their
/// qualified aliases (`account_receivable`, `AccountPayable`, ...). The
/// obligation must belong to the caller's tenant, be of the resolved kind,
/// and not already be claimed by another entry. Re-matching an already
/// matched entry releases its previous claim first.
pub async fn match_entry(
    pool: &DbPool,
    tenant_id: i64,
    user_id: Option<i64>,
    entry_id: i64,
    kind: &str,
    obligation_id: i64,
) -> Result<StatementEntry, EngineError> {
    let resolved = ObligationKind::resolve(kind)
        .ok_or_else(|| EngineError::validation(format!("unknown obligation kind: '{kind}'")))?;

    let mut tx = pool.begin().await?;

    let entry = load_entry(&mut tx, tenant_id, entry_id).await?;

    let obligation = storage::obligations::get_obligation(&mut tx, obligation_id)
        .await?
        .ok_or(EngineError::NotFound("obligation"))?;

    if obligation.tenant_id != tenant_id {
        return Err(EngineError::CrossTenantReference(format!(
            "obligation {obligation_id} belongs to another tenant"
        )));
    }
    if obligation.kind != resolved {
        return Err(EngineError::validation(format!(
            "obligation {obligation_id} is a {}, not a {}",
            obligation.kind, resolved
        )));
    }

    // A re-match must not leave the old obligation claimed forever.
    storage::obligations::release_for_entry(&mut tx, entry.id).await?;

    if !storage::obligations::claim(&mut tx, obligation.id, entry.id).await? {
        return Err(EngineError::validation(format!(
            "obligation {obligation_id} is already matched to another entry"
        )));
    }

    storage::entries::apply_match(
        &mut tx,
        entry.id,
        MatchUpdate {
            kind: resolved,
            obligation_id: obligation.id,
            reconciled_by: ReconciledBy::Manual,
            reconciled_by_user: user_id,
            rule_id: None,
            category: None,
        },
    )
    .await?;
    storage::statements::sync_matched_entries(&mut tx, entry.bank_statement_id).await?;

    let updated = load_entry(&mut tx, tenant_id, entry_id).await?;
    tx.commit().await?;

    tracing::info!(entry_id, obligation_id, kind = %resolved, "entry matched manually");

    Ok(updated)
}

/// Revert a matched entry to pending, releasing its obligation claim.
pub async fn unmatch_entry(
    pool: &DbPool,
    tenant_id: i64,
    entry_id: i64,
) -> Result<StatementEntry, EngineError> {
    let mut tx = pool.begin().await?;

    let entry = load_entry(&mut tx, tenant_id, entry_id).await?;
    if entry.status != EntryStatus::Matched {
        return Err(EngineError::validation("entry is not matched"));
    }

    storage::obligations::release_for_entry(&mut tx, entry.id).await?;
    storage::entries::clear_reconciliation(&mut tx, entry.id).await?;
    storage::statements::sync_matched_entries(&mut tx, entry.bank_statement_id).await?;

    let updated = load_entry(&mut tx, tenant_id, entry_id).await?;
    tx.commit().await?;

    tracing::info!(entry_id, "entry unmatched");

    Ok(updated)
}

/// Mark an entry ignored. Allowed from any status; a matched entry loses its
/// claim on the way.
pub async fn ignore_entry(
    pool: &DbPool,
    tenant_id: i64,
    user_id: Option<i64>,
    entry_id: i64,
) -> Result<StatementEntry, EngineError> {
    let mut tx = pool.begin().await?;

    let entry = load_entry(&mut tx, tenant_id, entry_id).await?;

    storage::obligations::release_for_entry(&mut tx, entry.id).await?;
    storage::entries::apply_ignore(&mut tx, entry.id, ReconciledBy::Manual, user_id, None, None)
        .await?;
    storage::statements::sync_matched_entries(&mut tx, entry.bank_statement_id).await?;

    let updated = load_entry(&mut tx, tenant_id, entry_id).await?;
    tx.commit().await?;

    tracing::info!(entry_id, "entry ignored");

    Ok(updated)
}

/// Upper bound on ids accepted by one bulk call.
pub const BULK_MAX_ENTRIES: usize = 200;

/// Action applied by [`bulk_apply`] to every entry in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkAction {
    AutoMatch,
    Ignore,
    Unmatch,
}

/// Apply one action to a batch of entries inside a single transaction.
///
/// Ids that do not exist (or belong to another tenant) and entries whose
/// status the action does not apply to are skipped, not errors: `ignore`
/// skips already-ignored entries, `unmatch` only reverts matched ones, and
/// `auto-match` only considers pending ones. Every touched statement has its
/// matched counter resynced before commit. Returns how many entries changed.
pub async fn bulk_apply(
    pool: &DbPool,
    tenant_id: i64,
    user_id: Option<i64>,
    action: BulkAction,
    entry_ids: &[i64],
) -> Result<usize, EngineError> {
    if entry_ids.is_empty() {
        return Err(EngineError::validation("entry_ids must not be empty"));
    }
    if entry_ids.len() > BULK_MAX_ENTRIES {
        return Err(EngineError::validation(format!(
            "at most {BULK_MAX_ENTRIES} entries per bulk call"
        )));
    }

    let mut tx = pool.begin().await?;
    let mut processed = 0usize;
    let mut touched: BTreeSet<i64> = BTreeSet::new();

    for &entry_id in entry_ids {
        let Some(entry) = storage::entries::get_entry(&mut tx, tenant_id, entry_id).await? else {
            continue;
        };

        let changed = match action {
            BulkAction::AutoMatch => matcher::try_match(&mut tx, &entry).await?,
            BulkAction::Ignore => {
                if entry.status == EntryStatus::Ignored {
                    false
                } else {
                    storage::obligations::release_for_entry(&mut tx, entry.id).await?;
                    storage::entries::apply_ignore(
                        &mut tx,
                        entry.id,
                        ReconciledBy::Manual,
                        user_id,
                        None,
                        None,
                    )
                    .await?;
                    true
                }
            }
            BulkAction::Unmatch => {
                if entry.status != EntryStatus::Matched {
                    false
                } else {
                    storage::obligations::release_for_entry(&mut tx, entry.id).await?;
                    storage::entries::clear_reconciliation(&mut tx, entry.id).await?;
                    true
                }
            }
        };

        if changed {
            processed += 1;
            touched.insert(entry.bank_statement_id);
        }
    }

    for statement_id in touched {
        storage::statements::sync_matched_entries(&mut tx, statement_id).await?;
    }

    tx.commit().await?;

    tracing::info!(?action, processed, "bulk reconciliation applied");

    Ok(processed)
}
