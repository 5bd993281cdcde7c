//! Automatic matching of statement entries against outstanding obligations.
//!
//! Credits pair with receivables, debits with payables; candidates must be
//! the same tenant with an outstanding amount exactly equal to the entry's.
//! Claiming is first-writer-wins on the obligation row, so two entries can
//! never hold the same obligation even when matched back to back.

use chrono::NaiveDate;
use concilia_core::{
    EntryStatus, EntryType, Money, Obligation, ObligationKind, ReconciledBy, StatementEntry,
};
use concilia_storage::{self as storage, MatchUpdate};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::EngineError;
use crate::util::description_similarity;

/// Obligation kind an entry of this type is allowed to match.
pub fn kind_for(entry_type: EntryType) -> ObligationKind {
    match entry_type {
        EntryType::Credit => ObligationKind::Receivable,
        EntryType::Debit => ObligationKind::Payable,
    }
}

/// Try to match one pending entry. Returns whether a match was made; finding
/// nothing is a normal outcome, not an error.
pub async fn try_match(
    conn: &mut SqliteConnection,
    entry: &StatementEntry,
) -> Result<bool, EngineError> {
    if entry.status != EntryStatus::Pending {
        return Ok(false);
    }

    let kind = kind_for(entry.entry_type);
    let cents = entry.amount.to_cents();

    // The candidate query excludes claimed obligations, so a failed claim
    // (raced by a concurrent match) just moves on to the next best candidate.
    loop {
        let Some(candidate) =
            storage::obligations::find_candidate(conn, entry.tenant_id, kind, cents, cents, entry.date)
                .await?
        else {
            return Ok(false);
        };

        if storage::obligations::claim(conn, candidate.id, entry.id).await? {
            storage::entries::apply_match(
                conn,
                entry.id,
                MatchUpdate {
                    kind,
                    obligation_id: candidate.id,
                    reconciled_by: ReconciledBy::Auto,
                    reconciled_by_user: None,
                    rule_id: None,
                    category: None,
                },
            )
            .await?;
            tracing::debug!(
                entry_id = entry.id,
                obligation_id = candidate.id,
                kind = %kind,
                "auto-matched entry"
            );
            return Ok(true);
        }
    }
}

/// Run the auto-matcher over every pending entry of a statement and resync
/// its matched counter. Returns the number of new matches.
pub async fn auto_match_statement(
    conn: &mut SqliteConnection,
    statement_id: i64,
) -> Result<usize, EngineError> {
    let pending = storage::entries::list_pending(conn, statement_id).await?;
    let mut matched = 0;

    for entry in &pending {
        if try_match(conn, entry).await? {
            matched += 1;
        }
    }

    storage::statements::sync_matched_entries(conn, statement_id).await?;

    Ok(matched)
}

/// A scored manual-match candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub kind: ObligationKind,
    pub id: i64,
    pub description: String,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub score: f64,
}

/// Score a candidate for an entry: value proximity is worth 50 points, due
/// date proximity 30 (minus 3 per day off), description similarity 20.
pub fn score_candidate(entry: &StatementEntry, obligation: &Obligation) -> f64 {
    let entry_cents = entry.amount.to_cents().max(1) as f64;
    let value_diff = (entry.amount.to_cents() - obligation.amount.to_cents()).abs() as f64;
    let value_score = (50.0 - value_diff / entry_cents * 100.0).max(0.0);

    let days_off = (entry.date - obligation.due_date).num_days().abs() as f64;
    let date_score = (30.0 - days_off * 3.0).max(0.0);

    let desc_score = description_similarity(&entry.description, &obligation.description) * 20.0;

    ((value_score + date_score + desc_score) * 100.0).round() / 100.0
}

/// Ranked match suggestions for an entry: same-kind outstanding obligations
/// within ±20% of the amount, best score first.
pub async fn suggestions(
    conn: &mut SqliteConnection,
    entry: &StatementEntry,
    limit: usize,
) -> Result<Vec<Suggestion>, EngineError> {
    let kind = kind_for(entry.entry_type);
    let cents = entry.amount.to_cents();
    let min = cents * 8 / 10;
    let max = cents * 12 / 10;

    let candidates =
        storage::obligations::list_near_amount(conn, entry.tenant_id, kind, min, max, 20).await?;

    let mut scored: Vec<Suggestion> = candidates
        .into_iter()
        .map(|ob| Suggestion {
            kind: ob.kind,
            id: ob.id,
            description: ob.description.clone(),
            amount: ob.amount,
            due_date: ob.due_date,
            score: score_candidate(entry, &ob),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    scored.truncate(limit);

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{date, pool, seed_entry, seed_obligation, seed_statement};
    use concilia_storage as storage;

    async fn fetch_entry(
        pool: &storage::DbPool,
        tenant: i64,
        id: i64,
    ) -> concilia_core::StatementEntry {
        let mut conn = pool.acquire().await.unwrap();
        storage::entries::get_entry(&mut conn, tenant, id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn exact_amount_matches() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED ACME",
        )
        .await;
        let ob = seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 16))
            .await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(try_match(&mut conn, &entry).await.unwrap());
        drop(conn);

        let entry = fetch_entry(&pool, 1, entry_id).await;
        assert_eq!(entry.status, EntryStatus::Matched);
        assert_eq!(entry.matched_kind, Some(ObligationKind::Receivable));
        assert_eq!(entry.matched_id, Some(ob));
        assert_eq!(entry.reconciled_by, Some(ReconciledBy::Auto));
    }

    #[tokio::test]
    async fn no_tolerance_on_amount() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED",
        )
        .await;
        // 999.99, not 500.00.
        seed_obligation(&pool, 1, ObligationKind::Receivable, 99999, 0, date(2024, 1, 15)).await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(!try_match(&mut conn, &entry).await.unwrap());
    }

    #[tokio::test]
    async fn outstanding_amount_accounts_for_partial_payment() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 30000, date(2024, 1, 15), "TED",
        )
        .await;
        // 500.00 with 200.00 already paid: outstanding 300.00.
        let ob = seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 20000, date(2024, 1, 15))
            .await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(try_match(&mut conn, &entry).await.unwrap());
        drop(conn);
        assert_eq!(fetch_entry(&pool, 1, entry_id).await.matched_id, Some(ob));
    }

    #[tokio::test]
    async fn debit_never_matches_receivable() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Debit, 50000, date(2024, 1, 15), "PAGTO",
        )
        .await;
        seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 15)).await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(!try_match(&mut conn, &entry).await.unwrap());
    }

    #[tokio::test]
    async fn credit_never_matches_payable() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED",
        )
        .await;
        seed_obligation(&pool, 1, ObligationKind::Payable, 50000, 0, date(2024, 1, 15)).await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(!try_match(&mut conn, &entry).await.unwrap());
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED",
        )
        .await;
        seed_obligation(&pool, 2, ObligationKind::Receivable, 50000, 0, date(2024, 1, 15)).await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(!try_match(&mut conn, &entry).await.unwrap());
    }

    #[tokio::test]
    async fn tie_break_prefers_closest_due_date() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED",
        )
        .await;
        seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 25)).await;
        let close = seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 16))
            .await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(try_match(&mut conn, &entry).await.unwrap());
        drop(conn);
        assert_eq!(fetch_entry(&pool, 1, entry_id).await.matched_id, Some(close));
    }

    #[tokio::test]
    async fn equal_distance_tie_break_is_stable() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED",
        )
        .await;
        let first = seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 14))
            .await;
        seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 16)).await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        try_match(&mut conn, &entry).await.unwrap();
        drop(conn);
        // Same one-day distance either side: lowest id wins.
        assert_eq!(fetch_entry(&pool, 1, entry_id).await.matched_id, Some(first));
    }

    #[tokio::test]
    async fn two_entries_never_claim_one_obligation() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let first = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED A",
        )
        .await;
        let second = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED B",
        )
        .await;
        seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 15)).await;

        let mut conn = pool.acquire().await.unwrap();
        let matched = auto_match_statement(&mut conn, stmt).await.unwrap();
        drop(conn);

        assert_eq!(matched, 1);
        let a = fetch_entry(&pool, 1, first).await;
        let b = fetch_entry(&pool, 1, second).await;
        assert_eq!(a.status, EntryStatus::Matched);
        assert_eq!(b.status, EntryStatus::Pending);
    }

    #[tokio::test]
    async fn auto_match_syncs_statement_counter() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        seed_entry(&pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "A").await;
        seed_entry(&pool, 1, stmt, EntryType::Credit, 70000, date(2024, 1, 15), "B").await;
        seed_obligation(&pool, 1, ObligationKind::Receivable, 50000, 0, date(2024, 1, 15)).await;

        let mut conn = pool.acquire().await.unwrap();
        auto_match_statement(&mut conn, stmt).await.unwrap();
        let statement = storage::statements::get_statement(&mut conn, 1, stmt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(statement.matched_entries, 1);
    }

    #[tokio::test]
    async fn suggestions_ranked_by_score() {
        let pool = pool().await;
        let stmt = seed_statement(&pool, 1).await;
        let entry_id = seed_entry(
            &pool, 1, stmt, EntryType::Credit, 50000, date(2024, 1, 15), "TED ACME LTDA",
        )
        .await;
        // Exact amount, close date, similar description: should rank first.
        let mut conn = pool.acquire().await.unwrap();
        let best = storage::obligations::insert_obligation(
            &mut conn,
            storage::NewObligation {
                tenant_id: 1,
                kind: ObligationKind::Receivable,
                description: "ACME LTDA",
                amount_cents: 50000,
                paid_cents: 0,
                due_date: date(2024, 1, 16),
                status: concilia_core::ObligationStatus::Pending,
            },
        )
        .await
        .unwrap();
        drop(conn);
        seed_obligation(&pool, 1, ObligationKind::Receivable, 55000, 0, date(2024, 2, 20)).await;

        let entry = fetch_entry(&pool, 1, entry_id).await;
        let mut conn = pool.acquire().await.unwrap();
        let result = suggestions(&mut conn, &entry, 5).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, best);
        assert!(result[0].score > result[1].score);
    }

    #[test]
    fn perfect_candidate_scores_near_hundred() {
        use concilia_core::{Money, Obligation, ObligationStatus};
        let entry = concilia_core::StatementEntry {
            id: 1,
            bank_statement_id: 1,
            tenant_id: 1,
            date: date(2024, 1, 15),
            description: "TED ACME".into(),
            amount: Money::from_cents(50000),
            entry_type: EntryType::Credit,
            status: EntryStatus::Pending,
            category: None,
            possible_duplicate: false,
            matched_kind: None,
            matched_id: None,
            reconciled_by: None,
            reconciled_at: None,
            reconciled_by_user: None,
            rule_id: None,
        };
        let ob = Obligation {
            id: 9,
            tenant_id: 1,
            kind: ObligationKind::Receivable,
            description: "TED ACME".into(),
            amount: Money::from_cents(50000),
            paid: Money::zero(),
            due_date: date(2024, 1, 15),
            status: ObligationStatus::Pending,
            matched_entry_id: None,
        };
        assert_eq!(score_candidate(&entry, &ob), 100.0);
    }
}
