//! Shapes the storage aggregates into the dashboard and summary payloads.

use chrono::{NaiveDate, Utc};
use concilia_core::{Money, StatementEntry};
use concilia_storage::{self as storage, DbPool};
use serde::Serialize;

use crate::error::EngineError;

const STATUS_COLOR_PENDING: &str = "#f59e0b";
const STATUS_COLOR_MATCHED: &str = "#10b981";
const STATUS_COLOR_IGNORED: &str = "#6b7280";

const CATEGORY_LIMIT: i64 = 8;
const TOP_UNRECONCILED_LIMIT: i64 = 10;

/// Reporting window, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Trailing 30 days ending today, the dashboard default.
    pub fn trailing_30_days() -> Self {
        let end = Utc::now().date_naive();
        DateRange {
            start: end - chrono::Duration::days(30),
            end,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Kpis {
    pub total_entries: i64,
    pub pending: i64,
    pub matched: i64,
    pub ignored: i64,
    pub auto_matched: i64,
    pub manual_matched: i64,
    pub total_credits: Money,
    pub total_debits: Money,
    pub reconciliation_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct StatusSlice {
    pub name: &'static str,
    pub value: i64,
    pub color: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub credits: Money,
    pub debits: Money,
}

#[derive(Debug, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub pending: i64,
    pub matched: i64,
    pub ignored: i64,
}

#[derive(Debug, Serialize)]
pub struct CategorySlice {
    pub category: String,
    pub count: i64,
    pub amount: Money,
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub kpis: Kpis,
    pub status_distribution: Vec<StatusSlice>,
    pub weekly_data: Vec<WeeklyPoint>,
    pub daily_progress: Vec<DailyPoint>,
    pub categories: Vec<CategorySlice>,
    pub top_unreconciled: Vec<StatementEntry>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Percentage of entries matched, rounded to one decimal. Zero entries is a
/// 0.0 rate, not a division error.
fn reconciliation_rate(matched: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (matched as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Build the dashboard payload for a tenant over a window; `None` means the
/// trailing 30 days.
pub async fn summarize(
    pool: &DbPool,
    tenant_id: i64,
    range: Option<DateRange>,
) -> Result<DashboardData, EngineError> {
    let range = range.unwrap_or_else(DateRange::trailing_30_days);
    if range.start > range.end {
        return Err(EngineError::validation("period start is after period end"));
    }

    let kpis = storage::dashboard::kpi_counts(pool, tenant_id, range.start, range.end).await?;
    let weekly = storage::dashboard::weekly_series(pool, tenant_id, range.start, range.end).await?;
    let daily = storage::dashboard::daily_progress(pool, tenant_id, range.start, range.end).await?;
    let categories =
        storage::dashboard::category_breakdown(pool, tenant_id, range.start, range.end, CATEGORY_LIMIT)
            .await?;
    let top_unreconciled = storage::dashboard::top_unreconciled(
        pool,
        tenant_id,
        range.start,
        range.end,
        TOP_UNRECONCILED_LIMIT,
    )
    .await?;

    Ok(DashboardData {
        status_distribution: vec![
            StatusSlice {
                name: "pending",
                value: kpis.pending,
                color: STATUS_COLOR_PENDING,
            },
            StatusSlice {
                name: "matched",
                value: kpis.matched,
                color: STATUS_COLOR_MATCHED,
            },
            StatusSlice {
                name: "ignored",
                value: kpis.ignored,
                color: STATUS_COLOR_IGNORED,
            },
        ],
        weekly_data: weekly
            .into_iter()
            .map(|(week, credits, debits)| WeeklyPoint {
                week,
                credits: Money::from_cents(credits),
                debits: Money::from_cents(debits),
            })
            .collect(),
        daily_progress: daily
            .into_iter()
            .map(|(date, pending, matched, ignored)| DailyPoint {
                date,
                pending,
                matched,
                ignored,
            })
            .collect(),
        categories: categories
            .into_iter()
            .map(|(category, count, amount)| CategorySlice {
                category,
                count,
                amount: Money::from_cents(amount),
            })
            .collect(),
        top_unreconciled,
        kpis: Kpis {
            total_entries: kpis.total,
            pending: kpis.pending,
            matched: kpis.matched,
            ignored: kpis.ignored,
            auto_matched: kpis.auto_matched,
            manual_matched: kpis.manual_matched,
            total_credits: Money::from_cents(kpis.credits_cents),
            total_debits: Money::from_cents(kpis.debits_cents),
            reconciliation_rate: reconciliation_rate(kpis.matched, kpis.total),
        },
        period_start: range.start,
        period_end: range.end,
    })
}

#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub total_entries: i64,
    pub pending: i64,
    pub matched: i64,
    pub ignored: i64,
    pub total_credits: Money,
    pub total_debits: Money,
    pub possible_duplicates: i64,
    pub reconciliation_rate: f64,
}

/// All-time totals for a tenant, independent of any reporting window.
pub async fn summary(pool: &DbPool, tenant_id: i64) -> Result<TenantSummary, EngineError> {
    let counts = storage::dashboard::summary_counts(pool, tenant_id).await?;

    Ok(TenantSummary {
        total_entries: counts.total,
        pending: counts.pending,
        matched: counts.matched,
        ignored: counts.ignored,
        total_credits: Money::from_cents(counts.credits_cents),
        total_debits: Money::from_cents(counts.debits_cents),
        possible_duplicates: counts.duplicates,
        reconciliation_rate: reconciliation_rate(counts.matched, counts.total),
    })
}
