//! Priority-ordered rule engine.
//!
//! Rules are tenant data evaluated against pending entries: the first active
//! rule that matches (lowest priority number, then lowest id) is applied and
//! evaluation stops for that entry. A rule's usage counter only moves when
//! its action actually changed the entry.

use concilia_core::{
    EntryStatus, Money, ReconciliationRule, ReconciledBy, RuleAction, RuleDraft, RuleField,
    RuleOperator, StatementEntry,
};
use concilia_storage::{self as storage, DbPool, MatchUpdate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::str::FromStr;

use crate::error::EngineError;
use crate::matcher;

/// How many recent entries a dry run samples from.
const DRY_RUN_SCAN: i64 = 500;

struct Condition<'a> {
    field: RuleField,
    operator: RuleOperator,
    value: Option<&'a str>,
    min: Option<Money>,
    max: Option<Money>,
}

impl<'a> Condition<'a> {
    fn of_rule(rule: &'a ReconciliationRule) -> Self {
        Condition {
            field: rule.match_field,
            operator: rule.match_operator,
            value: rule.match_value.as_deref(),
            min: rule.match_amount_min,
            max: rule.match_amount_max,
        }
    }

    fn of_draft(draft: &'a RuleDraft) -> Self {
        Condition {
            field: draft.match_field,
            operator: draft.match_operator,
            value: draft.match_value.as_deref(),
            min: draft.match_amount_min,
            max: draft.match_amount_max,
        }
    }

    fn matches(&self, entry: &StatementEntry) -> bool {
        match self.field {
            RuleField::Description => {
                let Some(value) = self.value else {
                    return false;
                };
                let haystack = entry.description.to_lowercase();
                let needle = value.to_lowercase();
                match self.operator {
                    RuleOperator::Contains => haystack.contains(&needle),
                    RuleOperator::StartsWith => haystack.starts_with(&needle),
                    RuleOperator::Equals => haystack == needle,
                    RuleOperator::Between => false,
                }
            }
            RuleField::Amount => match self.operator {
                RuleOperator::Equals => self
                    .value
                    .and_then(parse_amount)
                    .map(|v| entry.amount == v)
                    .unwrap_or(false),
                RuleOperator::Between => match (self.min, self.max) {
                    (Some(min), Some(max)) => entry.amount >= min && entry.amount <= max,
                    _ => false,
                },
                _ => false,
            },
            RuleField::Type => match self.operator {
                RuleOperator::Equals => self
                    .value
                    .map(|v| v.eq_ignore_ascii_case(entry.entry_type.as_str()))
                    .unwrap_or(false),
                _ => false,
            },
        }
    }
}

fn parse_amount(raw: &str) -> Option<Money> {
    Decimal::from_str(raw.trim()).ok().map(Money::from_decimal)
}

/// Whether a stored rule's condition matches an entry. Pure; applies no
/// action.
pub fn rule_matches(rule: &ReconciliationRule, entry: &StatementEntry) -> bool {
    Condition::of_rule(rule).matches(entry)
}

/// Validate a draft before it is saved or dry-run.
pub fn validate_draft(draft: &RuleDraft) -> Result<(), EngineError> {
    if draft.name.trim().is_empty() {
        return Err(EngineError::validation("rule name must not be empty"));
    }

    match draft.match_field {
        RuleField::Description => {
            if draft.match_operator == RuleOperator::Between {
                return Err(EngineError::validation(
                    "operator 'between' is only valid for the amount field",
                ));
            }
            if draft.match_value.as_deref().unwrap_or("").trim().is_empty() {
                return Err(EngineError::validation(
                    "description rules require a match_value",
                ));
            }
        }
        RuleField::Amount => match draft.match_operator {
            RuleOperator::Equals => {
                let value = draft.match_value.as_deref().unwrap_or("");
                if parse_amount(value).is_none() {
                    return Err(EngineError::validation(
                        "amount rules with 'equals' require a numeric match_value",
                    ));
                }
            }
            RuleOperator::Between => {
                let (Some(min), Some(max)) = (draft.match_amount_min, draft.match_amount_max)
                else {
                    return Err(EngineError::validation(
                        "amount rules with 'between' require match_amount_min and match_amount_max",
                    ));
                };
                if min > max {
                    return Err(EngineError::validation(
                        "match_amount_min must not exceed match_amount_max",
                    ));
                }
            }
            _ => {
                return Err(EngineError::validation(
                    "amount rules support only 'equals' and 'between'",
                ));
            }
        },
        RuleField::Type => {
            if draft.match_operator != RuleOperator::Equals {
                return Err(EngineError::validation(
                    "type rules support only 'equals'",
                ));
            }
            let value = draft.match_value.as_deref().unwrap_or("").trim().to_lowercase();
            if value != "credit" && value != "debit" {
                return Err(EngineError::validation(
                    "type rules require match_value 'credit' or 'debit'",
                ));
            }
        }
    }

    if draft.action == RuleAction::Categorize
        && draft.category.as_deref().unwrap_or("").trim().is_empty()
    {
        return Err(EngineError::validation(
            "categorize rules require a category",
        ));
    }

    Ok(())
}

/// Evaluate the tenant's active rules against one entry and apply the first
/// match. Returns the id of the applied rule, or None when no rule matched.
///
/// Evaluation stops at the first matching rule even when its action ends up
/// changing nothing (an auto_match with no claimable candidate): the rule
/// won the entry, lower-priority rules never see it.
pub async fn evaluate(
    conn: &mut SqliteConnection,
    entry: &StatementEntry,
) -> Result<Option<i64>, EngineError> {
    if entry.status != EntryStatus::Pending {
        return Ok(None);
    }

    let rules = storage::rules::active_rules(conn, entry.tenant_id).await?;
    for rule in &rules {
        if !rule_matches(rule, entry) {
            continue;
        }

        let changed = apply_action(conn, rule, entry).await?;
        if changed {
            storage::rules::increment_times_applied(conn, rule.id).await?;
            tracing::debug!(
                entry_id = entry.id,
                rule_id = rule.id,
                action = %rule.action,
                "rule applied"
            );
        }
        return Ok(changed.then_some(rule.id));
    }

    Ok(None)
}

async fn apply_action(
    conn: &mut SqliteConnection,
    rule: &ReconciliationRule,
    entry: &StatementEntry,
) -> Result<bool, EngineError> {
    match rule.action {
        RuleAction::Ignore => {
            storage::entries::apply_ignore(
                conn,
                entry.id,
                ReconciledBy::Rule,
                None,
                Some(rule.id),
                rule.category.as_deref(),
            )
            .await?;
            Ok(true)
        }
        RuleAction::Categorize => {
            let Some(category) = rule.category.as_deref() else {
                return Ok(false);
            };
            storage::entries::set_category(conn, entry.id, category, rule.id).await?;
            Ok(true)
        }
        RuleAction::AutoMatch => auto_match_action(conn, rule, entry).await,
    }
}

/// The auto_match action reuses the matcher's candidate search, but an
/// amount-conditioned rule substitutes its own window for the exact-amount
/// default.
async fn auto_match_action(
    conn: &mut SqliteConnection,
    rule: &ReconciliationRule,
    entry: &StatementEntry,
) -> Result<bool, EngineError> {
    let kind = matcher::kind_for(entry.entry_type);
    let (min, max) = amount_window(rule, entry);

    loop {
        let Some(candidate) =
            storage::obligations::find_candidate(conn, entry.tenant_id, kind, min, max, entry.date)
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
                    reconciled_by: ReconciledBy::Rule,
                    reconciled_by_user: None,
                    rule_id: Some(rule.id),
                    category: rule.category.as_deref(),
                },
            )
            .await?;
            return Ok(true);
        }
    }
}

fn amount_window(rule: &ReconciliationRule, entry: &StatementEntry) -> (i64, i64) {
    if rule.match_field == RuleField::Amount && rule.match_operator == RuleOperator::Between {
        if let (Some(min), Some(max)) = (rule.match_amount_min, rule.match_amount_max) {
            return (min.to_cents(), max.to_cents());
        }
    }
    let cents = entry.amount.to_cents();
    (cents, cents)
}

/// Run the tenant's rules over every pending entry of a statement and resync
/// its matched counter. Returns the number of entries changed.
pub async fn apply_rules(
    conn: &mut SqliteConnection,
    statement_id: i64,
) -> Result<usize, EngineError> {
    let pending = storage::entries::list_pending(conn, statement_id).await?;
    let mut changed = 0;

    for entry in &pending {
        if evaluate(conn, entry).await?.is_some() {
            changed += 1;
        }
    }

    storage::statements::sync_matched_entries(conn, statement_id).await?;

    Ok(changed)
}

/// Outcome of a dry run: how many recent entries the draft would touch, and
/// a small sample of them. Nothing is persisted.
#[derive(Debug, Serialize)]
pub struct DryRunReport {
    pub total_matched: usize,
    pub sample: Vec<StatementEntry>,
}

/// Test a draft against the tenant's most recent entries without applying
/// anything.
pub async fn dry_run(
    pool: &DbPool,
    tenant_id: i64,
    draft: &RuleDraft,
    sample_limit: usize,
) -> Result<DryRunReport, EngineError> {
    validate_draft(draft)?;

    let condition = Condition::of_draft(draft);
    let entries = storage::entries::list_recent(pool, tenant_id, DRY_RUN_SCAN).await?;

    let matched: Vec<StatementEntry> = entries
        .into_iter()
        .filter(|e| condition.matches(e))
        .collect();

    let total_matched = matched.len();
    let sample = matched.into_iter().take(sample_limit).collect();

    Ok(DryRunReport {
        total_matched,
        sample,
    })
}

/// Propose a draft rule from a matched entry, keyed on the most distinctive
/// words of its description. Only a confirmed match is worth learning from;
/// anything else yields None.
pub fn learn_rule(entry: &StatementEntry) -> Option<RuleDraft> {
    if entry.status != EntryStatus::Matched {
        return None;
    }

    let words: Vec<String> = entry
        .description
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .take(3)
        .map(str::to_string)
        .collect();

    // Descriptions with no distinctive word key on their full text.
    let value = if words.is_empty() {
        let whole = entry.description.trim().to_lowercase();
        if whole.is_empty() {
            return None;
        }
        whole
    } else {
        words.join(" ")
    };

    // Categorize without a category would never validate; uncategorized
    // entries learn a matching rule instead.
    let (action, category) = match entry.category.clone() {
        Some(category) => (RuleAction::Categorize, Some(category)),
        None => (RuleAction::AutoMatch, None),
    };

    let title: String = entry.description.chars().take(60).collect();
    Some(RuleDraft {
        name: format!("Auto: {title}"),
        match_field: RuleField::Description,
        match_operator: RuleOperator::Contains,
        match_value: Some(value),
        match_amount_min: None,
        match_amount_max: None,
        action,
        category,
        // Learned rules outrank the default priority so they win over
        // broader hand-written catch-alls.
        priority: 50,
        is_active: true,
    })
}
