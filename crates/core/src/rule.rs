use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

/// Which entry field a rule condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Description,
    Amount,
    Type,
}

impl RuleField {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleField::Description => "description",
            RuleField::Amount => "amount",
            RuleField::Type => "type",
        }
    }
}

impl FromStr for RuleField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(RuleField::Description),
            "amount" => Ok(RuleField::Amount),
            "type" => Ok(RuleField::Type),
            other => Err(format!("unknown rule field: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Contains,
    StartsWith,
    Equals,
    Between,
}

impl RuleOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleOperator::Contains => "contains",
            RuleOperator::StartsWith => "starts_with",
            RuleOperator::Equals => "equals",
            RuleOperator::Between => "between",
        }
    }
}

impl FromStr for RuleOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(RuleOperator::Contains),
            "starts_with" => Ok(RuleOperator::StartsWith),
            "equals" => Ok(RuleOperator::Equals),
            "between" => Ok(RuleOperator::Between),
            other => Err(format!("unknown rule operator: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Categorize,
    Ignore,
    AutoMatch,
}

impl RuleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleAction::Categorize => "categorize",
            RuleAction::Ignore => "ignore",
            RuleAction::AutoMatch => "auto_match",
        }
    }
}

impl FromStr for RuleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categorize" => Ok(RuleAction::Categorize),
            "ignore" => Ok(RuleAction::Ignore),
            "auto_match" => Ok(RuleAction::AutoMatch),
            other => Err(format!("unknown rule action: '{other}'")),
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined reconciliation rule, evaluated as data by the rule engine.
///
/// Lower `priority` wins; the first matching active rule is applied and
/// evaluation stops for that entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRule {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub match_field: RuleField,
    pub match_operator: RuleOperator,
    pub match_value: Option<String>,
    pub match_amount_min: Option<Money>,
    pub match_amount_max: Option<Money>,
    pub action: RuleAction,
    pub category: Option<String>,
    pub priority: i64,
    pub is_active: bool,
    pub times_applied: i64,
    pub created_at: DateTime<Utc>,
}

/// An unsaved rule, as submitted by a caller for creation, update, or a
/// dry run against existing entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub match_field: RuleField,
    pub match_operator: RuleOperator,
    #[serde(default)]
    pub match_value: Option<String>,
    #[serde(default)]
    pub match_amount_min: Option<Money>,
    #[serde(default)]
    pub match_amount_max: Option<Money>,
    pub action: RuleAction,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_priority() -> i64 {
    100
}

fn default_active() -> bool {
    true
}
