use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;
use crate::obligation::ObligationKind;

/// Bank statement file formats the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Ofx,
    Cnab240,
    Cnab400,
}

impl StatementFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementFormat::Ofx => "ofx",
            StatementFormat::Cnab240 => "cnab240",
            StatementFormat::Cnab400 => "cnab400",
        }
    }
}

impl fmt::Display for StatementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ofx" => Ok(StatementFormat::Ofx),
            "cnab240" => Ok(StatementFormat::Cnab240),
            "cnab400" => Ok(StatementFormat::Cnab400),
            other => Err(format!("unknown statement format: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
        }
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(EntryType::Credit),
            "debit" => Ok(EntryType::Debit),
            other => Err(format!("unknown entry type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Matched,
    Ignored,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Matched => "matched",
            EntryStatus::Ignored => "ignored",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "matched" => Ok(EntryStatus::Matched),
            "ignored" => Ok(EntryStatus::Ignored),
            other => Err(format!("unknown entry status: '{other}'")),
        }
    }
}

/// Who reconciled an entry. `None` on the entry itself means still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciledBy {
    Auto,
    Manual,
    Rule,
}

impl ReconciledBy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconciledBy::Auto => "auto",
            ReconciledBy::Manual => "manual",
            ReconciledBy::Rule => "rule",
        }
    }
}

impl FromStr for ReconciledBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ReconciledBy::Auto),
            "manual" => Ok(ReconciledBy::Manual),
            "rule" => Ok(ReconciledBy::Rule),
            other => Err(format!("unknown reconciled_by: '{other}'")),
        }
    }
}

/// One imported bank statement file.
///
/// `matched_entries` is denormalized and must always equal the count of
/// entries in `matched` status; it is recomputed from a count query after
/// every mutation, never incremented in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStatement {
    pub id: i64,
    pub tenant_id: i64,
    pub filename: String,
    pub format: StatementFormat,
    pub imported_at: DateTime<Utc>,
    pub created_by: i64,
    pub total_entries: i64,
    pub matched_entries: i64,
}

/// One normalized transaction line within a statement.
///
/// Invariant: `matched_kind` and `matched_id` are both set or both `None`;
/// `Matched` status implies both set, `Ignored` implies both cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementEntry {
    pub id: i64,
    pub bank_statement_id: i64,
    pub tenant_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub category: Option<String>,
    pub possible_duplicate: bool,
    pub matched_kind: Option<ObligationKind>,
    pub matched_id: Option<i64>,
    pub reconciled_by: Option<ReconciledBy>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub reconciled_by_user: Option<i64>,
    pub rule_id: Option<i64>,
}

impl StatementEntry {
    pub fn is_matched(&self) -> bool {
        self.status == EntryStatus::Matched
    }
}
