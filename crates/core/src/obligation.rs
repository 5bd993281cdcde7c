use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

/// The two kinds of financial obligation an entry can be matched against.
///
/// Acts as the discriminant of the polymorphic `matched_kind`/`matched_id`
/// reference on entries. Short aliases from API callers resolve through
/// [`ObligationKind::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationKind {
    Receivable,
    Payable,
}

impl ObligationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObligationKind::Receivable => "receivable",
            ObligationKind::Payable => "payable",
        }
    }

    /// Resolve a caller-supplied kind name, short alias or fully-qualified,
    /// to the concrete kind. Pure lookup, no reflection.
    pub fn resolve(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "receivable" | "account_receivable" | "accountreceivable" | "accounts_receivable" => {
                Some(ObligationKind::Receivable)
            }
            "payable" | "account_payable" | "accountpayable" | "accounts_payable" => {
                Some(ObligationKind::Payable)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ObligationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObligationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receivable" => Ok(ObligationKind::Receivable),
            "payable" => Ok(ObligationKind::Payable),
            other => Err(format!("unknown obligation kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationStatus {
    Pending,
    Partial,
    Settled,
}

impl ObligationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ObligationStatus::Pending => "pending",
            ObligationStatus::Partial => "partial",
            ObligationStatus::Settled => "settled",
        }
    }
}

impl FromStr for ObligationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ObligationStatus::Pending),
            "partial" => Ok(ObligationStatus::Partial),
            "settled" => Ok(ObligationStatus::Settled),
            other => Err(format!("unknown obligation status: '{other}'")),
        }
    }
}

/// A receivable or payable this engine matches entries against.
///
/// Owned by the wider financial module; the engine reads outstanding
/// amount/due date/tenant and writes back the claim marker only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    pub id: i64,
    pub tenant_id: i64,
    pub kind: ObligationKind,
    pub description: String,
    pub amount: Money,
    pub paid: Money,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
    /// Entry currently claiming this obligation, if any. At most one entry
    /// may hold the claim at a time.
    pub matched_entry_id: Option<i64>,
}

impl Obligation {
    pub fn outstanding(&self) -> Money {
        self.amount - self.paid
    }
}
