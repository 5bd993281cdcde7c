pub mod money;
pub mod obligation;
pub mod rule;
pub mod statement;

pub use money::Money;
pub use obligation::{Obligation, ObligationKind, ObligationStatus};
pub use rule::{ReconciliationRule, RuleAction, RuleDraft, RuleField, RuleOperator};
pub use statement::{
    BankStatement, EntryStatus, EntryType, ReconciledBy, StatementEntry, StatementFormat,
};
