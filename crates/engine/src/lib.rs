pub mod dashboard;
pub mod error;
pub mod importer;
pub mod manual;
pub mod matcher;
pub mod rules;
pub(crate) mod util;

pub use dashboard::{summarize, summary, DashboardData, DateRange};
pub use error::EngineError;
pub use importer::{import_bytes, import_file, import_ofx, ImportReport};
pub use manual::{bulk_apply, ignore_entry, match_entry, unmatch_entry, BulkAction};
pub use matcher::{suggestions, try_match, Suggestion};
pub use rules::{dry_run, evaluate, learn_rule, rule_matches, validate_draft, DryRunReport};
