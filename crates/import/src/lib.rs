pub mod cnab240;
pub mod cnab400;
pub mod detect;
pub mod ofx;
pub(crate) mod util;

pub use detect::{detect_format, DetectError};

use chrono::NaiveDate;
use concilia_core::StatementFormat;

/// One transaction extracted from a statement file, before normalization.
///
/// The amount keeps its sign; the importer splits it into an unsigned
/// magnitude plus credit/debit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount_cents: i64,
}

/// Result of a best-effort parse: whatever transactions could be extracted,
/// plus the number of lines or blocks that were examined and rejected.
///
/// Per-line anomalies never fail the parse; zero transactions is a valid
/// outcome for a file of filler records.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub transactions: Vec<RawTransaction>,
    pub skipped: usize,
}

/// Run the parser matching an already-detected format.
pub fn parse(format: StatementFormat, content: &[u8]) -> ParseOutcome {
    let text = String::from_utf8_lossy(content);
    match format {
        StatementFormat::Ofx => ofx::parse(&text),
        StatementFormat::Cnab240 => cnab240::parse(&text),
        StatementFormat::Cnab400 => cnab400::parse(&text),
    }
}
