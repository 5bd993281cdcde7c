//! CNAB 400 return-file parser.
//!
//! The older fixed-width layout: one type-1 detail record per settled title.
//! Type 0 (header) and type 9 (trailer) records are skipped, as is anything
//! that does not fill the 400 columns.

use crate::util::{field, parse_cnab_amount, parse_cnab_date6};
use crate::{ParseOutcome, RawTransaction};

pub fn parse(data: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for line in data.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.chars().count() < 400 {
            outcome.skipped += 1;
            continue;
        }

        if field(line, 0, 1) != "1" {
            outcome.skipped += 1;
            continue;
        }

        let amount_cents = parse_cnab_amount(field(line, 152, 13));
        let paid_cents = parse_cnab_amount(field(line, 253, 13));
        let due_date = parse_cnab_date6(field(line, 110, 6));
        let credit_date = parse_cnab_date6(field(line, 295, 6));
        let document = field(line, 116, 10).trim();
        let description = field(line, 31, 12).trim();

        let Some(date) = credit_date.or(due_date) else {
            outcome.skipped += 1;
            continue;
        };

        outcome.transactions.push(RawTransaction {
            date,
            amount_cents: if paid_cents > 0 { paid_cents } else { amount_cents },
            description: format!("{description} Doc:{document}").trim().to_string(),
        });
    }

    outcome
}
