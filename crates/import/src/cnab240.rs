//! CNAB 240 return-file parser (FEBRABAN layout).
//!
//! A transaction is described by a pair of detail records: segment `T`
//! identifies the title (due date, amount, document number, payer), and the
//! following segment `U` carries the settled amount and payment dates. Header,
//! trailer and unrecognized segment records are skipped; real bank files
//! interleave them freely with the detail pairs.

use crate::util::{field, parse_cnab_amount, parse_cnab_date8};
use crate::{ParseOutcome, RawTransaction};

use chrono::NaiveDate;

struct SegmentT {
    document: String,
    due_date: Option<NaiveDate>,
    amount_cents: i64,
    description: String,
}

pub fn parse(data: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut seg_t: Option<SegmentT> = None;

    for line in data.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.chars().count() < 240 {
            outcome.skipped += 1;
            continue;
        }

        // Column 8: record type. Detail records are type 3; headers (0/1)
        // and trailers (5/9) carry no transactions.
        if field(line, 7, 1) != "3" {
            outcome.skipped += 1;
            continue;
        }

        match field(line, 13, 1).to_ascii_uppercase().as_str() {
            "T" => {
                if seg_t.is_some() {
                    // T without its U pair.
                    outcome.skipped += 1;
                }
                seg_t = Some(SegmentT {
                    document: field(line, 58, 15).trim().to_string(),
                    due_date: parse_cnab_date8(field(line, 73, 8)),
                    amount_cents: parse_cnab_amount(field(line, 81, 15)),
                    description: field(line, 105, 25).trim().to_string(),
                });
            }
            "U" => match seg_t.take() {
                Some(t) => {
                    let paid_cents = parse_cnab_amount(field(line, 77, 15));
                    let pay_date = parse_cnab_date8(field(line, 137, 8));
                    let credit_date = parse_cnab_date8(field(line, 145, 8));

                    let date = credit_date.or(pay_date).or(t.due_date);
                    let amount_cents = if paid_cents > 0 { paid_cents } else { t.amount_cents };

                    match date {
                        Some(date) => outcome.transactions.push(RawTransaction {
                            date,
                            amount_cents,
                            description: format!("{} Doc:{}", t.description, t.document)
                                .trim()
                                .to_string(),
                        }),
                        None => outcome.skipped += 1,
                    }
                }
                // U with no preceding T.
                None => outcome.skipped += 1,
            },
            _ => outcome.skipped += 1,
        }
    }

    if seg_t.is_some() {
        outcome.skipped += 1;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a 240-column record with `(offset, value)` fields on a space
    /// background.
    fn record(fields: &[(usize, &str)]) -> String {
        let mut chars: Vec<char> = vec![' '; 240];
        for (offset, value) in fields {
            for (i, c) in value.chars().enumerate() {
                chars[offset + i] = c;
            }
        }
        chars.into_iter().collect()
    }

    fn segment_t() -> String {
        record(&[
            (7, "3"),
            (13, "T"),
            (58, "DOC0001"),
            (73, "15012024"),                // due date
            (81, "000000000150075"),         // 1500.75
            (105, "COB TITULO ACME"),
        ])
    }

    fn segment_u() -> String {
        record(&[
            (7, "3"),
            (13, "U"),
            (77, "000000000150075"),         // paid amount
            (137, "14012024"),               // payment date
            (145, "16012024"),               // credit date
        ])
    }

    #[test]
    fn t_u_pair_yields_one_transaction() {
        let data = format!("{}\n{}\n", segment_t(), segment_u());
        let outcome = parse(&data);
        assert_eq!(outcome.transactions.len(), 1);

        let tx = &outcome.transactions[0];
        assert_eq!(tx.amount_cents, 150075);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(tx.description, "COB TITULO ACME Doc:DOC0001");
    }

    #[test]
    fn falls_back_to_title_amount_when_unpaid() {
        let u = record(&[(7, "3"), (13, "U"), (137, "14012024")]);
        let data = format!("{}\n{}\n", segment_t(), u);
        let outcome = parse(&data);
        assert_eq!(outcome.transactions[0].amount_cents, 150075);
        assert_eq!(
            outcome.transactions[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap()
        );
    }

    #[test]
    fn header_and_trailer_are_skipped() {
        let header = record(&[(7, "0")]);
        let trailer = record(&[(7, "9")]);
        let data = format!("{header}\n{}\n{}\n{trailer}\n", segment_t(), segment_u());
        let outcome = parse(&data);
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn filler_only_file_yields_zero_entries() {
        // Two lines of 240 zeros: right width, no valid segments.
        let line = "0".repeat(240);
        let data = format!("{line}\n{line}\n");
        let outcome = parse(&data);
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn orphan_u_is_skipped() {
        let data = format!("{}\n", segment_u());
        let outcome = parse(&data);
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn unpaired_trailing_t_is_skipped() {
        let data = format!("{}\n", segment_t());
        let outcome = parse(&data);
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn short_lines_are_skipped() {
        let outcome = parse("too short\n");
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.skipped, 1);
    }
}
