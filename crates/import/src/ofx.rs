//! OFX statement parser.
//!
//! OFX is SGML-like: value tags are usually unclosed, so the parser walks
//! the file line by line instead of expecting well-formed XML. Only the
//! `STMTTRN` transaction blocks matter here; account and date-range tags
//! are irrelevant to reconciliation and are ignored.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::{ParseOutcome, RawTransaction};

pub fn parse(data: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut current: Option<BuildingTrx> = None;

    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(tag) = line.strip_prefix('<') else {
            continue;
        };

        let (tag_name, value) = if let Some((name, val)) = tag.split_once('>') {
            (name.trim(), Some(val.trim()))
        } else {
            (tag.trim_end_matches(&['>', '\r', '\n'][..]), None)
        };

        match tag_name.to_uppercase().as_str() {
            "STMTTRN" => {
                // A new block while one is open means the previous one never
                // closed; it is dropped, not fatal.
                if current.replace(BuildingTrx::default()).is_some() {
                    outcome.skipped += 1;
                }
            }
            "/STMTTRN" => {
                if let Some(trx) = current.take() {
                    match trx.finish() {
                        Some(raw) => outcome.transactions.push(raw),
                        None => outcome.skipped += 1,
                    }
                }
            }
            other => {
                if let Some(ref mut trx) = current {
                    match other {
                        "DTPOSTED" => {
                            trx.date = value.and_then(parse_ofx_date);
                        }
                        "TRNAMT" => {
                            trx.amount_cents = value.and_then(parse_ofx_amount);
                        }
                        "MEMO" => {
                            trx.memo = value.map(str::to_string);
                        }
                        "NAME" => {
                            trx.name = value.map(str::to_string);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    // Unterminated trailing block.
    if current.is_some() {
        outcome.skipped += 1;
    }

    outcome
}

#[derive(Default)]
struct BuildingTrx {
    date: Option<NaiveDate>,
    amount_cents: Option<i64>,
    memo: Option<String>,
    name: Option<String>,
}

impl BuildingTrx {
    /// A block needs at least a posting date and an amount to become a
    /// transaction; the description falls back from MEMO to NAME to empty.
    fn finish(self) -> Option<RawTransaction> {
        Some(RawTransaction {
            date: self.date?,
            amount_cents: self.amount_cents?,
            description: self.memo.or(self.name).unwrap_or_default(),
        })
    }
}

/// Parse the `YYYYMMDD` prefix of an OFX datetime. Banks append time and
/// timezone suffixes like `120000[-3:BRT]`; only the first 8 digits count.
/// `get` slicing keeps a stray multibyte character a skip, not a panic.
fn parse_ofx_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let y: i32 = s.get(0..4)?.parse().ok()?;
    let m: u32 = s.get(4..6)?.parse().ok()?;
    let d: u32 = s.get(6..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn parse_ofx_amount(s: &str) -> Option<i64> {
    let s = s.trim().replace(',', "");
    let dec = Decimal::from_str(&s).ok()?;
    (dec * Decimal::from(100)).round().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── unit helpers ──────────────────────────────────────────────────────────

    #[test]
    fn parse_ofx_date_8digit() {
        assert_eq!(
            parse_ofx_date("20240115"),
            Some(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn parse_ofx_date_with_time_suffix_ignored() {
        assert_eq!(
            parse_ofx_date("20240115120000[-3:BRT]"),
            Some(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn parse_ofx_date_invalid_returns_none() {
        assert_eq!(parse_ofx_date("not-a-date"), None);
        assert_eq!(parse_ofx_date(""), None);
        assert_eq!(parse_ofx_date("20241345"), None);
    }

    #[test]
    fn parse_ofx_date_multibyte_returns_none() {
        // A multibyte character landing on a digit position must not panic.
        assert_eq!(parse_ofx_date("20一0115"), None);
        assert_eq!(parse_ofx_date("2024011ç"), None);
        assert_eq!(parse_ofx_date("é0240115"), None);
    }

    #[test]
    fn parse_ofx_amount_signed() {
        assert_eq!(parse_ofx_amount("1500.75"), Some(150075));
        assert_eq!(parse_ofx_amount("-320.00"), Some(-32000));
        assert_eq!(parse_ofx_amount("0.01"), Some(1));
    }

    #[test]
    fn parse_ofx_amount_with_commas() {
        assert_eq!(parse_ofx_amount("1,234.56"), Some(123456));
    }

    #[test]
    fn parse_ofx_amount_invalid_returns_none() {
        assert_eq!(parse_ofx_amount("abc"), None);
        assert_eq!(parse_ofx_amount(""), None);
    }

    // ── full parse ────────────────────────────────────────────────────────────

    const SAMPLE_OFX: &str = r#"
OFXHEADER:100
DATA:OFXSGML
VERSION:102

<OFX>
<BANKMSGSRSV1>
<STMTTRNRS>
<STMTRS>
<CURDEF>BRL
<BANKTRANLIST>
<DTSTART>20240101
<DTEND>20240131
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20240110
<TRNAMT>1500.75
<FITID>TXN001
<MEMO>TED RECEBIDA CLIENTE ACME
</STMTTRN>
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20240112
<TRNAMT>-320.00
<FITID>TXN002
<NAME>PAGTO FORNECEDOR BETA
</STMTTRN>
</BANKTRANLIST>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
"#;

    #[test]
    fn parses_both_transactions() {
        let outcome = parse(SAMPLE_OFX);
        assert_eq!(outcome.transactions.len(), 2);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn keeps_amount_sign() {
        let outcome = parse(SAMPLE_OFX);
        assert_eq!(outcome.transactions[0].amount_cents, 150075);
        assert_eq!(outcome.transactions[1].amount_cents, -32000);
    }

    #[test]
    fn description_prefers_memo_falls_back_to_name() {
        let outcome = parse(SAMPLE_OFX);
        assert_eq!(outcome.transactions[0].description, "TED RECEBIDA CLIENTE ACME");
        assert_eq!(outcome.transactions[1].description, "PAGTO FORNECEDOR BETA");
    }

    #[test]
    fn dates_normalized() {
        let outcome = parse(SAMPLE_OFX);
        assert_eq!(
            outcome.transactions[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        );
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let data = r#"
<OFX>
<STMTTRN>
<MEMO>no amount or date here
</STMTTRN>
<STMTTRN>
<DTPOSTED>20240115
<TRNAMT>10.00
</STMTTRN>
</OFX>
"#;
        let outcome = parse(data);
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn zero_transactions_is_valid() {
        let outcome = parse("<OFX><BANKMSGSRSV1></BANKMSGSRSV1></OFX>");
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn unterminated_block_counts_as_skipped() {
        let data = "<OFX>\n<STMTTRN>\n<DTPOSTED>20240115\n<TRNAMT>10.00\n";
        let outcome = parse(data);
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn multibyte_garbage_in_date_skips_block() {
        let data = r#"
<OFX>
<STMTTRN>
<DTPOSTED>20一0115
<TRNAMT>10.00
</STMTTRN>
<STMTTRN>
<DTPOSTED>20240116
<TRNAMT>25.00
</STMTTRN>
</OFX>
"#;
        let outcome = parse(data);
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.transactions[0].amount_cents, 2500);
    }
}
