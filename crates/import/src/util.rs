//! Fixed-width field helpers shared by the CNAB parsers.

use chrono::NaiveDate;

/// Slice a fixed-width column out of a record line. Out-of-range or
/// non-boundary slices yield the empty string so a malformed line degrades
/// into a skipped record rather than a panic.
pub fn field(line: &str, start: usize, len: usize) -> &str {
    line.get(start..start + len).unwrap_or("")
}

/// CNAB amounts are unsigned integer cents with no decimal separator,
/// zero-padded. Anything non-numeric parses as zero.
pub fn parse_cnab_amount(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

/// `ddmmyyyy` date field. All-zero fields mean "no date". `get` slicing
/// keeps a stray multibyte character a skip, not a panic.
pub fn parse_cnab_date8(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || raw == "00000000" {
        return None;
    }
    let d: u32 = raw.get(0..2)?.parse().ok()?;
    let m: u32 = raw.get(2..4)?.parse().ok()?;
    let y: i32 = raw.get(4..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// `ddmmyy` date field with a 1950 pivot: `51`..`99` → 19xx, else 20xx.
pub fn parse_cnab_date6(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 6 || raw == "000000" {
        return None;
    }
    let d: u32 = raw.get(0..2)?.parse().ok()?;
    let m: u32 = raw.get(2..4)?.parse().ok()?;
    let yy: i32 = raw.get(4..6)?.parse().ok()?;
    let y = if yy > 50 { 1900 + yy } else { 2000 + yy };
    NaiveDate::from_ymd_opt(y, m, d)
}
