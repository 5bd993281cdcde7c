use concilia_core::StatementFormat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("unsupported statement format")]
    UnsupportedFormat,
}

/// How many leading bytes to scan for the `<OFX>` token. OFX headers are a
/// short key/value preamble, so the tag shows up well within this window.
const OFX_SCAN_WINDOW: usize = 512;

/// Classify raw statement content as OFX, CNAB240 or CNAB400.
///
/// OFX detection is content-first: the `<OFX>` token wins regardless of
/// extension, and the `.ofx` extension alone is accepted as a fallback.
/// CNAB has no self-describing marker, so it is classified by the exact
/// length of the first non-empty line (240 or 400 columns).
pub fn detect_format(
    filename: Option<&str>,
    content: &[u8],
) -> Result<StatementFormat, DetectError> {
    let head = &content[..content.len().min(OFX_SCAN_WINDOW)];
    let head = String::from_utf8_lossy(head).to_uppercase();
    if head.contains("<OFX>") {
        return Ok(StatementFormat::Ofx);
    }

    if extension(filename).is_some_and(|ext| ext.eq_ignore_ascii_case("ofx")) {
        return Ok(StatementFormat::Ofx);
    }

    let text = String::from_utf8_lossy(content);
    let first_line = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .find(|l| !l.trim().is_empty());

    match first_line.map(|l| l.chars().count()) {
        Some(240) => Ok(StatementFormat::Cnab240),
        Some(400) => Ok(StatementFormat::Cnab400),
        _ => Err(DetectError::UnsupportedFormat),
    }
}

fn extension(filename: Option<&str>) -> Option<&str> {
    let name = filename?;
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ofx_by_content_token() {
        let content = b"OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>\n<BANKMSGSRSV1>";
        assert_eq!(
            detect_format(Some("statement.txt"), content),
            Ok(StatementFormat::Ofx)
        );
    }

    #[test]
    fn ofx_token_is_case_insensitive() {
        assert_eq!(
            detect_format(None, b"<ofx><bankmsgsrsv1>"),
            Ok(StatementFormat::Ofx)
        );
    }

    #[test]
    fn ofx_by_extension_without_token_in_window() {
        // Extension is the fallback when the token is not in the head.
        assert_eq!(
            detect_format(Some("extrato.OFX"), b"garbage bytes"),
            Ok(StatementFormat::Ofx)
        );
    }

    #[test]
    fn cnab240_by_line_length() {
        let line = "0".repeat(240);
        let content = format!("{line}\n{line}\n");
        assert_eq!(
            detect_format(Some("retorno.ret"), content.as_bytes()),
            Ok(StatementFormat::Cnab240)
        );
    }

    #[test]
    fn cnab400_by_line_length() {
        let content = format!("{}\n", "X".repeat(400));
        assert_eq!(
            detect_format(None, content.as_bytes()),
            Ok(StatementFormat::Cnab400)
        );
    }

    #[test]
    fn cnab_detection_skips_leading_blank_lines() {
        let content = format!("\r\n  \n{}\n", "9".repeat(240));
        assert_eq!(
            detect_format(None, content.as_bytes()),
            Ok(StatementFormat::Cnab240)
        );
    }

    #[test]
    fn crlf_terminator_does_not_change_length() {
        let content = format!("{}\r\n", "1".repeat(400));
        assert_eq!(
            detect_format(None, content.as_bytes()),
            Ok(StatementFormat::Cnab400)
        );
    }

    #[test]
    fn unknown_shape_is_unsupported() {
        assert_eq!(
            detect_format(Some("report.csv"), b"date,description,amount\n"),
            Err(DetectError::UnsupportedFormat)
        );
        assert_eq!(detect_format(None, b""), Err(DetectError::UnsupportedFormat));
    }

    #[test]
    fn near_miss_lengths_are_unsupported() {
        let content = format!("{}\n", "0".repeat(239));
        assert_eq!(
            detect_format(None, content.as_bytes()),
            Err(DetectError::UnsupportedFormat)
        );
        let content = format!("{}\n", "0".repeat(401));
        assert_eq!(
            detect_format(None, content.as_bytes()),
            Err(DetectError::UnsupportedFormat)
        );
    }
}
