//! Strict manifest line parsing (spec.md §3 "ParsedManifestLine", §4.1).

use crate::types::ParsedManifestLine;

/// Parse one CSV manifest line: `timestamp,filepath,sha256`.
///
/// `timestamp` must be a non-negative integer, `filepath` non-empty, and
/// `sha256` exactly 64 hex digits. Uses the `csv` crate's reader over a
/// single line so embedded commas inside quoted fields are handled the same
/// way a real CSV manifest would require.
pub fn parse_line(line: &str) -> Result<ParsedManifestLine, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());

    let record = reader
        .records()
        .next()
        .ok_or_else(|| "empty line".to_string())?
        .map_err(|e| format!("csv parse error: {e}"))?;

    if record.len() != 3 {
        return Err(format!("expected 3 fields, got {}", record.len()));
    }

    let timestamp: i64 = record[0]
        .parse()
        .map_err(|_| format!("invalid timestamp: {:?}", &record[0]))?;
    if timestamp < 0 {
        return Err(format!("negative timestamp: {timestamp}"));
    }

    let filepath = record[1].to_string();
    if filepath.is_empty() {
        return Err("empty filepath".to_string());
    }

    let sha256 = record[2].to_string();
    if sha256.len() != 64 || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid sha256: {:?}", sha256));
    }

    Ok(ParsedManifestLine {
        timestamp,
        filepath,
        sha256,
    })
}
