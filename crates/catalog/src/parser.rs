//! Parser for CSV catalog files.
//!
//! Reads the header and raw records with the `csv` crate, then types each
//! cell the way a dataframe reader would infer it. Typing is independent per
//! cell, so it is done in parallel by the index builder.

use crate::error::{CatalogLoadError, Result};
use crate::types::FieldValue;
use std::collections::HashSet;
use std::io::Read;

/// A record as read from the file, before typing
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 1-based line number (the header is line 1)
    pub line: u64,
    pub cells: Vec<String>,
}

/// Header plus untyped records
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Convert a `csv::Error` into our error type, keeping the line number
fn csv_error(source_name: &str, err: csv::Error) -> CatalogLoadError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => CatalogLoadError::IoError(io),
        _ => CatalogLoadError::ParseError {
            source_name: source_name.to_string(),
            line,
            reason,
        },
    }
}

/// Read the header row and every record from a CSV source.
///
/// Rows with a different number of fields than the header are rejected.
pub fn read_table<R: Read>(reader: R, source_name: &str) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let raw_headers = rdr
        .headers()
        .map_err(|e| csv_error(source_name, e))?
        .clone();
    let headers = normalize_headers(raw_headers.iter(), source_name)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(source_name, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        records.push(RawRecord {
            line,
            cells: record.iter().map(|s| s.to_string()).collect(),
        });
    }

    Ok(RawTable { headers, records })
}

/// Trim header names and name blank ones `Unnamed: {position}`.
///
/// Duplicate names would make the field mapping ambiguous, so they fail.
pub fn normalize_headers<'a>(
    raw: impl Iterator<Item = &'a str>,
    source_name: &str,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();
    for (idx, name) in raw.enumerate() {
        let name = name.trim();
        let name = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name.to_string()
        };
        if !seen.insert(name.clone()) {
            return Err(CatalogLoadError::ParseError {
                source_name: source_name.to_string(),
                line: 1,
                reason: format!("Duplicate column name '{}'", name),
            });
        }
        headers.push(name);
    }
    if headers.is_empty() {
        return Err(CatalogLoadError::ParseError {
            source_name: source_name.to_string(),
            line: 1,
            reason: "Missing header row".to_string(),
        });
    }
    Ok(headers)
}

/// Infer the type of a single cell
///
/// Example: "" -> Null, "42" -> Integer(42), "0.5" -> Float(0.5),
///          "Monas" -> Text("Monas")
pub fn parse_cell(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return FieldValue::Integer(int);
    }
    match trimmed.parse::<f64>() {
        Ok(float) if float.is_finite() => FieldValue::Float(float),
        _ => FieldValue::Text(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell(""), FieldValue::Null);
        assert_eq!(parse_cell("   "), FieldValue::Null);
        assert_eq!(parse_cell("42"), FieldValue::Integer(42));
        assert_eq!(parse_cell("-6.1753924"), FieldValue::Float(-6.1753924));
        assert_eq!(parse_cell("Monumen Nasional"), FieldValue::Text("Monumen Nasional".to_string()));
        // Non-finite literals stay text
        assert_eq!(parse_cell("NaN"), FieldValue::Text("NaN".to_string()));
    }

    #[test]
    fn test_normalize_headers_names_blank_columns() {
        let headers = normalize_headers(["Place_Id", " Place_Name ", "", ""].into_iter(), "test.csv").unwrap();
        assert_eq!(headers, vec!["Place_Id", "Place_Name", "Unnamed: 2", "Unnamed: 3"]);
    }

    #[test]
    fn test_normalize_headers_rejects_duplicates() {
        let result = normalize_headers(["Place_Id", "Name", "Name"].into_iter(), "test.csv");
        assert!(matches!(result, Err(CatalogLoadError::ParseError { line: 1, .. })));
    }

    #[test]
    fn test_read_table_tracks_line_numbers() {
        let csv = "Place_Id,Name\n1,Monas\n2,Ancol\n";
        let table = read_table(csv.as_bytes(), "test.csv").unwrap();
        assert_eq!(table.headers, vec!["Place_Id", "Name"]);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].line, 2);
        assert_eq!(table.records[1].line, 3);
        assert_eq!(table.records[1].cells, vec!["2", "Ancol"]);
    }

    #[test]
    fn test_read_table_rejects_ragged_rows() {
        let csv = "Place_Id,Name\n1,Monas\n2,Ancol,extra\n";
        let result = read_table(csv.as_bytes(), "test.csv");
        assert!(matches!(result, Err(CatalogLoadError::ParseError { line: 3, .. })));
    }
}
