//! Conversions from source payloads into [`RawGrid`]s.
//!
//! Two payload shapes are supported:
//! - the JSON `ValueRange` body returned by the spreadsheet values API
//! - plain CSV files, used for offline runs

use std::path::Path;

use serde::Deserialize;
use sheetload_shared::{RawGrid, Result, SheetloadError};

/// Body of a values API response. `values` is omitted entirely when the
/// requested range is empty.
#[derive(Debug, Deserialize)]
pub(crate) struct ValueRange {
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Parse a values API response body into a grid.
pub(crate) fn parse_value_range(body: &str) -> Result<RawGrid> {
    let parsed: ValueRange = serde_json::from_str(body)
        .map_err(|e| SheetloadError::Source(format!("invalid values response: {e}")))?;

    Ok(RawGrid::new(
        parsed
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect(),
    ))
}

/// Formatted values arrive as strings; anything else is stringified.
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Read a local CSV file as a grid. The first record is the header; rows
/// may be ragged.
pub fn read_csv_grid(path: &Path) -> Result<RawGrid> {
    let file = std::fs::File::open(path).map_err(|e| SheetloadError::io(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            SheetloadError::Source(format!("{}: invalid CSV: {e}", path.display()))
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "read CSV grid");
    Ok(RawGrid::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ragged_values() {
        let body = r#"{
            "range": "Members!A1:C3",
            "majorDimension": "ROWS",
            "values": [["name", "age", "active"], ["Kim", "30"], ["Lee", "abc", "1", "extra"]]
        }"#;
        let grid = parse_value_range(body).expect("parse");
        assert_eq!(grid.rows.len(), 3);
        assert_eq!(grid.rows[1], vec!["Kim", "30"]);
        assert_eq!(grid.rows[2].len(), 4);
    }

    #[test]
    fn missing_values_is_empty_grid() {
        let grid = parse_value_range(r#"{"range": "Members!A1:C", "majorDimension": "ROWS"}"#)
            .expect("parse");
        assert!(grid.rows.is_empty());
    }

    #[test]
    fn non_string_cells_are_stringified() {
        let grid = parse_value_range(r#"{"values": [["a", "b", "c"], [1.5, true, null]]}"#)
            .expect("parse");
        assert_eq!(grid.rows[1], vec!["1.5", "true", ""]);
    }

    #[test]
    fn invalid_body_is_source_error() {
        let err = parse_value_range("<html>").unwrap_err();
        assert!(matches!(err, SheetloadError::Source(_)));
    }

    #[test]
    fn csv_grid_fixture() {
        let grid = read_csv_grid(Path::new("../../../fixtures/sheets/members.csv"))
            .expect("read csv fixture");
        assert_eq!(grid.trimmed_header(), vec!["이름", "나이", "활성"]);
        assert_eq!(grid.data_rows().len(), 3);
        // The third data row is short in the fixture
        assert_eq!(grid.data_rows()[2].len(), 2);
    }

    #[test]
    fn csv_grid_missing_file() {
        let err = read_csv_grid(Path::new("/nonexistent/grid.csv")).unwrap_err();
        assert!(matches!(err, SheetloadError::Io { .. }));
    }
}
