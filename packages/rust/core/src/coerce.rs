//! Type coercion: converts each normalized column to its declared type.
//!
//! Unparseable cells fall back to a per-type default (0, 0.0, false or
//! missing). A column that cannot be read at all is replaced by missing
//! values and reported as a [`PipelineWarning::ColumnDegraded`]; coercion
//! never aborts a job.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use sheetload_shared::{
    CellValue, ColumnDef, ColumnSchema, ColumnType, NormalizedTable, PipelineWarning, TypedTable,
};
use tracing::{debug, warn};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%m/%d/%Y"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Coerce every column of `table` according to `schema`.
pub fn coerce_table(
    table: &NormalizedTable,
    schema: &ColumnSchema,
) -> (TypedTable, Vec<PipelineWarning>) {
    let row_count = table.row_count();
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::with_capacity(schema.len()); row_count];
    let mut warnings = Vec::new();

    for (index, def) in schema.columns().iter().enumerate() {
        let values = match column_cells(table, index, def) {
            Ok(cells) => cells
                .into_iter()
                .map(|cell| coerce_cell(cell, def.column_type))
                .collect(),
            Err(reason) => {
                let warning = PipelineWarning::ColumnDegraded {
                    column: def.target_name.clone(),
                    column_type: def.column_type,
                    reason,
                };
                warn!("{warning}");
                warnings.push(warning);
                vec![CellValue::Missing; row_count]
            }
        };

        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    debug!(
        rows = row_count,
        columns = schema.len(),
        degraded = warnings.len(),
        "table coerced"
    );

    let typed = TypedTable {
        columns: schema.target_names(),
        rows,
    };
    (typed, warnings)
}

/// Cells of the column at `index`, or why the column cannot be read.
fn column_cells<'t>(
    table: &'t NormalizedTable,
    index: usize,
    def: &ColumnDef,
) -> Result<Vec<&'t str>, String> {
    match table.columns.get(index) {
        Some(label) if *label == def.target_name => {}
        Some(label) => {
            return Err(format!(
                "column {index} is labeled '{label}', expected '{}'",
                def.target_name
            ));
        }
        None => return Err(format!("table has no column {index}")),
    }

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.get(index)
                .map(String::as_str)
                .ok_or_else(|| format!("data row {} has only {} cells", i + 1, row.len()))
        })
        .collect()
}

/// Coerce one cell to `column_type`, applying the type's fallback on failure.
pub fn coerce_cell(cell: &str, column_type: ColumnType) -> CellValue {
    match column_type {
        ColumnType::String => CellValue::Text(cell.to_string()),
        ColumnType::Integer => CellValue::Integer(parse_integer(cell).unwrap_or(0)),
        ColumnType::Float => CellValue::Float(parse_float(cell).unwrap_or(0.0)),
        ColumnType::Boolean => CellValue::Boolean(parse_bool(cell)),
        ColumnType::Date => parse_date(cell).map_or(CellValue::Missing, CellValue::Date),
        ColumnType::Time => parse_time(cell).map_or(CellValue::Missing, CellValue::Time),
        ColumnType::DateTime => {
            parse_datetime(cell, false).map_or(CellValue::Missing, CellValue::DateTime)
        }
        ColumnType::Timestamp => {
            parse_datetime(cell, true).map_or(CellValue::Missing, CellValue::DateTime)
        }
    }
}

fn strip_separators(cell: &str) -> String {
    cell.trim().chars().filter(|c| *c != ',').collect()
}

/// Whole numbers parse directly; decimals are truncated toward zero.
pub fn parse_integer(cell: &str) -> Option<i64> {
    let cleaned = strip_separators(cell);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok().or_else(|| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite() && x.abs() < i64::MAX as f64)
            .map(|x| x.trunc() as i64)
    })
}

/// Finite numbers only; `inf` and `NaN` spellings count as unparseable.
pub fn parse_float(cell: &str) -> Option<f64> {
    let cleaned = strip_separators(cell);
    cleaned.parse::<f64>().ok().filter(|x| x.is_finite())
}

pub fn parse_bool(cell: &str) -> bool {
    matches!(cell.trim().to_lowercase().as_str(), "true" | "t" | "1")
}

/// Calendar dates in ISO, slash or dotted form, including the
/// `2024. 1. 5.` style spreadsheets produce in Korean locales.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }

    let dotted = trimmed.replace(". ", ".");
    let candidate = dotted.trim_end_matches('.');
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
        .or_else(|| parse_datetime(trimmed, false).map(|dt| dt.date()))
}

pub fn parse_time(cell: &str) -> Option<NaiveTime> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
}

/// Combined date-time. RFC 3339 offsets are converted to UTC when `to_utc`
/// is set, otherwise the local wall-clock time is kept. A bare date is
/// midnight.
pub fn parse_datetime(cell: &str, to_utc: bool) -> Option<NaiveDateTime> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(if to_utc { dt.naive_utc() } else { dt.naive_local() });
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            let dotted = trimmed.replace(". ", ".");
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(dotted.trim_end_matches('.'), fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, column_type: ColumnType) -> ColumnDef {
        ColumnDef {
            original_name: name.to_string(),
            target_name: name.to_string(),
            column_type,
        }
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> NormalizedTable {
        NormalizedTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn integers() {
        assert_eq!(coerce_cell("1,234", ColumnType::Integer), CellValue::Integer(1234));
        assert_eq!(coerce_cell("abc", ColumnType::Integer), CellValue::Integer(0));
        assert_eq!(coerce_cell("", ColumnType::Integer), CellValue::Integer(0));
        assert_eq!(coerce_cell(" -42 ", ColumnType::Integer), CellValue::Integer(-42));
        assert_eq!(coerce_cell("3.9", ColumnType::Integer), CellValue::Integer(3));
        assert_eq!(coerce_cell("1e3", ColumnType::Integer), CellValue::Integer(1000));
        assert_eq!(coerce_cell("inf", ColumnType::Integer), CellValue::Integer(0));
    }

    #[test]
    fn floats() {
        assert_eq!(coerce_cell("1,234.5", ColumnType::Float), CellValue::Float(1234.5));
        assert_eq!(coerce_cell("abc", ColumnType::Float), CellValue::Float(0.0));
        assert_eq!(coerce_cell("", ColumnType::Float), CellValue::Float(0.0));
        assert_eq!(coerce_cell("NaN", ColumnType::Float), CellValue::Float(0.0));
    }

    #[test]
    fn booleans() {
        for truthy in ["TRUE", "t", "1", " True "] {
            assert_eq!(coerce_cell(truthy, ColumnType::Boolean), CellValue::Boolean(true));
        }
        for falsy in ["false", "0", "", "yes", "no"] {
            assert_eq!(coerce_cell(falsy, ColumnType::Boolean), CellValue::Boolean(false));
        }
    }

    #[test]
    fn strings_are_kept_verbatim() {
        assert_eq!(
            coerce_cell(" Kim ", ColumnType::String),
            CellValue::Text(" Kim ".into())
        );
        assert_eq!(coerce_cell("", ColumnType::String), CellValue::Text(String::new()));
    }

    #[test]
    fn dates() {
        let jan5 = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        for cell in ["2024-01-05", "2024/01/05", "2024.01.05", "2024. 1. 5.", "2024-01-05 13:00:00"] {
            assert_eq!(coerce_cell(cell, ColumnType::Date), CellValue::Date(jan5), "{cell}");
        }
        assert_eq!(coerce_cell("", ColumnType::Date), CellValue::Missing);
        assert_eq!(coerce_cell("soon", ColumnType::Date), CellValue::Missing);
        assert_eq!(coerce_cell("2024-02-30", ColumnType::Date), CellValue::Missing);
    }

    #[test]
    fn times() {
        let t = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        for cell in ["14:30:00", "14:30", "2:30 PM", "02:30:00 PM"] {
            assert_eq!(coerce_cell(cell, ColumnType::Time), CellValue::Time(t), "{cell}");
        }
        assert_eq!(coerce_cell("25:00", ColumnType::Time), CellValue::Missing);
    }

    #[test]
    fn datetimes_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(
            coerce_cell("2024-01-05 09:00:00", ColumnType::DateTime),
            CellValue::DateTime(expected)
        );
        assert_eq!(
            coerce_cell("2024-01-05T18:00:00+09:00", ColumnType::Timestamp),
            CellValue::DateTime(expected)
        );
        assert_eq!(
            coerce_cell("2024-01-05T09:00:00+09:00", ColumnType::DateTime),
            CellValue::DateTime(expected)
        );
        assert_eq!(
            coerce_cell("2024-01-05", ColumnType::Timestamp),
            CellValue::DateTime(expected.date().and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(coerce_cell("later", ColumnType::DateTime), CellValue::Missing);
    }

    #[test]
    fn coerces_members_table() {
        let schema = ColumnSchema::new(vec![
            def("name", ColumnType::String),
            def("age", ColumnType::Integer),
            def("active", ColumnType::Boolean),
        ])
        .unwrap();
        let normalized = table(
            &["name", "age", "active"],
            &[&["Kim", "30", "true"], &["Lee", "abc", "1"]],
        );

        let (typed, warnings) = coerce_table(&normalized, &schema);
        assert!(warnings.is_empty());
        assert_eq!(typed.columns, vec!["name", "age", "active"]);
        assert_eq!(
            typed.rows,
            vec![
                vec![
                    CellValue::Text("Kim".into()),
                    CellValue::Integer(30),
                    CellValue::Boolean(true)
                ],
                vec![
                    CellValue::Text("Lee".into()),
                    CellValue::Integer(0),
                    CellValue::Boolean(true)
                ],
            ]
        );
    }

    #[test]
    fn unreadable_column_degrades_to_missing() {
        let schema = ColumnSchema::new(vec![
            def("name", ColumnType::String),
            def("age", ColumnType::Integer),
        ])
        .unwrap();
        // Second row is missing its age cell.
        let normalized = table(&["name", "age"], &[&["Kim", "30"], &["Lee"]]);

        let (typed, warnings) = coerce_table(&normalized, &schema);
        assert_eq!(typed.row_count(), 2);
        assert!(typed.column(1).all(CellValue::is_missing));
        assert_eq!(typed.rows[1][0], CellValue::Text("Lee".into()));

        match &warnings[..] {
            [PipelineWarning::ColumnDegraded { column, column_type, reason }] => {
                assert_eq!(column, "age");
                assert_eq!(*column_type, ColumnType::Integer);
                assert!(reason.contains("data row 2"));
            }
            other => panic!("unexpected warnings: {other:?}"),
        }
    }

    #[test]
    fn mislabeled_column_degrades() {
        let schema = ColumnSchema::new(vec![def("name", ColumnType::String)]).unwrap();
        let normalized = table(&["nom"], &[&["Kim"]]);
        let (typed, warnings) = coerce_table(&normalized, &schema);
        assert_eq!(typed.rows, vec![vec![CellValue::Missing]]);
        assert_eq!(warnings.len(), 1);
    }
}
