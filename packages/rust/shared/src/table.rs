//! Transient table structures that flow through a single job invocation.
//!
//! `RawGrid` → `NormalizedTable` → `TypedTable`, plus the warnings recorded
//! along the way. None of these outlive the invocation that built them.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::types::ColumnType;

// ---------------------------------------------------------------------------
// RawGrid
// ---------------------------------------------------------------------------

/// Untyped cells as returned by the sheet source. Row 0 is the header.
///
/// Rows may have differing lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGrid {
    pub rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Header row, if the grid is not empty.
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Header cells with surrounding whitespace removed.
    pub fn trimmed_header(&self) -> Vec<String> {
        self.header()
            .map(|h| h.iter().map(|c| c.trim().to_string()).collect())
            .unwrap_or_default()
    }

    /// Data rows (everything after the header).
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// Whether the grid holds at least one data row.
    pub fn has_data(&self) -> bool {
        self.rows.len() >= 2
    }
}

impl<S: Into<String>> FromIterator<Vec<S>> for RawGrid {
    fn from_iter<I: IntoIterator<Item = Vec<S>>>(iter: I) -> Self {
        Self {
            rows: iter
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// NormalizedTable
// ---------------------------------------------------------------------------

/// Data rows forced to the schema width, labeled by target column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTable {
    /// Target column names, in schema order.
    pub columns: Vec<String>,
    /// Rows, each exactly `columns.len()` cells once normalized.
    pub rows: Vec<Vec<String>>,
}

impl NormalizedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// ---------------------------------------------------------------------------
// CellValue / TypedTable
// ---------------------------------------------------------------------------

/// A coerced cell. `Missing` is the sentinel for an absent date/time value
/// or a degraded column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Missing => f.write_str("NULL"),
        }
    }
}

/// Output of type coercion; what the loader receives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedTable {
    /// Target column names, in schema order.
    pub columns: Vec<String>,
    /// Row-major coerced cells.
    pub rows: Vec<Vec<CellValue>>,
}

impl TypedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All values of the column at `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |r| r.get(index))
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A non-fatal data-quality issue recorded while processing a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// A data row was padded or truncated to the schema width.
    RowLengthAdjusted {
        /// Row number in the source sheet.
        sheet_row: u64,
        /// Cells the row actually had.
        found: usize,
        /// Cells the schema expects.
        expected: usize,
    },
    /// A whole column could not be coerced and was replaced by missing values.
    ColumnDegraded {
        column: String,
        column_type: ColumnType,
        reason: String,
    },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowLengthAdjusted {
                sheet_row,
                found,
                expected,
            } => {
                let action = if found < expected { "padded" } else { "truncated" };
                write!(
                    f,
                    "sheet row {sheet_row}: {action} from {found} to {expected} cells"
                )
            }
            Self::ColumnDegraded {
                column,
                column_type,
                reason,
            } => write!(
                f,
                "column '{column}' ({column_type}) set to NULL: {reason}"
            ),
        }
    }
}
