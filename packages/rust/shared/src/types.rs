//! Core domain types: job specifications, table identifiers and column schemas.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TableId
// ---------------------------------------------------------------------------

/// Fully qualified destination table identifier: `catalog.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    /// Project / catalog the table lives in.
    pub catalog: String,
    /// Dataset (schema) within the catalog.
    pub dataset: String,
    /// Table name.
    pub table: String,
}

impl TableId {
    /// Parse a three-part identifier, rejecting empty or invalid segments.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        static SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid regex")
        });

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!(
                "table id '{s}' must have three parts (catalog.dataset.table)"
            ));
        }
        if let Some(bad) = parts.iter().find(|p| !SEGMENT_RE.is_match(p)) {
            return Err(format!("table id '{s}' has invalid segment '{bad}'"));
        }

        Ok(Self {
            catalog: parts[0].to_string(),
            dataset: parts[1].to_string(),
            table: parts[2].to_string(),
        })
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.dataset, self.table)
    }
}

impl std::str::FromStr for TableId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// JobSpec
// ---------------------------------------------------------------------------

/// Where a job reads its grid from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetLocation {
    /// Spreadsheet identifier.
    pub sheet_id: String,
    /// Worksheet (tab) name.
    pub worksheet: String,
    /// A1-notation cell range, e.g. `A1:F` or `B3:H200`.
    pub range: String,
}

impl SheetLocation {
    /// The range qualified with its worksheet, e.g. `Members!A1:F`.
    pub fn qualified_range(&self) -> String {
        format!("{}!{}", self.worksheet, self.range)
    }

    /// Sheet row number (1-based) of the first row in the range.
    ///
    /// Ranges without a row component (`A:F`) start at row 1.
    pub fn start_row(&self) -> u32 {
        static START_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^\$?[A-Za-z]*\$?(\d+)").expect("valid regex")
        });

        let start = self.range.split(':').next().unwrap_or_default().trim();
        START_RE
            .captures(start)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|row| *row > 0)
            .unwrap_or(1)
    }
}

/// One resolved ingestion job. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Job key this spec was resolved from.
    pub key: String,
    /// Source grid location.
    pub source: SheetLocation,
    /// Schema file reference, relative to the schemas directory.
    pub schema_file: String,
    /// Destination table.
    pub destination: TableId,
}

// ---------------------------------------------------------------------------
// Column schema
// ---------------------------------------------------------------------------

/// Declared type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl ColumnType {
    /// Canonical upper-case type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(Self::String),
            "INTEGER" | "INT64" => Ok(Self::Integer),
            "FLOAT" | "FLOAT64" => Ok(Self::Float),
            "BOOLEAN" | "BOOL" => Ok(Self::Boolean),
            "DATE" => Ok(Self::Date),
            "TIME" => Ok(Self::Time),
            "DATETIME" => Ok(Self::DateTime),
            "TIMESTAMP" => Ok(Self::Timestamp),
            other => Err(format!("unsupported column type '{other}'")),
        }
    }
}

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Header text expected in the source sheet.
    pub original_name: String,
    /// Canonical destination column name.
    pub target_name: String,
    /// Declared type.
    pub column_type: ColumnType,
}

/// Ordered column definitions governing validation, renaming and coercion.
///
/// Order is both the expected source header order and the destination
/// column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    columns: Vec<ColumnDef>,
}

impl ColumnSchema {
    /// Build a schema, rejecting empty schemas and duplicate target names.
    pub fn new(columns: Vec<ColumnDef>) -> std::result::Result<Self, String> {
        if columns.is_empty() {
            return Err("schema has no columns".into());
        }
        let mut seen = std::collections::HashSet::new();
        for col in &columns {
            if !seen.insert(col.target_name.as_str()) {
                return Err(format!(
                    "duplicate target column name '{}'",
                    col.target_name
                ));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Expected source header, in order.
    pub fn original_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.original_name.clone()).collect()
    }

    /// Destination column names, in order.
    pub fn target_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.target_name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(range: &str) -> SheetLocation {
        SheetLocation {
            sheet_id: "abc".into(),
            worksheet: "Members".into(),
            range: range.into(),
        }
    }

    #[test]
    fn table_id_parse_and_display() {
        let id: TableId = "my-project.crm.members".parse().expect("parse");
        assert_eq!(id.catalog, "my-project");
        assert_eq!(id.dataset, "crm");
        assert_eq!(id.table, "members");
        assert_eq!(id.to_string(), "my-project.crm.members");
    }

    #[test]
    fn table_id_rejects_bad_shapes() {
        assert!(TableId::parse("crm.members").is_err());
        assert!(TableId::parse("a..c").is_err());
        assert!(TableId::parse("a.b.c.d").is_err());
        assert!(TableId::parse("a.b.c d").is_err());
    }

    #[test]
    fn start_row_from_range() {
        assert_eq!(location("A1:F").start_row(), 1);
        assert_eq!(location("B3:H200").start_row(), 3);
        assert_eq!(location("$A$5:$C$9").start_row(), 5);
        assert_eq!(location("A:F").start_row(), 1);
        assert_eq!(location("A0:F").start_row(), 1);
        assert_eq!(location("A1:F").qualified_range(), "Members!A1:F");
    }

    #[test]
    fn column_type_parsing_is_case_insensitive() {
        assert_eq!("string".parse::<ColumnType>(), Ok(ColumnType::String));
        assert_eq!("Int64".parse::<ColumnType>(), Ok(ColumnType::Integer));
        assert_eq!(" float64 ".parse::<ColumnType>(), Ok(ColumnType::Float));
        assert_eq!("bool".parse::<ColumnType>(), Ok(ColumnType::Boolean));
        assert_eq!("timestamp".parse::<ColumnType>(), Ok(ColumnType::Timestamp));
        assert!("GEOGRAPHY".parse::<ColumnType>().is_err());
    }

    #[test]
    fn schema_rejects_duplicate_targets() {
        let col = |o: &str, t: &str| ColumnDef {
            original_name: o.into(),
            target_name: t.into(),
            column_type: ColumnType::String,
        };
        assert!(ColumnSchema::new(vec![col("a", "x"), col("b", "x")]).is_err());
        assert!(ColumnSchema::new(vec![]).is_err());

        let schema = ColumnSchema::new(vec![col("이름", "name"), col("나이", "age")]).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.original_names(), vec!["이름", "나이"]);
        assert_eq!(schema.target_names(), vec!["name", "age"]);
    }
}
