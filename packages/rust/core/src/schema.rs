//! Schema loader: reads a column schema CSV into a [`ColumnSchema`].
//!
//! A schema file has one row per column with three required fields (original
//! header text, target column name, declared type). Extra columns such as
//! descriptions are ignored. Header names are matched against a small alias
//! list so both English and Korean schema sheets load.

use std::io::Read;
use std::path::{Path, PathBuf};

use sheetload_shared::{ColumnDef, ColumnSchema, ColumnType, Result, SheetloadError};
use tracing::debug;

const ORIGINAL_ALIASES: &[&str] = &["original_name", "source_name", "original", "기존 컬럼명"];
const TARGET_ALIASES: &[&str] = &["target_name", "english_name", "target", "영어 컬럼명"];
const TYPE_ALIASES: &[&str] = &["type", "data_type", "column_type", "데이터 타입"];

/// Path of `schema_file` inside `schemas_dir`.
pub fn schema_path(schemas_dir: &Path, schema_file: &str) -> PathBuf {
    schemas_dir.join(schema_file)
}

/// Load the schema named by a job from the schemas directory.
pub fn load_schema(schemas_dir: &Path, schema_file: &str) -> Result<ColumnSchema> {
    let path = schema_path(schemas_dir, schema_file);
    if !path.is_file() {
        return Err(SheetloadError::SchemaNotFound { path });
    }

    let file = std::fs::File::open(&path).map_err(|e| SheetloadError::io(&path, e))?;
    let schema = parse_schema(file, &path)?;
    debug!(path = %path.display(), columns = schema.len(), "schema loaded");
    Ok(schema)
}

/// Parse schema CSV content. `path` is only used in error messages.
pub fn parse_schema<R: Read>(reader: R, path: &Path) -> Result<ColumnSchema> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| SheetloadError::schema_malformed(path, format!("invalid CSV: {e}")))?
        .clone();

    let original_idx = find_column(&headers, ORIGINAL_ALIASES, path)?;
    let target_idx = find_column(&headers, TARGET_ALIASES, path)?;
    let type_idx = find_column(&headers, TYPE_ALIASES, path)?;

    let mut columns = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| SheetloadError::schema_malformed(path, format!("invalid CSV: {e}")))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let original = record.get(original_idx).unwrap_or_default();
        let target = record.get(target_idx).unwrap_or_default();
        let type_name = record.get(type_idx).unwrap_or_default();

        if original.is_empty() && target.is_empty() && type_name.is_empty() {
            continue;
        }
        if original.is_empty() || target.is_empty() {
            return Err(SheetloadError::schema_malformed(
                path,
                format!("line {line}: original and target names are required"),
            ));
        }

        let column_type: ColumnType = type_name
            .parse()
            .map_err(|e| SheetloadError::schema_malformed(path, format!("line {line}: {e}")))?;

        columns.push(ColumnDef {
            original_name: original.to_string(),
            target_name: target.to_string(),
            column_type,
        });
    }

    ColumnSchema::new(columns).map_err(|e| SheetloadError::schema_malformed(path, e))
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str], path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| {
            let name = h.trim_start_matches('\u{feff}').trim().to_lowercase();
            aliases.contains(&name.as_str())
        })
        .ok_or_else(|| {
            SheetloadError::schema_malformed(
                path,
                format!("missing required column (one of: {})", aliases.join(", ")),
            )
        })
}
