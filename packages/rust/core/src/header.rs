//! Header validation: the sheet's header row must equal the schema's
//! original column names exactly, in order, after trimming.

use sheetload_shared::{ColumnSchema, Result, SheetloadError};
use tracing::{debug, error};

/// Set differences between an observed header and the expected one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderDiff {
    /// Expected names absent from the sheet.
    pub missing_in_sheet: Vec<String>,
    /// Sheet names the schema does not declare.
    pub missing_in_schema: Vec<String>,
}

impl HeaderDiff {
    pub fn between(observed: &[String], expected: &[String]) -> Self {
        Self {
            missing_in_sheet: expected
                .iter()
                .filter(|name| !observed.contains(name))
                .cloned()
                .collect(),
            missing_in_schema: observed
                .iter()
                .filter(|name| !expected.contains(name))
                .cloned()
                .collect(),
        }
    }

    /// Same names on both sides, so only order or repetition differs.
    pub fn is_reorder_only(&self) -> bool {
        self.missing_in_sheet.is_empty() && self.missing_in_schema.is_empty()
    }
}

/// Check `header` against the schema. Cells are trimmed before comparing.
pub fn validate_header(header: &[String], schema: &ColumnSchema) -> Result<()> {
    let observed: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    let expected = schema.original_names();
    debug!(?observed, ?expected, "checking sheet header");

    if observed == expected {
        return Ok(());
    }

    let diff = HeaderDiff::between(&observed, &expected);
    error!(
        ?observed,
        ?expected,
        missing_in_sheet = ?diff.missing_in_sheet,
        missing_in_schema = ?diff.missing_in_schema,
        reorder_only = diff.is_reorder_only(),
        "sheet header does not match schema"
    );

    Err(SheetloadError::SchemaMismatch { observed, expected })
}
