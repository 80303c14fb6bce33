//! Row normalization: forces every data row to the schema width and labels
//! columns with target names.

use sheetload_shared::{ColumnSchema, NormalizedTable, PipelineWarning, RawGrid};
use tracing::warn;

/// Pad short rows with empty strings and truncate long ones.
///
/// `start_row` is the sheet row of the header, used to report adjusted rows
/// by their position in the sheet.
pub fn normalize_rows(
    grid: &RawGrid,
    schema: &ColumnSchema,
    start_row: u32,
) -> (NormalizedTable, Vec<PipelineWarning>) {
    let width = schema.len();
    let mut warnings = Vec::new();

    let rows = grid
        .data_rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != width {
                let warning = PipelineWarning::RowLengthAdjusted {
                    sheet_row: sheet_row(start_row, i),
                    found: row.len(),
                    expected: width,
                };
                warn!("{warning}");
                warnings.push(warning);
            }
            fit_row(row, width)
        })
        .collect();

    let table = NormalizedTable {
        columns: schema.target_names(),
        rows,
    };
    (table, warnings)
}

/// Sheet row of the `index`-th data row under a header at `start_row`.
fn sheet_row(start_row: u32, index: usize) -> u64 {
    u64::from(start_row)
        .saturating_add(1)
        .saturating_add(u64::try_from(index).unwrap_or(u64::MAX))
}

/// Copy `row` into exactly `width` cells.
pub fn fit_row(row: &[String], width: usize) -> Vec<String> {
    let mut fitted: Vec<String> = row.iter().take(width).cloned().collect();
    fitted.resize(width, String::new());
    fitted
}
