use anyhow::Result;
use arrow::array::{BooleanArray, StringArray};
use tracing::debug;

use super::values::{is_sensitive_column, is_summary_row};
use crate::table::SheetTable;

/// Build a derived column by mapping every cell of `source`. A missing source
/// column feeds `None` to `f` for every row.
pub fn map_column<F>(table: &SheetTable, source: Option<&str>, f: F) -> StringArray
where
    F: Fn(Option<&str>) -> Option<String>,
{
    match source {
        Some(name) => table.values(name).into_iter().map(|v| f(v)).collect(),
        None => (0..table.num_rows()).map(|_| f(None)).collect(),
    }
}

/// Append (or replace) `target` with `f` applied to `source`.
pub fn derive_column<F>(
    table: &SheetTable,
    target: &str,
    source: Option<&str>,
    f: F,
) -> Result<SheetTable>
where
    F: Fn(Option<&str>) -> Option<String>,
{
    table.with_column(target, map_column(table, source, f))
}

/// Remove personal-data columns, never touching the names in `keep`.
pub fn scrub_sensitive(table: &SheetTable, keep: &[&str]) -> Result<SheetTable> {
    let scrubbed = table.drop_columns(|name| !keep.contains(&name) && is_sensitive_column(name))?;
    debug!(
        removed = table.column_names().len() - scrubbed.column_names().len(),
        "scrubbed sensitive columns"
    );
    Ok(scrubbed)
}

/// Drop hand-written `TOTAL` rows keyed on the locality column.
pub fn drop_summary_rows(table: &SheetTable, locality: Option<&str>) -> Result<SheetTable> {
    let Some(col) = locality else {
        return Ok(table.clone());
    };
    let mask: BooleanArray = table
        .values(col)
        .into_iter()
        .map(|v| Some(!is_summary_row(v)))
        .collect();
    table.filter(&mask)
}
