//! In-memory sheet: every column is a nullable UTF-8 arrow array named by its
//! normalized header. Blank cells are null.

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, StringArray},
    compute::filter_record_batch,
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use csv::ReaderBuilder;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::schema::{resolve, Resolution, RoleSpec};

/// Header row plus data rows exactly as exported, before any renaming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Trim a cell and turn blanks into `None`.
pub fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a CSV export body.
pub fn parse_csv(body: &str) -> LoadResult<RawSheet> {
    let body = body.trim_start_matches('\u{feff}');
    let head = body.trim_start();
    if head.starts_with('<') {
        // Google answers private or missing sheets with an HTML login page.
        return Err(LoadError::NotCsv { url: String::new() });
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::EmptyHeader);
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: Vec<Option<String>> = (0..headers.len())
            .map(|i| record.get(i).and_then(clean_cell))
            .collect();
        if row.iter().all(Option::is_none) {
            continue;
        }
        rows.push(row);
    }

    debug!(columns = headers.len(), rows = rows.len(), "parsed csv");
    Ok(RawSheet { headers, rows })
}

/// String table backed by a single arrow [`RecordBatch`].
#[derive(Debug, Clone)]
pub struct SheetTable {
    batch: RecordBatch,
}

impl SheetTable {
    /// Resolve `raw`'s headers against `specs` and build the table from the
    /// surviving (de-duplicated, normalized) columns.
    pub fn from_raw(raw: &RawSheet, specs: &[RoleSpec]) -> LoadResult<(Self, Resolution)> {
        let resolution = resolve(&raw.headers, specs);

        let columns: Vec<(String, StringArray)> = resolution
            .headers
            .iter()
            .zip(&resolution.source_index)
            .map(|(name, &src)| {
                let values: StringArray = raw
                    .rows
                    .iter()
                    .map(|row| row.get(src).and_then(|c| c.as_deref()))
                    .collect();
                (name.clone(), values)
            })
            .collect();

        let table = Self::from_columns(columns, raw.rows.len())?;
        Ok((table, resolution))
    }

    /// Build from named string columns; all must have `num_rows` entries.
    pub fn from_columns(
        columns: Vec<(String, StringArray)>,
        num_rows: usize,
    ) -> Result<Self, arrow::error::ArrowError> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, _)| Field::new(name, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|(_, a)| Arc::new(a) as ArrayRef)
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
        Ok(Self { batch })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&StringArray> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    }

    /// Cell at (`name`, `row`); `None` for null cells and unknown columns.
    pub fn value(&self, name: &str, row: usize) -> Option<&str> {
        let col = self.column(name)?;
        if row >= col.len() || col.is_null(row) {
            None
        } else {
            Some(col.value(row))
        }
    }

    /// All cells of a column (nulls as `None`). Unknown column ⇒ all `None`.
    pub fn values<'a>(&'a self, name: &str) -> Vec<Option<&'a str>> {
        match self.column(name) {
            Some(col) => col.iter().collect(),
            None => vec![None; self.num_rows()],
        }
    }

    /// Replace `name` if present, otherwise append it.
    pub fn with_column(&self, name: &str, values: StringArray) -> Result<Self> {
        if values.len() != self.num_rows() {
            return Err(anyhow!(
                "column {} has {} values, table has {} rows",
                name,
                values.len(),
                self.num_rows()
            ));
        }
        let mut columns = self.named_columns();
        match columns.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = values,
            None => columns.push((name.to_string(), values)),
        }
        Self::from_columns(columns, self.num_rows())
            .with_context(|| format!("adding column {}", name))
    }

    /// Keep only the listed columns, in the listed order; unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let all = self.named_columns();
        let mut picked = Vec::with_capacity(names.len());
        for name in names {
            if let Some((n, a)) = all.iter().find(|(n, _)| n == name.as_ref()) {
                if !picked.iter().any(|(p, _): &(String, StringArray)| p == n) {
                    picked.push((n.clone(), a.clone()));
                }
            }
        }
        Self::from_columns(picked, self.num_rows()).context("selecting columns")
    }

    /// Remove the columns for which `drop` returns true.
    pub fn drop_columns<F: Fn(&str) -> bool>(&self, drop: F) -> Result<Self> {
        let kept: Vec<(String, StringArray)> = self
            .named_columns()
            .into_iter()
            .filter(|(n, _)| !drop(n))
            .collect();
        Self::from_columns(kept, self.num_rows()).context("dropping columns")
    }

    /// Rows where `mask` is true. Nulls in the mask count as false.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        let batch = filter_record_batch(&self.batch, mask).context("applying row mask")?;
        Ok(Self { batch })
    }

    /// Row-major copy of the table, for exporters.
    pub fn rows(&self) -> Vec<Vec<Option<&str>>> {
        let cols: Vec<&StringArray> = self
            .batch
            .columns()
            .iter()
            .filter_map(|c| c.as_any().downcast_ref::<StringArray>())
            .collect();
        (0..self.num_rows())
            .map(|r| {
                cols.iter()
                    .map(|c| if c.is_null(r) { None } else { Some(c.value(r)) })
                    .collect()
            })
            .collect()
    }

    fn named_columns(&self) -> Vec<(String, StringArray)> {
        self.batch
            .schema()
            .fields()
            .iter()
            .zip(self.batch.columns())
            .filter_map(|(f, c)| {
                c.as_any()
                    .downcast_ref::<StringArray>()
                    .map(|a| (f.name().clone(), a.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Role, RoleSpec};

    const SAMPLE: &str = "\u{feff}Data de Notificação,Bairro,Sexo,Evolução do Caso\n\
        01/03/2025,Centro, F ,Cura\n\
        ,,,\n\
        02/03/2025,Nossa Senhora do Ó,M,Óbito por acidente de trabalho grave\n\
        03/03/2025,Camela,,\n";

    #[test]
    fn parses_and_cleans_cells() -> anyhow::Result<()> {
        let raw = parse_csv(SAMPLE)?;
        assert_eq!(raw.headers[0], "Data de Notificação");
        assert_eq!(raw.rows.len(), 3, "blank row dropped");
        assert_eq!(raw.rows[0][2].as_deref(), Some("F"));
        assert_eq!(raw.rows[2][2], None);
        Ok(())
    }

    #[test]
    fn short_rows_are_padded() -> anyhow::Result<()> {
        let raw = parse_csv("A,B,C\n1\n1,2,3,4\n")?;
        assert_eq!(raw.rows[0], vec![Some("1".into()), None, None]);
        assert_eq!(raw.rows[1].len(), 3);
        Ok(())
    }

    #[test]
    fn html_body_is_rejected() {
        let err = parse_csv("<!DOCTYPE html><html><body>login</body></html>");
        assert!(matches!(err, Err(LoadError::NotCsv { .. })));
    }

    #[test]
    fn empty_body_has_no_header() {
        assert!(matches!(parse_csv(""), Err(LoadError::EmptyHeader)));
    }

    #[test]
    fn table_uses_normalized_names() -> anyhow::Result<()> {
        let raw = parse_csv(SAMPLE)?;
        let specs = [RoleSpec::contains(Role::Outcome, &["EVOLUCAO"])];
        let (table, res) = SheetTable::from_raw(&raw, &specs)?;
        assert_eq!(
            table.column_names(),
            vec!["DATA_DE_NOTIFICACAO", "BAIRRO", "SEXO", "EVOLUCAO_DO_CASO"]
        );
        assert_eq!(res.columns.get(Role::Outcome), Some("EVOLUCAO_DO_CASO"));
        assert_eq!(table.value("BAIRRO", 1), Some("Nossa Senhora do Ó"));
        assert_eq!(table.value("SEXO", 2), None);
        assert_eq!(table.value("NOPE", 0), None);
        Ok(())
    }

    #[test]
    fn column_operations() -> anyhow::Result<()> {
        let (table, _) = SheetTable::from_raw(&parse_csv(SAMPLE)?, &[])?;

        let added = table.with_column("X", StringArray::from(vec![Some("a"), None, Some("c")]))?;
        assert_eq!(added.column_names().last().map(String::as_str), Some("X"));
        assert!(table
            .with_column("X", StringArray::from(vec![Some("a")]))
            .is_err());

        let picked = added.select(&["X", "BAIRRO", "MISSING", "X"])?;
        assert_eq!(picked.column_names(), vec!["X", "BAIRRO"]);
        assert_eq!(picked.num_rows(), 3);

        let dropped = added.drop_columns(|n| n.starts_with("DATA"))?;
        assert!(!dropped.has_column("DATA_DE_NOTIFICACAO"));

        let mask = BooleanArray::from(vec![true, false, true]);
        let filtered = added.filter(&mask)?;
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.value("BAIRRO", 1), Some("Camela"));
        assert_eq!(filtered.rows()[0][0], Some("01/03/2025"));
        Ok(())
    }

    #[test]
    fn empty_selection_keeps_row_count() -> anyhow::Result<()> {
        let (table, _) = SheetTable::from_raw(&parse_csv(SAMPLE)?, &[])?;
        let none = table.select::<&str>(&[])?;
        assert_eq!(none.num_rows(), 3);
        assert!(none.column_names().is_empty());
        Ok(())
    }
}
