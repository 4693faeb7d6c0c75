// src/export/mod.rs
//! "Download filtered data": CSV for every page, multi-sheet XLSX where a page
//! has more than one table. A failed export degrades to
//! [`ExportStatus::Unavailable`], never to a page error.

pub mod xlsx;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use tracing::warn;

pub use xlsx::{sheet_names, to_xlsx_bytes, write_xlsx};

use crate::report::NamedTable;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Informational notice when a download cannot be produced.
pub const UNAVAILABLE_NOTICE: &str = "download não disponível";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportStatus {
    Available { format: ExportFormat, bytes: usize },
    Unavailable { format: ExportFormat, reason: String },
}

/// Write `table` as CSV (header first), optionally prefixed with a UTF-8 BOM.
pub fn write_csv<W: Write>(mut writer: W, table: &NamedTable, bom: bool) -> Result<()> {
    if bom {
        writer.write_all(BOM)?;
    }
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or_default()))?;
    }
    wtr.flush().context("flushing csv")?;
    Ok(())
}

pub fn to_csv_bytes(table: &NamedTable, bom: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, table, bom)?;
    Ok(buf)
}

/// Produce the download for `format`. CSV uses the first table only.
pub fn export(tables: &[NamedTable], format: ExportFormat, bom: bool) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => {
            let first = tables.first().context("nothing to export")?;
            to_csv_bytes(first, bom)
        }
        ExportFormat::Xlsx => to_xlsx_bytes(tables),
    }
}

/// Like [`export`] but folds failures into a status for the report.
pub fn try_export(
    tables: &[NamedTable],
    format: ExportFormat,
    bom: bool,
) -> (Option<Vec<u8>>, ExportStatus) {
    match export(tables, format, bom) {
        Ok(bytes) => {
            let status = ExportStatus::Available {
                format,
                bytes: bytes.len(),
            };
            (Some(bytes), status)
        }
        Err(e) => {
            warn!(format = format.extension(), error = %e, "export unavailable");
            (
                None,
                ExportStatus::Unavailable {
                    format,
                    reason: format!("{UNAVAILABLE_NOTICE}: {e}"),
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    fn sample() -> NamedTable {
        NamedTable {
            name: "dados".into(),
            columns: vec!["BAIRRO".into(), "OBS".into()],
            rows: vec![
                vec![Some("São José".into()), Some("a, b".into())],
                vec![None, Some("x".into())],
            ],
        }
    }

    #[test]
    fn csv_with_and_without_bom() -> Result<()> {
        let with = to_csv_bytes(&sample(), true)?;
        assert!(with.starts_with(BOM));
        let text = String::from_utf8(with[BOM.len()..].to_vec())?;
        assert_eq!(text, "BAIRRO,OBS\nSão José,\"a, b\"\n,x\n");

        let without = to_csv_bytes(&sample(), false)?;
        assert!(!without.starts_with(BOM));
        Ok(())
    }

    #[test]
    fn csv_to_file() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        write_csv(fs::File::create(tmp.path())?, &sample(), false)?;
        let text = fs::read_to_string(tmp.path())?;
        assert!(text.starts_with("BAIRRO,OBS\n"));
        Ok(())
    }

    #[test]
    fn failures_degrade_to_status() {
        let (bytes, status) = try_export(&[], ExportFormat::Csv, true);
        assert!(bytes.is_none());
        match status {
            ExportStatus::Unavailable { reason, .. } => {
                assert!(reason.starts_with(UNAVAILABLE_NOTICE))
            }
            other => panic!("unexpected {other:?}"),
        }

        let (bytes, status) = try_export(&[sample()], ExportFormat::Xlsx, true);
        assert!(bytes.is_some());
        assert!(matches!(status, ExportStatus::Available { format: ExportFormat::Xlsx, .. }));
    }
}
