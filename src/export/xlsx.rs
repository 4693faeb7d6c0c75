//! Minimal multi-sheet XLSX writer: inline-string cells, no styles.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::report::NamedTable;

/// Sheet names are limited to 31 characters by the format.
pub const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Make `names` valid and unique sheet names, keeping their order.
pub fn sheet_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    names
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let cleaned: String = raw
                .as_ref()
                .chars()
                .filter(|c| !FORBIDDEN.contains(c))
                .collect();
            let cleaned = cleaned.trim().trim_matches('\'');
            let base: String = if cleaned.is_empty() {
                format!("Planilha{}", i + 1)
            } else {
                cleaned.chars().take(MAX_SHEET_NAME).collect()
            };

            let mut name = base.clone();
            let mut n = 2;
            while !used.insert(name.to_lowercase()) {
                let suffix = format!(" ({n})");
                let keep = MAX_SHEET_NAME - suffix.chars().count();
                name = base.chars().take(keep).collect::<String>() + &suffix;
                n += 1;
            }
            name
        })
        .collect()
}

fn escape_xml(s: &str) -> String {
    s.chars()
        .filter(|c| matches!(c, '\t' | '\n' | '\r') || !c.is_control())
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// `0` → `A`, `25` → `Z`, `26` → `AA`.
fn column_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Write `sheets` as one workbook, one worksheet per table.
pub fn write_xlsx<W: Write + Seek>(writer: W, sheets: &[NamedTable]) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();
    let names = sheet_names(&sheets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>());

    zip.start_file("[Content_Types].xml", options)?;
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    for i in 0..sheets.len() {
        content.push_str(&format!(
            r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }
    content.push_str("\n</Types>");
    zip.write_all(content.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
    )?;

    zip.start_file("xl/workbook.xml", options)?;
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>"#,
    );
    for (i, name) in names.iter().enumerate() {
        content.push_str(&format!(
            r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(name),
            i + 1,
            i + 1
        ));
    }
    content.push_str("\n    </sheets>\n</workbook>");
    zip.write_all(content.as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 0..sheets.len() {
        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1,
            i + 1
        ));
    }
    content.push_str("\n</Relationships>");
    zip.write_all(content.as_bytes())?;

    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(worksheet_xml(sheet).as_bytes())?;
    }

    zip.finish().context("finishing xlsx archive")?;
    Ok(())
}

fn worksheet_xml(sheet: &NamedTable) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <sheetData>"#,
    );
    let header = sheet.columns.iter().map(|c| Some(c.as_str()));
    let rows = std::iter::once(header.collect::<Vec<_>>()).chain(
        sheet
            .rows
            .iter()
            .map(|r| r.iter().map(|c| c.as_deref()).collect()),
    );
    for (r, cells) in rows.enumerate() {
        content.push_str(&format!("\n        <row r=\"{}\">", r + 1));
        for (c, cell) in cells.into_iter().enumerate() {
            let Some(text) = cell else { continue };
            content.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_letter(c),
                r + 1,
                escape_xml(text)
            ));
        }
        content.push_str("</row>");
    }
    content.push_str("\n    </sheetData>\n</worksheet>");
    content
}

/// Workbook bytes for `sheets`.
pub fn to_xlsx_bytes(sheets: &[NamedTable]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_xlsx(&mut cursor, sheets)?;
    Ok(cursor.into_inner())
}
