//! Total functions that canonicalise free-text cells. None of them fail:
//! blanks and unknown values land in [`UNKNOWN`].

use chrono::NaiveDate;
use std::cmp::Ordering;
use once_cell::sync::Lazy;
use regex::Regex;

use super::date_parser::iso_week;
use crate::schema::normalize::{normalize_header, normalize_text};

/// Bucket for missing or unrecognised categorical values.
pub const UNKNOWN: &str = "IGNORADO";

/// Coarse age bands in display order. The last one is [`UNKNOWN`].
pub const AGE_BANDS: [&str; 8] = [
    "1 a 4 anos",
    "5 a 9 anos",
    "10 a 14 anos",
    "15 a 19 anos",
    "20 a 39 anos",
    "40 a 59 anos",
    "60 anos ou mais",
    UNKNOWN,
];

/// Fine-grained band (normalized text) → coarse band.
const AGE_BAND_MAP: &[(&str, &str)] = &[
    ("MENOR DE 1 ANO", "1 a 4 anos"),
    ("0 A 4", "1 a 4 anos"),
    ("1 A 4", "1 a 4 anos"),
    ("5 A 9", "5 a 9 anos"),
    ("10 A 14", "10 a 14 anos"),
    ("15 A 19", "15 a 19 anos"),
    ("20 A 29", "20 a 39 anos"),
    ("30 A 39", "20 a 39 anos"),
    ("20 A 39", "20 a 39 anos"),
    ("40 A 49", "40 a 59 anos"),
    ("50 A 59", "40 a 59 anos"),
    ("40 A 59", "40 a 59 anos"),
    ("60 A 69", "60 anos ou mais"),
    ("70 A 79", "60 anos ou mais"),
    ("80 OU MAIS", "60 anos ou mais"),
    ("80 E MAIS", "60 anos ou mais"),
    ("60 OU MAIS", "60 anos ou mais"),
];

/// Normalized substrings marking a death in an outcome field.
pub const FATALITY_PATTERNS: &[&str] = &[
    "OBITO",
    "MORTE",
    "FALEC",
    "OBITO POR ACIDENTE DE TRABALHO GRAVE",
    "OBITO POR OUTRAS CAUSAS",
    "OBITO PELO AGRAVO",
];

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit regex"));

/// Cell text for grouping: trimmed value, or [`UNKNOWN`] when blank.
pub fn label(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Like [`label`] but upper-cased, for columns whose casing drifts (`Dengue`/`DENGUE`).
pub fn label_upper(value: Option<&str>) -> String {
    label(value).to_uppercase()
}

/// Title-case each word: `"ALTO RISCO"` → `"Alto Risco"`.
pub fn label_title(value: Option<&str>) -> String {
    let raw = label(value);
    if raw == UNKNOWN {
        return raw;
    }
    raw.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a fine-grained age range onto [`AGE_BANDS`]. Never returns anything else.
pub fn age_band(value: Option<&str>) -> &'static str {
    let Some(raw) = value else { return UNKNOWN };
    let text = normalize_text(raw);
    let text = text.strip_suffix(" ANOS").unwrap_or(&text);
    AGE_BAND_MAP
        .iter()
        .find(|(fine, _)| *fine == text)
        .map(|(_, coarse)| *coarse)
        .unwrap_or(UNKNOWN)
}

/// Band for an age in whole years (worker-health sheets carry raw ages).
pub fn age_band_from_years(value: Option<&str>) -> &'static str {
    let Some(age) = value.and_then(parse_number) else {
        return age_band(value);
    };
    match age {
        a if a < 0.0 => UNKNOWN,
        a if a < 5.0 => "1 a 4 anos",
        a if a < 10.0 => "5 a 9 anos",
        a if a < 15.0 => "10 a 14 anos",
        a if a < 20.0 => "15 a 19 anos",
        a if a < 40.0 => "20 a 39 anos",
        a if a < 60.0 => "40 a 59 anos",
        a if a < 130.0 => "60 anos ou mais",
        _ => UNKNOWN,
    }
}

/// True iff any of [`FATALITY_PATTERNS`] occurs in the normalized outcome text.
pub fn is_fatality(outcome: Option<&str>) -> bool {
    is_fatality_with(outcome, FATALITY_PATTERNS)
}

pub fn is_fatality_with(outcome: Option<&str>, patterns: &[&str]) -> bool {
    let Some(raw) = outcome else { return false };
    let text = normalize_text(raw);
    patterns.iter().any(|p| text.contains(p))
}

/// Epidemiological week: the first digit run of an explicit week cell, or the
/// ISO week of `date` when the cell is missing or has no digits.
pub fn epi_week(week_cell: Option<&str>, date: Option<NaiveDate>) -> Option<u32> {
    week_cell
        .and_then(|w| DIGITS.find(w))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .or_else(|| date.map(iso_week))
}

/// Parse a count cell. Accepts `1234`, `1.234` (thousands), `12,5`, `12.5`.
pub fn parse_number(value: &str) -> Option<f64> {
    let v = value.trim().replace(' ', "");
    if v.is_empty() {
        return None;
    }
    let cleaned = match (v.contains(','), v.contains('.')) {
        (true, true) => v.replace('.', "").replace(',', "."),
        (true, false) => v.replace(',', "."),
        (false, true) if looks_like_thousands(&v) => v.replace('.', ""),
        _ => v,
    };
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn looks_like_thousands(v: &str) -> bool {
    let mut parts = v.split('.');
    let head = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    !head.is_empty()
        && head.len() <= 3
        && !rest.is_empty()
        && rest.iter().all(|p| p.len() == 3 && p.chars().all(|c| c.is_ascii_digit()))
        && (rest.len() > 1 || head != "0")
}

/// Label order: numeric labels by value first, then text labels alphabetically.
/// Keeps week `2` ahead of week `10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let num = |s: &str| s.trim().parse::<f64>().ok().filter(|n| n.is_finite());
    match (num(a), num(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// `"SIM"`/`"sim"`/`" Sim "` → true.
pub fn is_yes(value: Option<&str>) -> bool {
    value.is_some_and(|v| normalize_text(v) == "SIM")
}

/// Normalized column-name fragments that identify personal data.
pub const SENSITIVE_TOKENS: &[&str] = &[
    "NOME",
    "PACIENTE",
    "MAE",
    "RUA",
    "ENDERECO",
    "TELEFONE",
    "CELULAR",
    "CPF",
    "NASCIMENTO",
    "DATA_NASC",
];

/// Whether a (normalized) column name holds personal data. `DN` only matches
/// as a whole name to avoid hitting unrelated headers.
pub fn is_sensitive_column(name: &str) -> bool {
    let name = normalize_header(name);
    name == "DN" || SENSITIVE_TOKENS.iter().any(|t| name.contains(t))
}

/// Summary rows appended by hand at the bottom of the sheet.
pub fn is_summary_row(locality: Option<&str>) -> bool {
    locality.is_some_and(|l| {
        let compact: String = normalize_text(l).chars().filter(|c| !c.is_whitespace()).collect();
        compact == "TOTAL" || compact == "TOTALGERAL"
    })
}
