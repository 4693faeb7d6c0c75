// src/aggregate/mod.rs
//! Group-by counts, sums and rates over a filtered view.

pub mod compliance;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub use compliance::{
    compliance, deadline_flags, Compliance, ComplianceKpis, DeadlineFlags, MonthlyCompliance,
};

use crate::process::{label, natural_cmp, parse_number};
use crate::table::SheetTable;

/// One bucket of a one-way group-by.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Count {
    pub key: String,
    pub count: usize,
}

/// One bucket of a two-way group-by.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PairCount {
    pub key: String,
    pub group: String,
    pub count: usize,
}

fn counts(items: impl IntoIterator<Item = (String, usize)>) -> Vec<Count> {
    items
        .into_iter()
        .map(|(key, count)| Count { key, count })
        .collect()
}

/// Rows per label of `column`, sorted by label (numbers by value). Blanks
/// count as `IGNORADO`.
pub fn count_by(table: &SheetTable, column: &str) -> Vec<Count> {
    let mut map: BTreeMap<String, usize> = BTreeMap::new();
    for v in table.values(column) {
        *map.entry(label(v)).or_default() += 1;
    }
    let mut out = counts(map);
    out.sort_by(|a, b| natural_cmp(&a.key, &b.key));
    out
}

/// Rows per label, largest first; equal counts keep first-appearance order.
pub fn value_counts(table: &SheetTable, column: &str) -> Vec<Count> {
    let mut order: Vec<String> = Vec::new();
    let mut map: HashMap<String, usize> = HashMap::new();
    for v in table.values(column) {
        let key = label(v);
        let slot = map.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            0
        });
        *slot += 1;
    }
    let mut out: Vec<Count> = order
        .into_iter()
        .map(|key| {
            let count = map.get(&key).copied().unwrap_or_default();
            Count { key, count }
        })
        .collect();
    // sort_by is stable
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// Top `n` of [`value_counts`].
pub fn top_n(table: &SheetTable, column: &str, n: usize) -> Vec<Count> {
    let mut all = value_counts(table, column);
    all.truncate(n);
    all
}

/// Rows per (`column`, `group`) label pair, sorted by both.
pub fn count_by_pair(table: &SheetTable, column: &str, group: &str) -> Vec<PairCount> {
    let mut map: BTreeMap<(String, String), usize> = BTreeMap::new();
    for (a, b) in table.values(column).into_iter().zip(table.values(group)) {
        *map.entry((label(a), label(b))).or_default() += 1;
    }
    map.into_iter()
        .map(|((key, group), count)| PairCount { key, group, count })
        .collect()
}

/// Most common non-blank value; ties go to the one seen first.
pub fn most_frequent(table: &SheetTable, column: &str) -> Option<Count> {
    let mut order: Vec<&str> = Vec::new();
    let mut map: HashMap<&str, usize> = HashMap::new();
    for v in table.values(column).into_iter().flatten() {
        let slot = map.entry(v).or_insert_with(|| {
            order.push(v);
            0
        });
        *slot += 1;
    }
    let mut best: Option<Count> = None;
    for key in order {
        let count = map.get(key).copied().unwrap_or_default();
        if best.as_ref().map_or(true, |b| count > b.count) {
            best = Some(Count {
                key: key.to_string(),
                count,
            });
        }
    }
    best
}

/// Sum of the numeric cells of `column`; others are skipped.
pub fn sum_numeric(table: &SheetTable, column: &str) -> f64 {
    table
        .values(column)
        .into_iter()
        .flatten()
        .filter_map(parse_number)
        .sum()
}

/// Numeric sum per label of `key_column`, sorted by label.
pub fn sum_by(table: &SheetTable, key_column: &str, value_column: &str) -> Vec<(String, f64)> {
    let mut map: BTreeMap<String, f64> = BTreeMap::new();
    for (k, v) in table
        .values(key_column)
        .into_iter()
        .zip(table.values(value_column))
    {
        *map.entry(label(k)).or_default() += v.and_then(parse_number).unwrap_or_default();
    }
    map.into_iter().collect()
}

/// Rows of `column` for which `pred` holds.
pub fn count_matching<F>(table: &SheetTable, column: &str, pred: F) -> usize
where
    F: Fn(Option<&str>) -> bool,
{
    table.values(column).into_iter().filter(|v| pred(*v)).count()
}

/// `hits / total * 100`, and `0` when `total` is `0`.
pub fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}

/// Round to two decimals for display.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
