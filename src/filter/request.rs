use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::process::{parse_date, MONTHS};
use crate::schema::normalize::normalize_text;
use crate::schema::Role;

/// How the date filter is expressed on pages that offer the toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMode {
    /// One year plus any subset of its months.
    YearMonth,
    /// Inclusive `[date_start, date_end]`.
    Range,
}

impl PeriodMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodMode::YearMonth => "year_month",
            PeriodMode::Range => "range",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "year_month" | "ano_mes" | "ano/mes" => Some(PeriodMode::YearMonth),
            "range" | "intervalo" => Some(PeriodMode::Range),
            _ => None,
        }
    }
}

/// Everything the user picked on a page, rebuilt from the query string on
/// every request. An empty selection for a role means "no restriction".
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterRequest {
    pub selections: BTreeMap<Role, Vec<String>>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub mode: Option<PeriodMode>,
    pub year: Option<i32>,
    pub months: Vec<u32>,
}

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs. Role keys repeat for multi-selection; `month`
    /// accepts `1`..`12` or a Portuguese month name. Unknown keys and
    /// unparseable values are ignored.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut req = Self::default();
        for (k, v) in pairs {
            let (key, value) = (k.as_ref().trim(), v.as_ref().trim());
            if value.is_empty() {
                continue;
            }
            match key {
                "date_start" => req.date_start = parse_date(value),
                "date_end" => req.date_end = parse_date(value),
                "mode" => req.mode = PeriodMode::from_str(value),
                "year" => req.year = value.parse().ok(),
                "month" => {
                    if let Some(m) = parse_month(value) {
                        if !req.months.contains(&m) {
                            req.months.push(m);
                        }
                    }
                }
                other => match Role::from_key(other) {
                    Some(role) => req.select(role, value),
                    None => debug!(key = other, "ignoring unknown filter key"),
                },
            }
        }
        req.months.sort_unstable();
        req
    }

    /// Add one value to a role's selection.
    pub fn select(&mut self, role: Role, value: impl Into<String>) {
        let value = value.into();
        let values = self.selections.entry(role).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub fn with_selection(mut self, role: Role, values: &[&str]) -> Self {
        for v in values {
            self.select(role, *v);
        }
        self
    }

    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn with_year_month(mut self, year: i32, months: &[u32]) -> Self {
        self.mode = Some(PeriodMode::YearMonth);
        self.year = Some(year);
        self.months = months.to_vec();
        self
    }

    /// Selected values for a role; empty when nothing was picked.
    pub fn selected(&self, role: Role) -> &[String] {
        self.selections.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_date_range(&self) -> bool {
        self.date_start.is_some() || self.date_end.is_some()
    }
}

fn parse_month(value: &str) -> Option<u32> {
    if let Ok(n) = value.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let wanted = normalize_text(value);
    MONTHS
        .iter()
        .position(|m| normalize_text(m) == wanted)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles_dates_and_period() {
        let req = FilterRequest::from_query_pairs([
            ("locality", "Centro"),
            ("locality", "Camela"),
            ("locality", "Centro"),
            ("sex", "F"),
            ("date_start", "2025-01-01"),
            ("date_end", "31/03/2025"),
            ("mode", "year_month"),
            ("year", "2025"),
            ("month", "3"),
            ("month", "Janeiro"),
            ("month", "março"),
            ("month", "13"),
            ("bogus", "x"),
            ("race", "  "),
        ]);
        assert_eq!(req.selected(Role::Locality), ["Centro", "Camela"]);
        assert_eq!(req.selected(Role::Sex), ["F"]);
        assert!(req.selected(Role::Race).is_empty());
        assert_eq!(req.date_start, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(req.date_end, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert_eq!(req.mode, Some(PeriodMode::YearMonth));
        assert_eq!(req.year, Some(2025));
        assert_eq!(req.months, vec![1, 3]);
    }

    #[test]
    fn empty_query_is_default() {
        let req = FilterRequest::from_query_pairs(Vec::<(String, String)>::new());
        assert_eq!(req, FilterRequest::default());
        assert!(!req.has_date_range());
    }

    #[test]
    fn bad_values_are_dropped() {
        let req = FilterRequest::from_query_pairs([
            ("date_start", "yesterday"),
            ("year", "two thousand"),
            ("mode", "weekly"),
        ]);
        assert_eq!(req, FilterRequest::default());
    }

    #[test]
    fn mode_names() {
        for mode in [PeriodMode::YearMonth, PeriodMode::Range] {
            assert_eq!(PeriodMode::from_str(mode.as_str()), Some(mode));
        }
        assert_eq!(PeriodMode::from_str("Intervalo"), Some(PeriodMode::Range));
    }
}
