// src/filter/mod.rs
//! Filter Engine: sidebar widgets for the roles that resolved, and the
//! conjunctive row mask built from a [`FilterRequest`].

pub mod request;

use anyhow::Result;
use arrow::array::BooleanArray;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

pub use request::{FilterRequest, PeriodMode};

use crate::process::{label, month_name, natural_cmp, parse_date};
use crate::schema::normalize::normalize_text;
use crate::schema::{ResolvedColumns, Role};
use crate::table::SheetTable;

/// A role bound to the table column that carries it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterField {
    pub role: Role,
    pub column: String,
}

/// Which columns a page lets the user filter on. Roles whose column did not
/// resolve are never added, so they get neither a widget nor a predicate.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    pub categorical: Vec<FilterField>,
    pub date: Option<FilterField>,
    /// Offer the year/month vs. range toggle for the date field.
    pub period_toggle: bool,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add categorical filters for `roles`, in order, using their resolved columns.
    pub fn categorical_roles(mut self, columns: &ResolvedColumns, roles: &[Role]) -> Self {
        for &role in roles {
            if let Some(col) = columns.get(role) {
                self = self.categorical(role, col);
            }
        }
        self
    }

    /// Add a categorical filter on an explicit (possibly derived) column.
    pub fn categorical(mut self, role: Role, column: impl Into<String>) -> Self {
        if !self.categorical.iter().any(|f| f.role == role) {
            self.categorical.push(FilterField {
                role,
                column: column.into(),
            });
        }
        self
    }

    pub fn date(mut self, role: Role, column: Option<&str>) -> Self {
        self.date = column.map(|c| FilterField {
            role,
            column: c.to_string(),
        });
        self
    }

    pub fn with_period_toggle(mut self) -> Self {
        self.period_toggle = true;
        self
    }
}

/// Sidebar control, described as data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    MultiSelect {
        key: String,
        label: String,
        options: Vec<String>,
        /// Whether every option starts selected (same effect as none selected).
        default_all: bool,
    },
    DateRange {
        key: String,
        label: String,
        min: NaiveDate,
        max: NaiveDate,
    },
    PeriodMode {
        key: String,
        modes: Vec<PeriodMode>,
        years: Vec<i32>,
        default_year: Option<i32>,
        months: Vec<MonthOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthOption {
    pub value: u32,
    pub label: &'static str,
}

/// Distinct labels of a column, sorted; blanks appear as `IGNORADO`.
pub fn options(table: &SheetTable, column: &str) -> Vec<String> {
    let mut out: Vec<String> = table
        .values(column)
        .into_iter()
        .map(label)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    out.sort_by(|a, b| natural_cmp(a, b));
    out
}

/// Parsed dates of a column; unparseable cells are `None`.
pub fn dates(table: &SheetTable, column: &str) -> Vec<Option<NaiveDate>> {
    table
        .values(column)
        .into_iter()
        .map(|v| v.and_then(parse_date))
        .collect()
}

/// Widgets for every field in `set`. A date field with no parseable date gets
/// no widget.
pub fn widgets(table: &SheetTable, set: &FilterSet, current_year: i32) -> Vec<Widget> {
    let mut out: Vec<Widget> = set
        .categorical
        .iter()
        .map(|f| Widget::MultiSelect {
            key: f.role.key().to_string(),
            label: f.role.label().to_string(),
            options: options(table, &f.column),
            default_all: true,
        })
        .collect();

    let Some(field) = &set.date else {
        return out;
    };
    let parsed: Vec<NaiveDate> = dates(table, &field.column).into_iter().flatten().collect();
    let (Some(min), Some(max)) = (parsed.iter().min(), parsed.iter().max()) else {
        debug!(column = %field.column, "no parseable dates; date widget omitted");
        return out;
    };

    if set.period_toggle {
        let years: Vec<i32> = parsed
            .iter()
            .map(|d| d.year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .rev()
            .collect();
        out.push(Widget::PeriodMode {
            key: "mode".to_string(),
            modes: vec![PeriodMode::YearMonth, PeriodMode::Range],
            default_year: default_year(&years, current_year),
            years,
            months: (1..=12)
                .filter_map(|m| month_name(m).map(|label| MonthOption { value: m, label }))
                .collect(),
        });
    }
    out.push(Widget::DateRange {
        key: field.role.key().to_string(),
        label: field.role.label().to_string(),
        min: *min,
        max: *max,
    });
    out
}

/// The current year when the data has it, otherwise the earliest one.
pub fn default_year(years: &[i32], current_year: i32) -> Option<i32> {
    if years.contains(&current_year) {
        Some(current_year)
    } else {
        years.iter().copied().min()
    }
}

/// Date predicate in effect for a request.
#[derive(Clone, Debug, PartialEq)]
enum DateRule {
    Off,
    Range(Option<NaiveDate>, Option<NaiveDate>),
    YearMonth(i32, Vec<u32>),
}

impl DateRule {
    fn matches(&self, date: Option<NaiveDate>) -> bool {
        match (self, date) {
            (DateRule::Off, _) => true,
            (_, None) => false,
            (DateRule::Range(start, end), Some(d)) => {
                start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e)
            }
            (DateRule::YearMonth(year, months), Some(d)) => {
                d.year() == *year && (months.is_empty() || months.contains(&d.month()))
            }
        }
    }
}

fn date_rule(set: &FilterSet, req: &FilterRequest, years: &[i32], current_year: i32) -> DateRule {
    let range = || {
        if req.has_date_range() {
            DateRule::Range(req.date_start, req.date_end)
        } else {
            DateRule::Off
        }
    };
    if !set.period_toggle {
        return range();
    }
    match req.mode {
        Some(PeriodMode::Range) => range(),
        None if req.has_date_range() => range(),
        // year/month is the default mode when the toggle is offered
        _ => match req.year.or_else(|| default_year(years, current_year)) {
            Some(y) => DateRule::YearMonth(y, req.months.clone()),
            None => DateRule::Off,
        },
    }
}

/// Row mask: AND across roles, membership within a role. Categorical values
/// compare accent- and case-insensitively on their labels.
pub fn mask(
    table: &SheetTable,
    set: &FilterSet,
    req: &FilterRequest,
    current_year: i32,
) -> BooleanArray {
    let mut keep = vec![true; table.num_rows()];

    for field in &set.categorical {
        let selected = req.selected(field.role);
        if selected.is_empty() {
            continue;
        }
        let wanted: BTreeSet<String> = selected.iter().map(|s| normalize_text(s)).collect();
        for (row, value) in table.values(&field.column).into_iter().enumerate() {
            if keep[row] && !wanted.contains(&normalize_text(&label(value))) {
                keep[row] = false;
            }
        }
    }

    if let Some(field) = &set.date {
        let parsed = dates(table, &field.column);
        let years: Vec<i32> = parsed
            .iter()
            .flatten()
            .map(|d| d.year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rule = date_rule(set, req, &years, current_year);
        if rule != DateRule::Off {
            for (row, d) in parsed.into_iter().enumerate() {
                if keep[row] && !rule.matches(d) {
                    keep[row] = false;
                }
            }
        }
    }

    BooleanArray::from(keep)
}

/// Filtered view of `table`.
pub fn apply(
    table: &SheetTable,
    set: &FilterSet,
    req: &FilterRequest,
    current_year: i32,
) -> Result<SheetTable> {
    let m = mask(table, set, req, current_year);
    let out = table.filter(&m)?;
    debug!(before = table.num_rows(), after = out.num_rows(), "filters applied");
    Ok(out)
}
