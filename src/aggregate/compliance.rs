//! 30/90-day deadline compliance for sanitary inspection requests.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{rate, round2};
use crate::process::{month_name, parse_date};
use crate::table::SheetTable;

pub const FIRST_INSPECTION_DAYS: i64 = 30;
pub const CONCLUSION_DAYS: i64 = 90;

/// Deadline outcome of one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeadlineFlags {
    pub intake: Option<NaiveDate>,
    pub deadline_30: Option<NaiveDate>,
    pub deadline_90: Option<NaiveDate>,
    /// First inspection recorded on or before `deadline_30`.
    pub met_30: bool,
    /// Conclusion recorded on or before `deadline_90`.
    pub met_90: bool,
}

/// Milestone met iff it is present and not after the deadline. A missing
/// milestone is "not yet met".
fn met(milestone: Option<NaiveDate>, deadline: Option<NaiveDate>) -> bool {
    matches!((milestone, deadline), (Some(m), Some(d)) if m <= d)
}

/// Flags for every row. Missing columns behave like all-blank columns.
pub fn deadline_flags(
    table: &SheetTable,
    intake: &str,
    first_inspection: Option<&str>,
    conclusion: Option<&str>,
) -> Vec<DeadlineFlags> {
    let parse = |col: Option<&str>| -> Vec<Option<NaiveDate>> {
        match col {
            Some(c) => table
                .values(c)
                .into_iter()
                .map(|v| v.and_then(parse_date))
                .collect(),
            None => vec![None; table.num_rows()],
        }
    };
    let intakes = parse(Some(intake));
    let firsts = parse(first_inspection);
    let ends = parse(conclusion);

    intakes
        .into_iter()
        .zip(firsts)
        .zip(ends)
        .map(|((intake, first), end)| {
            let deadline_30 = intake.map(|d| d + Duration::days(FIRST_INSPECTION_DAYS));
            let deadline_90 = intake.map(|d| d + Duration::days(CONCLUSION_DAYS));
            DeadlineFlags {
                intake,
                deadline_30,
                deadline_90,
                met_30: met(first, deadline_30),
                met_90: met(end, deadline_90),
            }
        })
        .collect()
}

/// One line of the monthly compliance table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyCompliance {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub entries: usize,
    pub met_30: usize,
    pub pct_30: f64,
    pub met_90: usize,
    pub pct_90: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComplianceKpis {
    pub total: usize,
    pub met_30: usize,
    pub pct_30: f64,
    pub met_90: usize,
    pub pct_90: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Compliance {
    /// Newest year first, months ascending within a year.
    pub monthly: Vec<MonthlyCompliance>,
    pub kpis: ComplianceKpis,
}

/// Monthly table plus overall KPIs over `flags`. Rows without an intake date
/// count towards the KPI total but not towards any month.
pub fn compliance(flags: &[DeadlineFlags]) -> Compliance {
    let mut by_month: BTreeMap<(i32, u32), (usize, usize, usize)> = BTreeMap::new();
    for f in flags {
        if let Some(d) = f.intake {
            let slot = by_month.entry((d.year(), d.month())).or_default();
            slot.0 += 1;
            slot.1 += usize::from(f.met_30);
            slot.2 += usize::from(f.met_90);
        }
    }

    let mut monthly: Vec<MonthlyCompliance> = by_month
        .into_iter()
        .map(|((year, month), (entries, m30, m90))| MonthlyCompliance {
            year,
            month,
            month_name: month_name(month).unwrap_or_default(),
            entries,
            met_30: m30,
            pct_30: round2(rate(m30, entries)),
            met_90: m90,
            pct_90: round2(rate(m90, entries)),
        })
        .collect();
    monthly.sort_by(|a, b| b.year.cmp(&a.year).then(a.month.cmp(&b.month)));

    let total = flags.len();
    let met_30 = flags.iter().filter(|f| f.met_30).count();
    let met_90 = flags.iter().filter(|f| f.met_90).count();
    Compliance {
        monthly,
        kpis: ComplianceKpis {
            total,
            met_30,
            pct_30: round2(rate(met_30, total)),
            met_90,
            pct_90: round2(rate(met_90, total)),
        },
    }
}
