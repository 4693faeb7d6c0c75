use chrono::{Datelike, NaiveDate};

/// Date layouts seen in the sheets: Brazilian day-first first, ISO after.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Years outside this window are typing errors (`01/03/25` read as year 25).
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2200;

/// Portuguese month names, January first.
pub const MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Parse a sheet date cell, ignoring any time-of-day suffix.
/// Returns `None` for blanks and anything not in [`DATE_FORMATS`].
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split([' ', 'T']).next()?;
    if date_part.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .filter(|d| (MIN_YEAR..=MAX_YEAR).contains(&d.year()))
}

/// ISO-8601 calendar week (1..=53).
pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// `1` → `"Janeiro"`; out-of-range months yield `None`.
pub fn month_name(month: u32) -> Option<&'static str> {
    MONTHS.get(month.checked_sub(1)? as usize).copied()
}

/// `"2025-03"` style key used for monthly buckets.
pub fn year_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_day_first_and_iso() {
        assert_eq!(parse_date("01/03/2025"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_date(" 1/3/2025 "), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_date("15-08-2024"), Some(ymd(2024, 8, 15)));
        assert_eq!(parse_date("2024-08-15"), Some(ymd(2024, 8, 15)));
        assert_eq!(parse_date("2024/08/15 13:45:00"), Some(ymd(2024, 8, 15)));
        assert_eq!(parse_date("2024-08-15T00:00:00"), Some(ymd(2024, 8, 15)));
        assert_eq!(parse_date("31/12/2023 23:59"), Some(ymd(2023, 12, 31)));
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "   ", "IGNORADO", "31/02/2025", "01/03/25", "2025", "13/13/2025"] {
            assert_eq!(parse_date(s), None, "{s:?} parsed");
        }
    }

    #[test]
    fn iso_weeks() {
        assert_eq!(iso_week(ymd(2025, 1, 1)), 1);
        assert_eq!(iso_week(ymd(2021, 1, 3)), 53);
        assert_eq!(iso_week(ymd(2025, 6, 4)), 23);
    }

    #[test]
    fn month_names_and_keys() {
        assert_eq!(month_name(1), Some("Janeiro"));
        assert_eq!(month_name(12), Some("Dezembro"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
        assert_eq!(year_month(ymd(2025, 3, 9)), "2025-03");
    }
}
