// src/process/mod.rs
//! Value Normalizer: dates, categorical labels and derived columns.

pub mod columns;
pub mod date_parser;
pub mod values;

pub use columns::{derive_column, drop_summary_rows, map_column, scrub_sensitive};
pub use date_parser::{iso_week, month_name, parse_date, year_month, MONTHS};
pub use values::{
    age_band, age_band_from_years, epi_week, is_fatality, is_yes, label, label_title, label_upper,
    natural_cmp, parse_number, AGE_BANDS, UNKNOWN,
};
