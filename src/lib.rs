//! Public-health surveillance dashboard for the Ipojuca health-surveillance office.
//!
//! Every page follows the same one-way pipeline: a published Google Sheet is
//! fetched as CSV ([`fetch`]), parsed into a string table ([`table`]), its
//! drifting headers are mapped onto semantic roles ([`schema`]), a handful of
//! categorical values are canonicalised ([`process`]), the user's selections
//! are applied ([`filter`]) and the filtered rows are aggregated
//! ([`aggregate`]) into a serializable [`report::PageReport`].

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod pages;
pub mod process;
pub mod report;
pub mod schema;
pub mod server;
pub mod table;

pub use config::Settings;
pub use error::LoadError;
pub use fetch::{SheetCache, SheetLoader};
pub use pages::{Page, PageKind};
pub use report::PageReport;
pub use schema::{ResolvedColumns, Role};
