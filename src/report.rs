// src/report.rs
//! Serializable output of one page run.

use serde::Serialize;

use crate::aggregate::{Count, PairCount};
use crate::export::ExportStatus;
use crate::filter::{FilterRequest, Widget};
use crate::schema::{HeaderCollision, ResolvedColumns};
use crate::table::SheetTable;

/// Notice shown instead of metrics and charts when no row survives the filters.
pub const EMPTY_NOTICE: &str = "Nenhum dado encontrado para os filtros selecionados.";

#[derive(Clone, Debug, Serialize)]
pub struct PageReport {
    pub page: &'static str,
    pub title: &'static str,
    pub source_url: String,
    pub resolved: ResolvedColumns,
    pub collisions: Vec<HeaderCollision>,
    pub widgets: Vec<Widget>,
    pub filters: FilterRequest,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub outcome: PageOutcome,
}

impl PageReport {
    pub fn is_empty(&self) -> bool {
        matches!(self.outcome, PageOutcome::Empty { .. })
    }

    pub fn rendered(&self) -> Option<&Rendered> {
        match &self.outcome {
            PageOutcome::Rendered(r) => Some(r),
            PageOutcome::Empty { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    Empty { notice: String },
    Rendered(Rendered),
}

impl PageOutcome {
    pub fn empty() -> Self {
        PageOutcome::Empty {
            notice: EMPTY_NOTICE.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Rendered {
    pub metrics: Vec<Metric>,
    pub charts: Vec<Chart>,
    /// Extra named tables (e.g. the monthly compliance table).
    pub tables: Vec<NamedTable>,
    /// The filtered rows as displayed.
    pub data: NamedTable,
    pub exports: Vec<ExportStatus>,
}

impl Rendered {
    pub fn metric(&self, id: &str) -> Option<&MetricValue> {
        self.metrics.iter().find(|m| m.id == id).map(|m| &m.value)
    }

    pub fn chart(&self, id: &str) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub id: &'static str,
    pub label: &'static str,
    pub value: MetricValue,
}

impl Metric {
    pub fn new(id: &'static str, label: &'static str, value: MetricValue) -> Self {
        Self { id, label, value }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(usize),
    Number(f64),
    Percent { percent: f64 },
    Text(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    HorizontalBar,
    GroupedBar,
    Pie,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartData {
    Counts(Vec<Count>),
    Pairs(Vec<PairCount>),
    Values(Vec<(String, f64)>),
}

impl ChartData {
    pub fn len(&self) -> usize {
        match self {
            ChartData::Counts(v) => v.len(),
            ChartData::Pairs(v) => v.len(),
            ChartData::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chart {
    pub id: &'static str,
    pub title: String,
    pub kind: ChartKind,
    pub data: ChartData,
}

impl Chart {
    pub fn new(id: &'static str, title: impl Into<String>, kind: ChartKind, data: ChartData) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
            data,
        }
    }

    pub fn counts(&self) -> &[Count] {
        match &self.data {
            ChartData::Counts(v) => v,
            _ => &[],
        }
    }
}

/// Plain string table, ready for JSON or the exporters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NamedTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl NamedTable {
    pub fn from_sheet(name: impl Into<String>, table: &SheetTable) -> Self {
        Self {
            name: name.into(),
            columns: table.column_names(),
            rows: table
                .rows()
                .into_iter()
                .map(|r| r.into_iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }
}
