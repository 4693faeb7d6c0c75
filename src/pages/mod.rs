// src/pages/mod.rs
//! The five thematic pages and the home catalog.
//!
//! A page is a static candidate table plus three hooks: `prepare` adds derived
//! columns once per load, `filters` names the sidebar fields and `render`
//! turns a non-empty filtered view into metrics, charts and tables. The shared
//! pipeline in [`build_report`] does everything else.

pub mod dengue;
pub mod oropouche;
pub mod pce;
pub mod visa;
pub mod worker_health;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::aggregate::{count_by, count_by_pair, top_n, value_counts};
use crate::config::Settings;
use crate::error::PageError;
use crate::export::{try_export, ExportFormat, ExportStatus};
use crate::fetch::{LoadedSheet, SheetLoader};
use crate::filter::{self, FilterRequest, FilterSet, Widget};
use crate::process::AGE_BANDS;
use crate::report::{Chart, ChartData, ChartKind, NamedTable, PageOutcome, PageReport, Rendered};
use crate::schema::{ResolvedColumns, Role, RoleSpec};
use crate::table::SheetTable;

/// Per-page behaviour plugged into the shared pipeline.
pub trait Page: Send + Sync {
    fn kind(&self) -> PageKind;

    /// Ordered header candidates per role.
    fn specs(&self) -> &'static [RoleSpec];

    /// Derived columns and in-place canonicalisation. May rebind roles to the
    /// derived columns it adds.
    fn prepare(&self, table: SheetTable, _columns: &mut ResolvedColumns) -> Result<SheetTable> {
        Ok(table)
    }

    fn filters(&self, columns: &ResolvedColumns) -> FilterSet;

    /// Called only with at least one row.
    fn render(&self, view: &SheetTable, columns: &ResolvedColumns) -> Result<Rendered>;

    fn export_formats(&self) -> &'static [ExportFormat] {
        &[ExportFormat::Csv]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Dengue,
    WorkerHealth,
    Visa,
    Pce,
    Oropouche,
}

static DENGUE: dengue::DenguePage = dengue::DenguePage;
static WORKER_HEALTH: worker_health::WorkerHealthPage = worker_health::WorkerHealthPage;
static VISA: visa::VisaPage = visa::VisaPage;
static PCE: pce::PcePage = pce::PcePage;
static OROPOUCHE: oropouche::OropouchePage = oropouche::OropouchePage;

impl PageKind {
    pub const ALL: [PageKind; 5] = [
        PageKind::Dengue,
        PageKind::WorkerHealth,
        PageKind::Visa,
        PageKind::Pce,
        PageKind::Oropouche,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            PageKind::Dengue => "dengue",
            PageKind::WorkerHealth => "saude-trabalhador",
            PageKind::Visa => "visa",
            PageKind::Pce => "pce",
            PageKind::Oropouche => "oropouche",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim().to_lowercase();
        PageKind::ALL.iter().copied().find(|k| k.slug() == slug)
    }

    pub fn title(&self) -> &'static str {
        match self {
            PageKind::Dengue => "Vigilância das Arboviroses (Dengue)",
            PageKind::WorkerHealth => "Saúde do Trabalhador",
            PageKind::Visa => "Vigilância Sanitária (VISA)",
            PageKind::Pce => "Programa de Controle da Esquistossomose (PCE)",
            PageKind::Oropouche => "Oropouche",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PageKind::Dengue => {
                "Séries históricas, distribuição por bairro e perfil dos casos notificados."
            }
            PageKind::WorkerHealth => {
                "Acidentes relacionados ao trabalho por ocupação, território e desfecho."
            }
            PageKind::Visa => {
                "Entradas de processos e cumprimento dos prazos de 30 e 90 dias."
            }
            PageKind::Pce => "Exames, positivos e tratamentos por localidade.",
            PageKind::Oropouche => {
                "Casos por localidade, classificação e semana, com atenção às gestantes."
            }
        }
    }

    /// Published sheet each page reads unless overridden in [`Settings::sheets`].
    pub fn default_url(&self) -> &'static str {
        match self {
            PageKind::Dengue => "https://docs.google.com/spreadsheets/d/1bdHetdGEXLgXv7A2aGvOaItKxiAuyg0Ip0UER1BjjOg/export?format=csv",
            PageKind::WorkerHealth => "https://docs.google.com/spreadsheets/d/1Guru662qCn9bX8iZhckcbRu2nG8my4Eu5l5JK5yTNik/export?format=csv",
            PageKind::Visa => "https://docs.google.com/spreadsheets/d/1zsM8Zxdc-MnXSvV_OvOXiPoc1U4j-FOn/edit?usp=sharing",
            PageKind::Pce => "https://docs.google.com/spreadsheets/d/15Z5rsBKKY5nX2mi8Zn1u18IGcTsQ0o_E/edit?usp=sharing",
            PageKind::Oropouche => "https://docs.google.com/spreadsheets/d/1pk_X_h-tfpA53te1ViXcrY40SqSSI6WA/export?format=csv",
        }
    }

    pub fn sheet_url<'a>(&self, settings: &'a Settings) -> &'a str {
        settings
            .sheet_override(self.slug())
            .unwrap_or_else(|| self.default_url())
    }

    /// Whether this page offers downloads in `format`.
    pub fn offers(&self, format: ExportFormat) -> bool {
        self.page().export_formats().contains(&format)
    }

    pub fn page(&self) -> &'static dyn Page {
        match self {
            PageKind::Dengue => &DENGUE,
            PageKind::WorkerHealth => &WORKER_HEALTH,
            PageKind::Visa => &VISA,
            PageKind::Pce => &PCE,
            PageKind::Oropouche => &OROPOUCHE,
        }
    }
}

/// One card of the home page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub fn catalog() -> Vec<CatalogEntry> {
    PageKind::ALL
        .iter()
        .map(|k| CatalogEntry {
            slug: k.slug(),
            title: k.title(),
            description: k.description(),
        })
        .collect()
}

/// A finished page: the report plus the tables behind its downloads.
#[derive(Clone, Debug)]
pub struct PageRun {
    pub report: PageReport,
    /// Filtered data first, then any extra tables. Empty when nothing matched.
    pub export_tables: Vec<NamedTable>,
}

impl PageRun {
    pub fn export(&self, format: ExportFormat, bom: bool) -> (Option<Vec<u8>>, ExportStatus) {
        try_export(&self.export_tables, format, bom)
    }

    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("dados_filtrados_{}.{}", self.report.page, format.extension())
    }
}

/// Load the page's sheet (through the cache) and run the pipeline on it.
#[instrument(skip(loader, settings, request), fields(page = kind.slug()))]
pub async fn run_page(
    kind: PageKind,
    loader: &SheetLoader,
    settings: &Settings,
    request: &FilterRequest,
    today: NaiveDate,
) -> Result<PageRun, PageError> {
    let sheet = loader.load(kind.sheet_url(settings), kind.page().specs()).await?;
    Ok(build_report(kind, sheet, request, today, settings.csv_bom)?)
}

/// Prepare → widgets → filter → render. An empty view short-circuits to
/// [`PageOutcome::Empty`] before any aggregation.
pub fn build_report(
    kind: PageKind,
    sheet: LoadedSheet,
    request: &FilterRequest,
    today: NaiveDate,
    bom: bool,
) -> Result<PageRun> {
    let page = kind.page();
    let LoadedSheet {
        url,
        table,
        resolution,
    } = sheet;
    let mut columns = resolution.columns;

    let table = page
        .prepare(table, &mut columns)
        .with_context(|| format!("preparing {}", kind.slug()))?;
    let set = page.filters(&columns);
    let year = today.year();
    let mut widgets = filter::widgets(&table, &set, year);
    for widget in &mut widgets {
        if let Widget::MultiSelect { key, options, .. } = widget {
            if key.as_str() == Role::AgeBand.key() {
                options.sort_by_key(|o| band_rank(o));
            }
        }
    }
    let view = filter::apply(&table, &set, request, year)?;

    let mut report = PageReport {
        page: kind.slug(),
        title: kind.title(),
        source_url: url,
        resolved: columns.clone(),
        collisions: resolution.collisions,
        widgets,
        filters: request.clone(),
        total_rows: table.num_rows(),
        filtered_rows: view.num_rows(),
        outcome: PageOutcome::empty(),
    };

    if view.is_empty() {
        info!(total = report.total_rows, "no rows match the selected filters");
        return Ok(PageRun {
            report,
            export_tables: Vec::new(),
        });
    }

    let mut rendered = page
        .render(&view, &columns)
        .with_context(|| format!("rendering {}", kind.slug()))?;
    let mut tables = vec![rendered.data.clone()];
    tables.extend(rendered.tables.iter().cloned());
    rendered.exports = page
        .export_formats()
        .iter()
        .map(|f| try_export(&tables, *f, bom).1)
        .collect();
    debug!(
        metrics = rendered.metrics.len(),
        charts = rendered.charts.len(),
        "page rendered"
    );

    report.outcome = PageOutcome::Rendered(rendered);
    Ok(PageRun {
        report,
        export_tables: tables,
    })
}

// Chart helpers shared by the pages. Each returns None when the column did not
// resolve or nothing was counted, so the chart is skipped.

pub(crate) fn push(charts: &mut Vec<Chart>, chart: Option<Chart>) {
    if let Some(c) = chart.filter(|c| !c.data.is_empty()) {
        charts.push(c);
    }
}

pub(crate) fn counts_chart(
    view: &SheetTable,
    column: Option<&str>,
    id: &'static str,
    title: &str,
    kind: ChartKind,
) -> Option<Chart> {
    let col = column?;
    Some(Chart::new(id, title, kind, ChartData::Counts(count_by(view, col))))
}

pub(crate) fn ranked_chart(
    view: &SheetTable,
    column: Option<&str>,
    limit: Option<usize>,
    id: &'static str,
    title: &str,
    kind: ChartKind,
) -> Option<Chart> {
    let col = column?;
    let data = match limit {
        Some(n) => top_n(view, col, n),
        None => value_counts(view, col),
    };
    Some(Chart::new(id, title, kind, ChartData::Counts(data)))
}

pub(crate) fn pair_chart(
    view: &SheetTable,
    column: Option<&str>,
    group: Option<&str>,
    id: &'static str,
    title: &str,
) -> Option<Chart> {
    let (col, grp) = (column?, group?);
    Some(Chart::new(
        id,
        title,
        ChartKind::GroupedBar,
        ChartData::Pairs(count_by_pair(view, col, grp)),
    ))
}

/// Position of an age band in display order; anything unknown sorts last.
pub(crate) fn band_rank(band: &str) -> usize {
    AGE_BANDS
        .iter()
        .position(|b| *b == band)
        .unwrap_or(AGE_BANDS.len())
}

/// Counts of an age-band column in [`AGE_BANDS`] order.
pub(crate) fn band_chart(
    view: &SheetTable,
    column: Option<&str>,
    id: &'static str,
    title: &str,
) -> Option<Chart> {
    let col = column?;
    let mut counts = count_by(view, col);
    counts.sort_by_key(|c| band_rank(&c.key));
    Some(Chart::new(id, title, ChartKind::Bar, ChartData::Counts(counts)))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::LoadError;
    use crate::report::MetricValue;

    const WORKER_CSV: &str = "Data de Notificação,Bairro,Sexo,Evolução do Caso\n\
        03/02/2025,Centro,M,Cura\n\
        10/02/2025,Camela,F,Óbito por acidente de trabalho grave\n\
        11/02/2025,Centro,M,Incapacidade temporária\n";

    #[test]
    fn slugs_round_trip() {
        for kind in PageKind::ALL {
            assert_eq!(PageKind::from_slug(kind.slug()), Some(kind));
            assert_eq!(kind.page().kind(), kind);
        }
        assert_eq!(PageKind::from_slug("nope"), None);
        assert_eq!(catalog().len(), 5);
    }

    #[test]
    fn workbook_download_only_on_visa() {
        for kind in PageKind::ALL {
            assert!(kind.offers(ExportFormat::Csv));
            assert_eq!(kind.offers(ExportFormat::Xlsx), kind == PageKind::Visa);
        }
    }

    #[test]
    fn settings_override_sheet_url() -> Result<()> {
        let s = Settings::from_yaml("sheets:\n  pce: https://docs.google.com/spreadsheets/d/xyz/edit\n")?;
        assert_eq!(
            PageKind::Pce.sheet_url(&s),
            "https://docs.google.com/spreadsheets/d/xyz/edit"
        );
        assert_eq!(PageKind::Visa.sheet_url(&s), PageKind::Visa.default_url());
        Ok(())
    }

    #[tokio::test]
    async fn death_counted_then_excluded_by_locality() {
        let run = run(PageKind::WorkerHealth, WORKER_CSV, &FilterRequest::new()).await;
        assert_eq!(
            run.report.resolved.get(Role::Outcome),
            Some("EVOLUCAO_DO_CASO")
        );
        let rendered = run.report.rendered().unwrap();
        assert_eq!(rendered.metric("deaths"), Some(&MetricValue::Count(1)));

        let req = FilterRequest::new().with_selection(Role::Locality, &["Centro"]);
        let run = super::testing::run(PageKind::WorkerHealth, WORKER_CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 2);
        let rendered = run.report.rendered().unwrap();
        assert_eq!(rendered.metric("deaths"), Some(&MetricValue::Count(0)));
    }

    #[tokio::test]
    async fn sheet_without_dates_still_renders() {
        let csv = "Bairro,Sexo,Evolução\nCentro,M,Cura\nCamela,F,Cura\n";
        let run = run(PageKind::WorkerHealth, csv, &FilterRequest::new()).await;
        assert!(!run.report.is_empty());
        let has_week_widget = run.report.widgets.iter().any(|w| {
            matches!(w, Widget::MultiSelect { key, .. } if key == Role::EpiWeek.key())
        });
        assert!(!has_week_widget);
        assert!(!run.report.widgets.iter().any(|w| matches!(w, Widget::DateRange { .. })));
        assert!(run.report.rendered().unwrap().chart("by_week").is_none());
    }

    #[tokio::test]
    async fn inverted_range_takes_the_empty_path() {
        let req = FilterRequest::new().with_range(
            NaiveDate::from_ymd_opt(2025, 3, 1),
            NaiveDate::from_ymd_opt(2025, 1, 1),
        );
        let run = run(PageKind::WorkerHealth, WORKER_CSV, &req).await;
        assert!(run.report.is_empty());
        assert_eq!(run.report.total_rows, 3);
        assert_eq!(run.report.filtered_rows, 0);
        assert!(run.export_tables.is_empty());
        let (bytes, status) = run.export(ExportFormat::Csv, true);
        assert!(bytes.is_none());
        assert!(matches!(status, ExportStatus::Unavailable { .. }));
    }

    #[tokio::test]
    async fn rendered_pages_report_their_exports() {
        let run = run(PageKind::WorkerHealth, WORKER_CSV, &FilterRequest::new()).await;
        let rendered = run.report.rendered().unwrap();
        assert_eq!(rendered.exports.len(), 1);
        assert!(matches!(
            rendered.exports[0],
            ExportStatus::Available { format: ExportFormat::Csv, .. }
        ));
        assert_eq!(run.file_name(ExportFormat::Csv), "dados_filtrados_saude-trabalhador.csv");
    }

    #[tokio::test]
    async fn load_failure_is_a_page_error() {
        init_tracing();
        let loader = loader_for(PageKind::Dengue, "<!DOCTYPE html><html></html>");
        let err = run_page(
            PageKind::Dengue,
            &loader,
            &Settings::default(),
            &FilterRequest::new(),
            today(),
        )
        .await;
        assert!(matches!(err, Err(PageError::Load(LoadError::NotCsv { .. }))));
    }
}
