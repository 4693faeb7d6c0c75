//! Sanitary inspection (VISA) production and the 30/90-day deadlines.

use anyhow::Result;
use arrow::array::StringArray;

use super::{push, ranked_chart, Page, PageKind};
use crate::aggregate::{compliance, deadline_flags, Compliance, DeadlineFlags};
use crate::export::ExportFormat;
use crate::filter::FilterSet;
use crate::process::{label_title, label_upper, map_column};
use crate::report::{Chart, ChartData, ChartKind, Metric, MetricValue, NamedTable, Rendered};
use crate::schema::{ResolvedColumns, Role, RoleSpec};
use crate::table::SheetTable;

pub const DATA_SHEET: &str = "dados_filtrados";
pub const SUMMARY_SHEET: &str = "tabela";

const SUMMARY_COLUMNS: [&str; 7] = [
    "Ano",
    "Mês",
    "Entradas",
    "Realizou a inspeção em até 30 dias",
    "% Realizou 30 dias",
    "Finalizou o processo em até 90 dias",
    "% Finalizou 90 dias",
];

const SPECS: &[RoleSpec] = &[
    RoleSpec::exact(Role::IntakeDate, &["ENTRADA"]),
    RoleSpec::exact(
        Role::FirstInspection,
        &["1A_INSPECAO", "1_INSPECAO", "PRIMEIRA_INSPECAO"],
    ),
    RoleSpec::exact(Role::ConclusionDate, &["DATA_CONCLUSAO"]),
    RoleSpec::exact(Role::Situation, &["SITUACAO"]),
    RoleSpec::exact(Role::Classification, &["CLASSIFICACAO"]),
    RoleSpec::exact(
        Role::Coordination,
        &["COORDENACAO", "COORDENADORIA", "COORD"],
    ),
    RoleSpec::exact(Role::Territory, &["TERRITORIO", "TERRITORY", "TERR"]),
];

pub struct VisaPage;

impl Page for VisaPage {
    fn kind(&self) -> PageKind {
        PageKind::Visa
    }

    fn specs(&self) -> &'static [RoleSpec] {
        SPECS
    }

    fn prepare(&self, table: SheetTable, columns: &mut ResolvedColumns) -> Result<SheetTable> {
        let mut table = table;
        if let Some(col) = columns.get(Role::Situation) {
            let upper = map_column(&table, Some(col), |v| Some(label_upper(v)));
            table = table.with_column(col, upper)?;
        }
        if let Some(col) = columns.get(Role::Classification) {
            let titled = map_column(&table, Some(col), |v| Some(label_title(v)));
            table = table.with_column(col, titled)?;
        }
        Ok(table)
    }

    fn filters(&self, columns: &ResolvedColumns) -> FilterSet {
        FilterSet::new()
            .categorical_roles(
                columns,
                &[Role::Classification, Role::Coordination, Role::Territory],
            )
            .date(Role::IntakeDate, columns.get(Role::IntakeDate))
            .with_period_toggle()
    }

    fn render(&self, view: &SheetTable, columns: &ResolvedColumns) -> Result<Rendered> {
        let mut metrics = vec![Metric::new(
            "entries",
            "Entradas (período)",
            MetricValue::Count(view.num_rows()),
        )];
        let mut charts = Vec::new();
        let mut tables = Vec::new();
        let mut data = view.clone();

        if let Some(intake) = columns.get(Role::IntakeDate) {
            let flags = deadline_flags(
                view,
                intake,
                columns.get(Role::FirstInspection),
                columns.get(Role::ConclusionDate),
            );
            data = with_deadline_columns(&data, &flags)?;

            let summary = compliance(&flags);
            metrics.extend([
                Metric::new(
                    "pct_30",
                    "% Inspeções ≤30 dias",
                    MetricValue::Percent {
                        percent: summary.kpis.pct_30,
                    },
                ),
                Metric::new(
                    "pct_90",
                    "% Conclusões ≤90 dias",
                    MetricValue::Percent {
                        percent: summary.kpis.pct_90,
                    },
                ),
                Metric::new("met_30", "Inspeções ≤30 dias", MetricValue::Count(summary.kpis.met_30)),
                Metric::new("met_90", "Conclusões ≤90 dias", MetricValue::Count(summary.kpis.met_90)),
            ]);
            push(&mut charts, Some(monthly_chart(&summary)));
            tables.push(summary_table(&summary));
        }

        push(
            &mut charts,
            ranked_chart(view, columns.get(Role::Situation), None, "by_situation", "Processos por Situação", ChartKind::Bar),
        );
        push(
            &mut charts,
            ranked_chart(view, columns.get(Role::Territory), None, "by_territory", "Entradas por Território", ChartKind::Bar),
        );

        Ok(Rendered {
            metrics,
            charts,
            tables,
            data: NamedTable::from_sheet(DATA_SHEET, &data),
            ..Default::default()
        })
    }

    fn export_formats(&self) -> &'static [ExportFormat] {
        &[ExportFormat::Csv, ExportFormat::Xlsx]
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "SIM"
    } else {
        "NAO"
    }
}

/// Deadline dates and met flags appended to the data sheet.
fn with_deadline_columns(table: &SheetTable, flags: &[DeadlineFlags]) -> Result<SheetTable> {
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
    let deadline_30: StringArray = flags.iter().map(|f| date(f.deadline_30)).collect();
    let deadline_90: StringArray = flags.iter().map(|f| date(f.deadline_90)).collect();
    let met_30: StringArray = flags.iter().map(|f| Some(yes_no(f.met_30))).collect();
    let met_90: StringArray = flags.iter().map(|f| Some(yes_no(f.met_90))).collect();

    table
        .with_column("PRAZO_30", deadline_30)?
        .with_column("PRAZO_90", deadline_90)?
        .with_column("REALIZOU_30", met_30)?
        .with_column("FINALIZOU_90", met_90)
}

fn summary_table(summary: &Compliance) -> NamedTable {
    NamedTable {
        name: SUMMARY_SHEET.to_string(),
        columns: SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: summary
            .monthly
            .iter()
            .map(|m| {
                vec![
                    Some(m.year.to_string()),
                    Some(m.month_name.to_string()),
                    Some(m.entries.to_string()),
                    Some(m.met_30.to_string()),
                    Some(m.pct_30.to_string()),
                    Some(m.met_90.to_string()),
                    Some(m.pct_90.to_string()),
                ]
            })
            .collect(),
    }
}

/// Entries per `YYYY-MM`, oldest first.
fn monthly_chart(summary: &Compliance) -> Chart {
    let mut points: Vec<(String, f64)> = summary
        .monthly
        .iter()
        .map(|m| (format!("{}-{:02}", m.year, m.month), m.entries as f64))
        .collect();
    points.sort_by(|a, b| a.0.cmp(&b.0));
    Chart::new(
        "monthly_entries",
        "Entradas por Mês",
        ChartKind::Bar,
        ChartData::Values(points),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportStatus;
    use crate::filter::{FilterRequest, Widget};
    use crate::pages::testing::run;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    const CSV: &str = "ENTRADA,1ª INSPEÇÃO,DATA CONCLUSÃO,SITUAÇÃO,CLASSIFICAÇÃO,COORDENAÇÃO,TERRITÓRIO\n\
        05/01/2025,20/01/2025,10/03/2025,concluído,ALTO RISCO,Norte,T1\n\
        15/01/2025,20/02/2025,,em andamento,baixo risco,Sul,T2\n\
        03/02/2025,,,,alto risco,Norte,T1\n\
        10/06/2024,01/07/2024,01/08/2024,concluído,Baixo Risco,Sul,T2\n";

    #[tokio::test]
    async fn defaults_to_the_current_year() {
        let run = run(PageKind::Visa, CSV, &FilterRequest::new()).await;
        assert_eq!(run.report.resolved.get(Role::FirstInspection), Some("1A_INSPECAO"));
        assert_eq!(run.report.filtered_rows, 3);

        let period = run.report.widgets.iter().find_map(|w| match w {
            Widget::PeriodMode {
                years,
                default_year,
                ..
            } => Some((years.clone(), *default_year)),
            _ => None,
        });
        assert_eq!(period, Some((vec![2025, 2024], Some(2025))));

        let rendered = run.report.rendered().unwrap();
        assert_eq!(rendered.metric("entries"), Some(&MetricValue::Count(3)));
        assert_eq!(
            rendered.metric("pct_30"),
            Some(&MetricValue::Percent { percent: 33.33 })
        );
        assert_eq!(rendered.metric("met_90"), Some(&MetricValue::Count(1)));
    }

    #[tokio::test]
    async fn monthly_table_matches_the_sheet_layout() {
        let req = FilterRequest::from_query_pairs([("mode", "range")]);
        let run = run(PageKind::Visa, CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 4);

        let rendered = run.report.rendered().unwrap();
        let table = &rendered.tables[0];
        assert_eq!(table.name, SUMMARY_SHEET);
        assert_eq!(table.columns.len(), SUMMARY_COLUMNS.len());
        let first: Vec<&str> = table.rows[0].iter().flatten().map(String::as_str).collect();
        assert_eq!(first, vec!["2025", "Janeiro", "2", "1", "50", "1", "50"]);
        let months: Vec<&str> = table
            .rows
            .iter()
            .filter_map(|r| r[1].as_deref())
            .collect();
        assert_eq!(months, vec!["Janeiro", "Fevereiro", "Junho"]);
    }

    #[tokio::test]
    async fn data_sheet_carries_deadline_flags() {
        let run = run(PageKind::Visa, CSV, &FilterRequest::new()).await;
        let data = &run.report.rendered().unwrap().data;
        assert_eq!(data.name, DATA_SHEET);
        let at = data.columns.iter().position(|c| c == "REALIZOU_30").unwrap();
        let flags: Vec<&str> = data.rows.iter().filter_map(|r| r[at].as_deref()).collect();
        assert_eq!(flags, vec!["SIM", "NAO", "NAO"]);
        let situation = data.columns.iter().position(|c| c == "SITUACAO").unwrap();
        assert_eq!(data.rows[0][situation].as_deref(), Some("CONCLUÍDO"));
    }

    #[tokio::test]
    async fn classification_is_title_cased_before_filtering() {
        let req = FilterRequest::from_query_pairs([("mode", "range"), ("classification", "Alto Risco")]);
        let run = run(PageKind::Visa, CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 2);

        let req = FilterRequest::from_query_pairs([("year", "2024")]);
        let run = crate::pages::testing::run(PageKind::Visa, CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 1);
    }

    #[tokio::test]
    async fn workbook_has_both_sheets() -> anyhow::Result<()> {
        let run = run(PageKind::Visa, CSV, &FilterRequest::new()).await;
        let rendered = run.report.rendered().unwrap();
        assert!(rendered
            .exports
            .iter()
            .any(|e| matches!(e, ExportStatus::Available { format: ExportFormat::Xlsx, .. })));

        let (bytes, _) = run.export(ExportFormat::Xlsx, false);
        let mut archive = ZipArchive::new(Cursor::new(bytes.unwrap()))?;
        let mut workbook = String::new();
        archive.by_name("xl/workbook.xml")?.read_to_string(&mut workbook)?;
        assert!(workbook.contains(r#"name="dados_filtrados""#));
        assert!(workbook.contains(r#"name="tabela""#));
        Ok(())
    }
}
