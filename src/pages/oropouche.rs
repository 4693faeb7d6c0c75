//! Oropouche fever notifications. Personal-data columns never leave `prepare`.

use anyhow::Result;

use super::{pair_chart, push, ranked_chart, Page, PageKind};
use crate::aggregate::{count_by, count_matching};
use crate::filter::FilterSet;
use crate::process::{derive_column, iso_week, parse_date, scrub_sensitive, year_month};
use crate::report::{Chart, ChartData, ChartKind, Metric, MetricValue, NamedTable, Rendered};
use crate::schema::normalize::normalize_text;
use crate::schema::{ResolvedColumns, Role, RoleSpec};
use crate::table::SheetTable;

/// Derived `YYYY-MM` of the notification date.
pub const MONTH_COLUMN: &str = "MES_NOTIF";
/// Derived ISO week of the notification date.
pub const WEEK_COLUMN: &str = "SE_SEMANA";

const SPECS: &[RoleSpec] = &[
    RoleSpec::exact(Role::Locality, &["LOCALIDADE", "BAIRRO", "AREA", "TERRITORIO"]),
    RoleSpec::exact(
        Role::Classification,
        &["CLASSIFICACAO", "STATUS", "TIPO", "CLASS"],
    ),
    RoleSpec::exact(Role::Sex, &["SEXO", "GENERO"]),
    RoleSpec::exact(Role::Race, &["RACA_COR", "RACA", "COR"]),
    RoleSpec::exact(Role::Pregnant, &["GESTANTE", "GRAVIDEZ", "GESTACAO"]),
    RoleSpec::exact(
        Role::Date,
        &[
            "DATA_NOTIFICACAO",
            "DATA_DE_NOTIFICACAO",
            "NOTIFICACAO",
            "DATA",
            "DATA_DO_CASO",
            "DATA_ENTRADA",
            "DATA_NOTIF",
            "DATE",
        ],
    ),
];

const FILTER_ROLES: &[Role] = &[
    Role::Locality,
    Role::Classification,
    Role::Sex,
    Role::Race,
    Role::EpiWeek,
];

pub struct OropouchePage;

impl Page for OropouchePage {
    fn kind(&self) -> PageKind {
        PageKind::Oropouche
    }

    fn specs(&self) -> &'static [RoleSpec] {
        SPECS
    }

    fn prepare(&self, table: SheetTable, columns: &mut ResolvedColumns) -> Result<SheetTable> {
        let keep: Vec<&str> = [Role::Locality, Role::Date]
            .iter()
            .filter_map(|r| columns.get(*r))
            .collect();
        let mut table = scrub_sensitive(&table, &keep)?;

        if let Some(date) = columns.get(Role::Date).map(str::to_string) {
            table = derive_column(&table, MONTH_COLUMN, Some(&date), |v| {
                v.and_then(parse_date).map(year_month)
            })?;
            table = derive_column(&table, WEEK_COLUMN, Some(&date), |v| {
                v.and_then(parse_date).map(|d| iso_week(d).to_string())
            })?;
            columns.set(Role::EpiWeek, WEEK_COLUMN);
        }
        Ok(table)
    }

    fn filters(&self, columns: &ResolvedColumns) -> FilterSet {
        FilterSet::new()
            .categorical_roles(columns, FILTER_ROLES)
            .date(Role::Date, columns.get(Role::Date))
    }

    fn render(&self, view: &SheetTable, columns: &ResolvedColumns) -> Result<Rendered> {
        let col = move |role: Role| columns.get(role);
        let pregnant = match col(Role::Pregnant) {
            Some(c) => MetricValue::Count(count_matching(view, c, |v| {
                v.is_some_and(|v| normalize_text(v).contains("SIM"))
            })),
            None => MetricValue::Text("—".to_string()),
        };
        let metrics = vec![
            Metric::new("records", "Registros (filtrados)", MetricValue::Count(view.num_rows())),
            Metric::new("pregnant", "Gestantes identificadas", pregnant),
        ];

        let month = view.has_column(MONTH_COLUMN).then_some(MONTH_COLUMN);
        let mut charts = Vec::new();
        if let Some(m) = month {
            push(
                &mut charts,
                Some(Chart::new(
                    "cases_per_month",
                    "Evolução mensal dos casos",
                    ChartKind::Line,
                    ChartData::Counts(count_by(view, m)),
                )),
            );
        }
        push(
            &mut charts,
            pair_chart(view, month, col(Role::Classification), "classification_per_month", "Classificação por Mês")
                .map(|c| Chart {
                    kind: ChartKind::Line,
                    ..c
                }),
        );
        push(
            &mut charts,
            pair_chart(view, col(Role::Locality), col(Role::Classification), "locality_classification", "Localidade x Classificação")
                .map(by_count_desc),
        );
        push(&mut charts, ranked_chart(view, col(Role::Sex), None, "by_sex", "Sexo", ChartKind::Pie));
        push(
            &mut charts,
            pair_chart(view, col(Role::Race), col(Role::Sex), "race_sex", "Raça/Cor por Sexo"),
        );

        let display = view.drop_columns(|name| {
            name == MONTH_COLUMN || name == WEEK_COLUMN || name.contains("NASC")
        })?;

        Ok(Rendered {
            metrics,
            charts,
            data: NamedTable::from_sheet("dados_filtrados", &display),
            ..Default::default()
        })
    }
}

fn by_count_desc(mut chart: Chart) -> Chart {
    if let ChartData::Pairs(pairs) = &mut chart.data {
        pairs.sort_by(|a, b| b.count.cmp(&a.count));
    }
    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportFormat;
    use crate::filter::{FilterRequest, Widget};
    use crate::pages::testing::run;

    const CSV: &str = "Nome do Paciente,Nome da Mãe,DN,Data de Notificação,Localidade,Classificação,Sexo,Raça/Cor,Gestante,Telefone\n\
        Ana,Maria,01/01/1990,03/03/2025,Camela,Confirmado,F,Parda,Sim,999\n\
        Bia,Rita,02/02/1985,20/03/2025,Centro,Descartado,F,Branca,NÃO,888\n\
        Caio,Lia,03/03/2000,02/04/2025,Camela,Confirmado,M,Parda,,777\n";

    #[tokio::test]
    async fn personal_data_is_scrubbed() {
        let run = run(PageKind::Oropouche, CSV, &FilterRequest::new()).await;
        let data = &run.report.rendered().unwrap().data;
        assert_eq!(
            data.columns,
            vec![
                "DATA_DE_NOTIFICACAO",
                "LOCALIDADE",
                "CLASSIFICACAO",
                "SEXO",
                "RACA_COR",
                "GESTANTE"
            ]
        );

        let (bytes, _) = run.export(ExportFormat::Csv, false);
        let csv = String::from_utf8(bytes.unwrap()).unwrap();
        assert!(!csv.contains("Ana"));
        assert!(!csv.contains("999"));
        assert!(!csv.contains(MONTH_COLUMN));
    }

    #[tokio::test]
    async fn months_and_weeks_come_from_the_notification_date() {
        let run = run(PageKind::Oropouche, CSV, &FilterRequest::new()).await;
        let weeks = run.report.widgets.iter().find_map(|w| match w {
            Widget::MultiSelect { key, options, .. } if key == "epi_week" => Some(options.clone()),
            _ => None,
        });
        assert_eq!(weeks, Some(vec!["10".to_string(), "12".into(), "14".into()]));

        let rendered = run.report.rendered().unwrap();
        let months: Vec<(&str, usize)> = rendered
            .chart("cases_per_month")
            .unwrap()
            .counts()
            .iter()
            .map(|c| (c.key.as_str(), c.count))
            .collect();
        assert_eq!(months, vec![("2025-03", 2), ("2025-04", 1)]);
        assert_eq!(
            rendered.chart("classification_per_month").unwrap().kind,
            ChartKind::Line
        );
    }

    #[tokio::test]
    async fn pregnant_count_and_week_filter() {
        let run = run(PageKind::Oropouche, CSV, &FilterRequest::new()).await;
        let rendered = run.report.rendered().unwrap();
        assert_eq!(rendered.metric("pregnant"), Some(&MetricValue::Count(1)));

        let req = FilterRequest::from_query_pairs([("epi_week", "10")]);
        let run = crate::pages::testing::run(PageKind::Oropouche, CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 1);
    }

    #[tokio::test]
    async fn no_date_column_means_no_week_filter() {
        let csv = "Localidade,Sexo\nCamela,F\nCentro,M\n";
        let run = run(PageKind::Oropouche, csv, &FilterRequest::new()).await;
        assert!(!run
            .report
            .widgets
            .iter()
            .any(|w| matches!(w, Widget::MultiSelect { key, .. } if key == "epi_week")));
        let rendered = run.report.rendered().unwrap();
        assert!(rendered.chart("cases_per_month").is_none());
        assert_eq!(
            rendered.metric("pregnant"),
            Some(&MetricValue::Text("—".into()))
        );
    }
}
