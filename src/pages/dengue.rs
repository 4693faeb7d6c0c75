//! Arbovirus (dengue) notifications.
//!
//! The week column is re-derived on every load: an explicit week cell wins
//! (`"SE 23"` → `23`), otherwise the ISO week of the notification date.

use anyhow::Result;
use arrow::array::StringArray;

use super::{band_rank, counts_chart, pair_chart, push, ranked_chart, Page, PageKind};
use crate::aggregate::{count_by_pair, count_matching, rate, round2, Count};
use crate::filter::{self, FilterSet};
use crate::process::{age_band, epi_week, is_fatality, is_yes, label_upper, map_column};
use crate::report::{Chart, ChartData, ChartKind, Metric, MetricValue, NamedTable, Rendered};
use crate::schema::{normalize_header, ResolvedColumns, Role, RoleSpec};
use crate::table::SheetTable;

pub const EPI_WEEK_COLUMN: &str = "SEMANA_EPI";

const CONFIRMED: &[&str] = &["DENGUE", "DENGUE COM SINAIS DE ALARME"];
const DISCARDED: &str = "DESCARTADO";

/// Yes/no symptom and comorbidity columns, in chart order.
const SYMPTOMS: &[&str] = &[
    "FEBRE",
    "MIALGIA",
    "CEFALEIA",
    "EXANTEMA",
    "VOMITO",
    "NAUSEA",
    "DOR_COSTAS",
    "CONJUNTVITE",
    "ARTRITE",
    "ARTRALGIA",
    "PETEQUIAS",
    "LEUCOPENIA",
    "LACO",
    "DOR_RETRO",
    "DIABETES",
    "HEMATOLOGICAS",
    "HEPATOPATIAS",
    "RENAL",
    "HIPERTENSAO",
    "ACIDO_PEPT",
    "AUTO_IMUNE",
];

const SPECS: &[RoleSpec] = &[
    RoleSpec::exact(
        Role::EpiWeek,
        &["SEMANA_EPIDEMIOLOGICA", "SEMANA_EPIDEMIOLOGICA_2", "SEMANA_EPI"],
    ),
    RoleSpec::exact(Role::Date, &["DATA_NOTIFICACAO", "DATA_DE_NOTIFICACAO"]),
    RoleSpec::exact(
        Role::SymptomDate,
        &["DATA_PRIMEIROS_SINTOMAS", "DATA_PRIMEIRO_SINTOMAS", "DATA_SINTOMAS"],
    ),
    RoleSpec::exact(Role::AgeBand, &["FAIXA_ETARIA", "FA"]),
    RoleSpec::exact(Role::Locality, &["BAIRRO", "BAIRRO_RESIDENCIA"]),
    RoleSpec::contains(Role::Outcome, &["EVOLUCAO"]),
    RoleSpec::exact(Role::Classification, &["CLASSIFICACAO_FINAL", "CLASSIFICACAO"]),
    RoleSpec::exact(Role::Race, &["RACA_COR", "RACA"]),
    RoleSpec::exact(Role::Education, &["ESCOLARIDADE"]),
    RoleSpec::exact(Role::District, &["DISTRITO"]),
    RoleSpec::exact(Role::Sex, &["SEXO"]),
];

const FILTER_ROLES: &[Role] = &[
    Role::Classification,
    Role::EpiWeek,
    Role::Sex,
    Role::AgeBand,
    Role::Outcome,
    Role::Education,
    Role::Locality,
];

pub struct DenguePage;

impl Page for DenguePage {
    fn kind(&self) -> PageKind {
        PageKind::Dengue
    }

    fn specs(&self) -> &'static [RoleSpec] {
        SPECS
    }

    fn prepare(&self, table: SheetTable, columns: &mut ResolvedColumns) -> Result<SheetTable> {
        let mut table = table;
        if let Some(col) = columns.get(Role::AgeBand).map(str::to_string) {
            let banded = map_column(&table, Some(&col), |v| Some(age_band(v).to_string()));
            table = table.with_column(&col, banded)?;
        }

        let week = columns.get(Role::EpiWeek).map(str::to_string);
        let date = columns.get(Role::Date).map(str::to_string);
        if week.is_some() || date.is_some() {
            let n = table.num_rows();
            let cells = week
                .as_deref()
                .map_or_else(|| vec![None; n], |c| table.values(c));
            let dates = date
                .as_deref()
                .map_or_else(|| vec![None; n], |c| filter::dates(&table, c));
            let weeks: StringArray = cells
                .into_iter()
                .zip(dates)
                .map(|(w, d)| epi_week(w, d).map(|n| n.to_string()))
                .collect();
            table = table.with_column(EPI_WEEK_COLUMN, weeks)?;
            columns.set(Role::EpiWeek, EPI_WEEK_COLUMN);
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
        let mut metrics = vec![Metric::new(
            "notifications",
            "Notificações no período",
            MetricValue::Count(view.num_rows()),
        )];

        let mut confirmed = 0;
        if let Some(c) = col(Role::Classification) {
            confirmed = count_matching(view, c, |v| CONFIRMED.contains(&label_upper(v).as_str()));
            let discarded = count_matching(view, c, |v| label_upper(v) == DISCARDED);
            metrics.push(Metric::new("confirmed", "Confirmados", MetricValue::Count(confirmed)));
            metrics.push(Metric::new("discarded", "Descartados", MetricValue::Count(discarded)));
        }
        if let Some(c) = col(Role::Outcome) {
            let deaths = count_matching(view, c, is_fatality);
            metrics.push(Metric::new("deaths", "Óbitos", MetricValue::Count(deaths)));
            metrics.push(Metric::new(
                "lethality",
                "Letalidade (%)",
                MetricValue::Percent {
                    percent: round2(rate(deaths, confirmed)),
                },
            ));
        }

        let mut charts = Vec::new();
        push(
            &mut charts,
            counts_chart(view, col(Role::EpiWeek), "by_week", "Casos por Semana Epidemiológica", ChartKind::Line),
        );
        push(
            &mut charts,
            ranked_chart(view, col(Role::District), None, "by_district", "Distribuição de Casos por Distrito", ChartKind::Bar),
        );
        push(
            &mut charts,
            ranked_chart(view, col(Role::Locality), Some(15), "top_localities", "Top 15 Bairros", ChartKind::Bar),
        );
        push(
            &mut charts,
            pair_chart(view, col(Role::Race), col(Role::Education), "race_education", "Casos por Raça/Cor e Escolaridade"),
        );
        push(&mut charts, Some(symptom_chart(view)));
        push(&mut charts, age_sex_chart(view, col(Role::AgeBand), col(Role::Sex)));

        Ok(Rendered {
            metrics,
            charts,
            data: NamedTable::from_sheet("dados_filtrados", view),
            ..Default::default()
        })
    }
}

/// `"DOR_COSTAS"` → `"Dor costas"`.
fn symptom_label(name: &str) -> String {
    let spaced = name.replace('_', " ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `SIM` answers per symptom column present in the view; zero counts are left out.
fn symptom_chart(view: &SheetTable) -> Chart {
    let mut counts: Vec<Count> = SYMPTOMS
        .iter()
        .filter_map(|s| {
            let column = normalize_header(s);
            if !view.has_column(&column) {
                return None;
            }
            let count = count_matching(view, &column, is_yes);
            (count > 0).then(|| Count {
                key: symptom_label(s),
                count,
            })
        })
        .collect();
    counts.sort_by_key(|c| c.count);
    Chart::new(
        "symptoms",
        "Frequência de Sintomas e Comorbidades",
        ChartKind::HorizontalBar,
        ChartData::Counts(counts),
    )
}

fn age_sex_chart(view: &SheetTable, age: Option<&str>, sex: Option<&str>) -> Option<Chart> {
    let (age, sex) = (age?, sex?);
    let mut pairs = count_by_pair(view, age, sex);
    pairs.sort_by(|a, b| {
        band_rank(&a.key)
            .cmp(&band_rank(&b.key))
            .then_with(|| a.group.cmp(&b.group))
    });
    Some(Chart::new(
        "age_sex",
        "Casos por Faixa Etária e Sexo",
        ChartKind::GroupedBar,
        ChartData::Pairs(pairs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterRequest, Widget};
    use crate::pages::testing::run;
    use chrono::NaiveDate;

    const CSV: &str = "Semana Epidemiológica,Data de Notificação,FA,Bairro,Distrito,Sexo,Raça/Cor,Escolaridade,Classificação,Evolução,Febre,Mialgia,Diabetes\n\
        5,03/02/2025,20 a 29,Centro,Norte,F,Parda,Médio,Dengue,Cura,SIM,SIM,NAO\n\
        SE 6,10/02/2025,1 a 4,Camela,Sul,M,Branca,Fundamental,DENGUE COM SINAIS DE ALARME,Óbito pelo agravo,SIM,NAO,SIM\n\
        ,11/02/2025,80 ou mais,Centro,Norte,F,Parda,Médio,Descartado,Cura,NAO,NAO,NAO\n\
        ,,xyz,Centro,,M,,,Inconclusivo,,,,\n";

    fn keys(chart: &Chart) -> Vec<(&str, usize)> {
        chart.counts().iter().map(|c| (c.key.as_str(), c.count)).collect()
    }

    #[tokio::test]
    async fn weeks_prefer_the_explicit_cell() {
        let run = run(PageKind::Dengue, CSV, &FilterRequest::new()).await;
        let rendered = run.report.rendered().unwrap();
        assert_eq!(
            keys(rendered.chart("by_week").unwrap()),
            vec![("5", 1), ("6", 1), ("7", 1), ("IGNORADO", 1)]
        );
        assert_eq!(run.report.resolved.get(Role::EpiWeek), Some(EPI_WEEK_COLUMN));
        assert_eq!(run.report.resolved.get(Role::AgeBand), Some("FA"));
    }

    #[tokio::test]
    async fn classification_metrics_and_lethality() {
        let run = run(PageKind::Dengue, CSV, &FilterRequest::new()).await;
        let rendered = run.report.rendered().unwrap();
        assert_eq!(rendered.metric("notifications"), Some(&MetricValue::Count(4)));
        assert_eq!(rendered.metric("confirmed"), Some(&MetricValue::Count(2)));
        assert_eq!(rendered.metric("discarded"), Some(&MetricValue::Count(1)));
        assert_eq!(rendered.metric("deaths"), Some(&MetricValue::Count(1)));
        assert_eq!(
            rendered.metric("lethality"),
            Some(&MetricValue::Percent { percent: 50.0 })
        );
    }

    #[tokio::test]
    async fn no_confirmed_cases_means_zero_lethality() {
        let req = FilterRequest::new().with_selection(Role::Classification, &["descartado"]);
        let run = run(PageKind::Dengue, CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 1);
        let rendered = run.report.rendered().unwrap();
        assert_eq!(
            rendered.metric("lethality"),
            Some(&MetricValue::Percent { percent: 0.0 })
        );
    }

    #[tokio::test]
    async fn age_bands_keep_display_order() {
        let run = run(PageKind::Dengue, CSV, &FilterRequest::new()).await;
        let options = run.report.widgets.iter().find_map(|w| match w {
            Widget::MultiSelect { key, options, .. } if key == "age_band" => Some(options.clone()),
            _ => None,
        });
        assert_eq!(
            options,
            Some(vec![
                "1 a 4 anos".to_string(),
                "20 a 39 anos".into(),
                "60 anos ou mais".into(),
                "IGNORADO".into(),
            ])
        );

        let rendered = run.report.rendered().unwrap();
        let pairs: Vec<(String, String)> = match &rendered.chart("age_sex").unwrap().data {
            ChartData::Pairs(p) => p.iter().map(|p| (p.key.clone(), p.group.clone())).collect(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(pairs[0], ("1 a 4 anos".to_string(), "M".to_string()));
        assert_eq!(pairs[3], ("IGNORADO".to_string(), "M".to_string()));
    }

    #[tokio::test]
    async fn symptoms_skip_zero_counts() {
        let run = run(PageKind::Dengue, CSV, &FilterRequest::new()).await;
        let rendered = run.report.rendered().unwrap();
        assert_eq!(
            keys(rendered.chart("symptoms").unwrap()),
            vec![("Mialgia", 1), ("Diabetes", 1), ("Febre", 2)]
        );
        assert_eq!(symptom_label("DOR_COSTAS"), "Dor costas");
    }

    #[tokio::test]
    async fn date_range_uses_notification_date() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 2, day);
        let req = FilterRequest::new().with_range(d(4), d(11));
        let run = run(PageKind::Dengue, CSV, &req).await;
        assert_eq!(run.report.filtered_rows, 2);
        assert!(run
            .report
            .widgets
            .iter()
            .any(|w| matches!(w, Widget::DateRange { key, .. } if key == "date")));
    }
}
