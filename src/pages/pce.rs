//! Schistosomiasis control programme (PCE): exams and treatment per locality.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::{push, ranked_chart, Page, PageKind};
use crate::aggregate::{most_frequent, sum_by, sum_numeric, Count};
use crate::filter::{self, FilterSet};
use crate::process::drop_summary_rows;
use crate::report::{Chart, ChartData, ChartKind, Metric, MetricValue, NamedTable, Rendered};
use crate::schema::{ResolvedColumns, Role, RoleSpec};
use crate::table::SheetTable;

const SPECS: &[RoleSpec] = &[
    RoleSpec::exact(Role::Locality, &["LOCALIDADE", "BAIRRO", "AREA", "TERRITORIO"]),
    RoleSpec::exact(Role::Date, &["DATA", "DATA_REGISTRO", "DT", "DATA_OCORRENCIA"]),
    RoleSpec::exact(Role::WorkedPopulation, &["POP_TRAB", "POP_TRABALHADORES"]),
    RoleSpec::exact(Role::Exams, &["EXAMES", "TOTAL_EXAMES", "N_EXAMES"]),
    RoleSpec::exact(
        Role::Positives,
        &["POSITIVOS", "CASOS_POSITIVOS", "TESTES_POSITIVOS"],
    ),
    RoleSpec::exact(Role::Treated, &["TRATADOS", "N_TRATADOS"]),
    RoleSpec::exact(Role::ToTreat, &["A_TRATAR", "N_A_TRATAR"]),
];

/// Columns of the displayed table, in display order.
const DISPLAY_ROLES: [Role; 6] = [
    Role::Locality,
    Role::Exams,
    Role::ToTreat,
    Role::Treated,
    Role::Positives,
    Role::WorkedPopulation,
];

const SUMS: [(Role, &str, &str); 5] = [
    (Role::WorkedPopulation, "worked_population", "População trabalhada"),
    (Role::Exams, "exams", "Exames"),
    (Role::Positives, "positives", "Positivos"),
    (Role::Treated, "treated", "Tratados"),
    (Role::ToTreat, "to_treat", "A tratar"),
];

pub struct PcePage;

impl Page for PcePage {
    fn kind(&self) -> PageKind {
        PageKind::Pce
    }

    fn specs(&self) -> &'static [RoleSpec] {
        SPECS
    }

    /// Hand-written TOTAL lines would double every sum.
    fn prepare(&self, table: SheetTable, columns: &mut ResolvedColumns) -> Result<SheetTable> {
        drop_summary_rows(&table, columns.get(Role::Locality))
    }

    fn filters(&self, columns: &ResolvedColumns) -> FilterSet {
        FilterSet::new()
            .categorical_roles(columns, &[Role::Locality])
            .date(Role::Date, columns.get(Role::Date))
    }

    fn render(&self, view: &SheetTable, columns: &ResolvedColumns) -> Result<Rendered> {
        let locality = columns.get(Role::Locality);
        let mut metrics = vec![Metric::new(
            "records",
            "Registros filtrados",
            MetricValue::Count(view.num_rows()),
        )];
        if let Some(top) = locality.and_then(|c| most_frequent(view, c)) {
            metrics.push(Metric::new(
                "top_locality",
                "Localidade mais frequente",
                MetricValue::Text(top.key),
            ));
        }
        for (role, id, name) in SUMS {
            if let Some(col) = columns.get(role) {
                metrics.push(Metric::new(id, name, MetricValue::Number(sum_numeric(view, col))));
            }
        }

        let mut charts = Vec::new();
        let by_locality = ranked_chart(
            view,
            locality,
            None,
            "by_locality",
            "Distribuição de Registros por Localidade",
            ChartKind::Bar,
        );
        let share = by_locality.clone().map(|c| Chart {
            id: "locality_share",
            title: "Proporção por Localidade".to_string(),
            kind: ChartKind::Pie,
            ..c
        });
        push(&mut charts, by_locality);
        push(&mut charts, share);
        if let (Some(loc), Some(exams)) = (locality, columns.get(Role::Exams)) {
            push(
                &mut charts,
                Some(Chart::new(
                    "exams_by_locality",
                    "Exames por Localidade",
                    ChartKind::Bar,
                    ChartData::Values(sum_by(view, loc, exams)),
                )),
            );
        }
        push(&mut charts, columns.get(Role::Date).map(|c| timeline(view, c)));

        let shown: Vec<&str> = DISPLAY_ROLES
            .iter()
            .filter_map(|r| columns.get(*r))
            .collect();
        let display = view.select(&shown)?;

        Ok(Rendered {
            metrics,
            charts,
            data: NamedTable::from_sheet("dados_filtrados", &display),
            ..Default::default()
        })
    }
}

/// Records per parsed date, oldest first; undated rows are left out.
fn timeline(view: &SheetTable, column: &str) -> Chart {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for d in filter::dates(view, column).into_iter().flatten() {
        *per_day.entry(d).or_default() += 1;
    }
    let counts = per_day
        .into_iter()
        .map(|(d, count)| Count {
            key: d.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect();
    Chart::new(
        "timeline",
        "Evolução temporal dos registros",
        ChartKind::Line,
        ChartData::Counts(counts),
    )
}
