//! Work-related accidents.

use anyhow::Result;

use super::{band_chart, counts_chart, push, ranked_chart, Page, PageKind};
use crate::aggregate::{count_matching, most_frequent};
use crate::filter::FilterSet;
use crate::process::{age_band_from_years, derive_column, is_fatality, iso_week, parse_date};
use crate::report::{ChartKind, Metric, MetricValue, NamedTable, Rendered};
use crate::schema::{ResolvedColumns, Role, RoleSpec};
use crate::table::SheetTable;

/// Derived ISO week of the occurrence date.
pub const EPI_WEEK_COLUMN: &str = "SEMANA_EPI";
/// Derived coarse band of the age column.
pub const AGE_BAND_COLUMN: &str = "FAIXA_ETARIA_GRUPO";
const UNDEFINED: &str = "Indefinido";

const SPECS: &[RoleSpec] = &[
    RoleSpec::exact(
        Role::Date,
        &[
            "DATA_DA_OCORRENCIA",
            "DATA_OCORRENCIA",
            "DT_OCORRENCIA",
            "DATA_ACIDENTE",
            "DATA_NOTIFICACAO",
            "DATA_DE_NOTIFICACAO",
            "DATA",
        ],
    ),
    RoleSpec::exact(Role::Sex, &["SEXO"]),
    RoleSpec::exact(Role::AgeBand, &["IDADE", "FAIXA_ETARIA"]),
    RoleSpec::exact(Role::Race, &["RACA_COR", "RACA", "COR"]),
    RoleSpec::exact(Role::Education, &["ESCOLARIDADE"]),
    RoleSpec::exact(
        Role::Locality,
        &["BAIRRO_OCORRENCIA", "BAIRRO_DE_OCORRENCIA", "BAIRRO"],
    ),
    RoleSpec::contains(Role::Outcome, &["EVOLUCAO"]),
    RoleSpec::contains(Role::Occupation, &["OCUPACAO"]),
    RoleSpec::exact(
        Role::WorkStatus,
        &["SITUACAO_TRABALHO", "SITUACAO_NO_MERCADO", "SITUACAO_TRAB"],
    ),
];

const FILTER_ROLES: &[Role] = &[
    Role::EpiWeek,
    Role::AgeBand,
    Role::Sex,
    Role::Race,
    Role::Education,
    Role::Occupation,
    Role::WorkStatus,
    Role::Locality,
    Role::Outcome,
];

pub struct WorkerHealthPage;

impl Page for WorkerHealthPage {
    fn kind(&self) -> PageKind {
        PageKind::WorkerHealth
    }

    fn specs(&self) -> &'static [RoleSpec] {
        SPECS
    }

    fn prepare(&self, table: SheetTable, columns: &mut ResolvedColumns) -> Result<SheetTable> {
        let mut table = table;
        if let Some(date) = columns.get(Role::Date).map(str::to_string) {
            table = derive_column(&table, EPI_WEEK_COLUMN, Some(&date), |v| {
                v.and_then(parse_date).map(|d| iso_week(d).to_string())
            })?;
            columns.set(Role::EpiWeek, EPI_WEEK_COLUMN);
        }
        if let Some(age) = columns.get(Role::AgeBand).map(str::to_string) {
            table = derive_column(&table, AGE_BAND_COLUMN, Some(&age), |v| {
                Some(age_band_from_years(v).to_string())
            })?;
            columns.set(Role::AgeBand, AGE_BAND_COLUMN);
        }
        Ok(table)
    }

    fn filters(&self, columns: &ResolvedColumns) -> FilterSet {
        FilterSet::new()
            .categorical_roles(columns, FILTER_ROLES)
            .date(Role::Date, columns.get(Role::Date))
    }

    fn render(&self, view: &SheetTable, columns: &ResolvedColumns) -> Result<Rendered> {
        let deaths = columns
            .get(Role::Outcome)
            .map_or(0, |c| count_matching(view, c, is_fatality));
        let top_occupation = columns
            .get(Role::Occupation)
            .and_then(|c| most_frequent(view, c))
            .map_or_else(|| UNDEFINED.to_string(), |c| c.key);

        let metrics = vec![
            Metric::new("total", "Total de Acidentes", MetricValue::Count(view.num_rows())),
            Metric::new("deaths", "Óbitos", MetricValue::Count(deaths)),
            Metric::new(
                "top_occupation",
                "Ocupação mais afetada",
                MetricValue::Text(top_occupation),
            ),
        ];

        let col = move |role: Role| columns.get(role);
        let mut charts = Vec::new();
        push(
            &mut charts,
            counts_chart(view, col(Role::EpiWeek), "by_week", "Acidentes por Semana Epidemiológica", ChartKind::Line),
        );
        push(&mut charts, band_chart(view, col(Role::AgeBand), "by_age", "Distribuição por Idade"));
        push(&mut charts, counts_chart(view, col(Role::Sex), "by_sex", "Distribuição por Sexo", ChartKind::Bar));
        push(&mut charts, counts_chart(view, col(Role::Race), "by_race", "Distribuição por Raça/Cor", ChartKind::Bar));
        push(
            &mut charts,
            counts_chart(view, col(Role::Education), "by_education", "Distribuição por Escolaridade", ChartKind::Bar),
        );
        push(
            &mut charts,
            ranked_chart(view, col(Role::Occupation), Some(15), "by_occupation", "Ocupações mais afetadas", ChartKind::HorizontalBar),
        );
        push(
            &mut charts,
            counts_chart(view, col(Role::WorkStatus), "by_work_status", "Situação no Mercado de Trabalho", ChartKind::Bar),
        );
        push(
            &mut charts,
            ranked_chart(view, col(Role::Locality), Some(20), "top_localities", "Top 20 Bairros com Mais Acidentes", ChartKind::Bar),
        );
        push(&mut charts, counts_chart(view, col(Role::Outcome), "by_outcome", "Evolução dos Casos", ChartKind::Bar));

        Ok(Rendered {
            metrics,
            charts,
            data: NamedTable::from_sheet("dados_filtrados", view),
            ..Default::default()
        })
    }
}
