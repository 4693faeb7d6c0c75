//! Header → role resolution.
//!
//! Spreadsheet owners retype headers between editions (`DATA`, `DATA_OCORRENCIA`,
//! `DT_OCORRENCIA`, `Data de Notificação`, ...). Each page supplies an ordered
//! candidate list per role and the resolver picks the first candidate present
//! in the current load. An unmatched role is simply absent.

use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::normalize::normalize_header;
use super::roles::{MatchMode, Role, RoleSpec};

/// Role → normalized column name for one load of a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    columns: [Option<String>; Role::ALL.len()],
}

impl ResolvedColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.columns[role.index()].as_deref()
    }

    pub fn has(&self, role: Role) -> bool {
        self.columns[role.index()].is_some()
    }

    pub fn set(&mut self, role: Role, column: impl Into<String>) {
        self.columns[role.index()] = Some(column.into());
    }

    pub fn clear(&mut self, role: Role) {
        self.columns[role.index()] = None;
    }

    /// Present roles in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> + '_ {
        Role::ALL
            .iter()
            .filter_map(move |r| self.get(*r).map(|c| (*r, c)))
    }

    pub fn len(&self) -> usize {
        self.columns.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for ResolvedColumns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(r, c)| (r.key(), c)))
    }
}

/// Two raw headers that normalized to the same name; only the first is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCollision {
    pub normalized: String,
    pub kept: String,
    pub dropped: String,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Normalized names of the columns that survive de-duplication, in sheet order.
    pub headers: Vec<String>,
    /// For each entry in `headers`, its position in the raw header list.
    pub source_index: Vec<usize>,
    pub collisions: Vec<HeaderCollision>,
    pub columns: ResolvedColumns,
}

/// Normalized names with blanks replaced by `COLUNA_{n}`. Blanks are named
/// after every real header so they never take a name one of those owns.
fn positional_names<S: AsRef<str>>(raw_headers: &[S]) -> Vec<String> {
    let mut names: Vec<String> = raw_headers
        .iter()
        .map(|h| normalize_header(h.as_ref()))
        .collect();
    let mut taken: HashSet<String> = names.iter().filter(|n| !n.is_empty()).cloned().collect();
    for (i, name) in names.iter_mut().enumerate() {
        if !name.is_empty() {
            continue;
        }
        let base = format!("COLUNA_{}", i + 1);
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        taken.insert(candidate.clone());
        *name = candidate;
    }
    names
}

/// Normalize `raw_headers`, drop post-normalization duplicates (first seen wins)
/// and match every spec against the survivors. Never fails.
pub fn resolve<S: AsRef<str>>(raw_headers: &[S], specs: &[RoleSpec]) -> Resolution {
    let mut headers = Vec::with_capacity(raw_headers.len());
    let mut source_index = Vec::with_capacity(raw_headers.len());
    let mut collisions = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    let names = positional_names(raw_headers);
    for (i, name) in names.into_iter().enumerate() {
        let raw = raw_headers[i].as_ref();
        if let Some(&kept_at) = first_seen.get(&name) {
            let kept = raw_headers[kept_at].as_ref().to_string();
            warn!(
                normalized = %name,
                kept = %kept,
                dropped = %raw,
                "headers collide after normalization; keeping the first"
            );
            collisions.push(HeaderCollision {
                normalized: name,
                kept,
                dropped: raw.to_string(),
            });
            continue;
        }

        first_seen.insert(name.clone(), i);
        headers.push(name);
        source_index.push(i);
    }

    let mut columns = ResolvedColumns::new();
    for spec in specs {
        if columns.has(spec.role) {
            continue;
        }
        match match_spec(&headers, spec) {
            Some(col) => {
                debug!(role = %spec.role, column = %col, "resolved");
                columns.set(spec.role, col);
            }
            None => debug!(role = %spec.role, "no candidate matched"),
        }
    }

    Resolution {
        headers,
        source_index,
        collisions,
        columns,
    }
}

fn match_spec(headers: &[String], spec: &RoleSpec) -> Option<String> {
    for candidate in spec.candidates {
        let wanted = normalize_header(candidate);
        if wanted.is_empty() {
            continue;
        }
        if let Some(h) = headers.iter().find(|h| **h == wanted) {
            return Some(h.clone());
        }
        if spec.mode == MatchMode::Contains {
            if let Some(h) = headers.iter().find(|h| h.contains(&wanted)) {
                return Some(h.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: RoleSpec = RoleSpec::exact(
        Role::Date,
        &[
            "DATA_DA_OCORRENCIA",
            "DATA_OCORRENCIA",
            "DT_OCORRENCIA",
            "DATA DE NOTIFICAÇÃO",
            "DATA",
        ],
    );
    const OUTCOME: RoleSpec = RoleSpec::contains(Role::Outcome, &["EVOLUCAO", "EVOLUÇÃO DO CASO"]);
    const SEX: RoleSpec = RoleSpec::exact(Role::Sex, &["SEXO", "GENERO"]);

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_candidate_in_priority_order_wins() {
        let res = resolve(&headers(&["DATA", "Dt-Ocorrência", "Sexo"]), &[DATE, SEX]);
        // DT_OCORRENCIA outranks DATA in the candidate list even though DATA comes first in the sheet
        assert_eq!(res.columns.get(Role::Date), Some("DT_OCORRENCIA"));
        assert_eq!(res.columns.get(Role::Sex), Some("SEXO"));
    }

    #[test]
    fn contains_mode_matches_inside_longer_headers() {
        let res = resolve(&headers(&["Bairro", "Evolução do Caso"]), &[OUTCOME]);
        assert_eq!(res.columns.get(Role::Outcome), Some("EVOLUCAO_DO_CASO"));
    }

    #[test]
    fn contains_mode_prefers_exact_hit() {
        let res = resolve(&headers(&["DATA_EVOLUCAO", "EVOLUCAO"]), &[OUTCOME]);
        assert_eq!(res.columns.get(Role::Outcome), Some("EVOLUCAO"));
    }

    #[test]
    fn exact_mode_ignores_substrings() {
        let res = resolve(&headers(&["SEXO_BIOLOGICO"]), &[SEX]);
        assert_eq!(res.columns.get(Role::Sex), None);
    }

    #[test]
    fn absent_roles_are_not_errors() {
        let res = resolve::<String>(&[], &[DATE, OUTCOME, SEX]);
        assert!(res.columns.is_empty());
        assert!(res.headers.is_empty());

        let res = resolve(&headers(&["FOO", "BAR"]), &[]);
        assert!(res.columns.is_empty());
        assert_eq!(res.headers, vec!["FOO", "BAR"]);
    }

    #[test]
    fn duplicates_after_normalization_keep_first_and_report() {
        let res = resolve(&headers(&["Raça/Cor", "Sexo", "RACA COR"]), &[]);
        assert_eq!(res.headers, vec!["RACA_COR", "SEXO"]);
        assert_eq!(res.source_index, vec![0, 1]);
        assert_eq!(
            res.collisions,
            vec![HeaderCollision {
                normalized: "RACA_COR".into(),
                kept: "Raça/Cor".into(),
                dropped: "RACA COR".into(),
            }]
        );
    }

    #[test]
    fn blank_headers_get_positional_names() {
        let res = resolve(&headers(&["A", "", " "]), &[]);
        assert_eq!(res.headers, vec!["A", "COLUNA_2", "COLUNA_3"]);
        assert!(res.collisions.is_empty());
    }

    #[test]
    fn blank_header_never_claims_a_real_name() {
        let res = resolve(&headers(&["", "Coluna 1", "Sexo"]), &[]);
        assert_eq!(res.headers, vec!["COLUNA_1_2", "COLUNA_1", "SEXO"]);
        assert_eq!(res.source_index, vec![0, 1, 2]);
        assert!(res.collisions.is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let hs = headers(&[
            "Data de Notificação",
            "Bairro",
            "Sexo",
            "Evolução do Caso",
            "DATA",
        ]);
        let first = resolve(&hs, &[DATE, OUTCOME, SEX]);
        for _ in 0..20 {
            let again = resolve(&hs, &[DATE, OUTCOME, SEX]);
            assert_eq!(again.columns, first.columns);
            assert_eq!(again.headers, first.headers);
        }
        assert_eq!(first.columns.get(Role::Date), Some("DATA_DE_NOTIFICACAO"));
    }

    #[test]
    fn serializes_present_roles_only() -> anyhow::Result<()> {
        let res = resolve(&headers(&["Sexo"]), &[DATE, SEX]);
        let json = serde_json::to_value(&res.columns)?;
        assert_eq!(json, serde_json::json!({ "sex": "SEXO" }));
        Ok(())
    }
}
