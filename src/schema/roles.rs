use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic meaning a spreadsheet column may play, independent of its header text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Date,
    SymptomDate,
    Locality,
    District,
    Sex,
    Race,
    Education,
    Occupation,
    WorkStatus,
    Outcome,
    EpiWeek,
    Classification,
    AgeBand,
    Pregnant,
    IntakeDate,
    FirstInspection,
    ConclusionDate,
    Situation,
    Coordination,
    Territory,
    WorkedPopulation,
    Exams,
    Positives,
    Treated,
    ToTreat,
}

impl Role {
    pub const ALL: [Role; 25] = [
        Role::Date,
        Role::SymptomDate,
        Role::Locality,
        Role::District,
        Role::Sex,
        Role::Race,
        Role::Education,
        Role::Occupation,
        Role::WorkStatus,
        Role::Outcome,
        Role::EpiWeek,
        Role::Classification,
        Role::AgeBand,
        Role::Pregnant,
        Role::IntakeDate,
        Role::FirstInspection,
        Role::ConclusionDate,
        Role::Situation,
        Role::Coordination,
        Role::Territory,
        Role::WorkedPopulation,
        Role::Exams,
        Role::Positives,
        Role::Treated,
        Role::ToTreat,
    ];

    /// Position in [`Role::ALL`]; used to index role-keyed arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable key used in query strings and JSON.
    pub fn key(self) -> &'static str {
        match self {
            Role::Date => "date",
            Role::SymptomDate => "symptom_date",
            Role::Locality => "locality",
            Role::District => "district",
            Role::Sex => "sex",
            Role::Race => "race",
            Role::Education => "education",
            Role::Occupation => "occupation",
            Role::WorkStatus => "work_status",
            Role::Outcome => "outcome",
            Role::EpiWeek => "epi_week",
            Role::Classification => "classification",
            Role::AgeBand => "age_band",
            Role::Pregnant => "pregnant",
            Role::IntakeDate => "intake_date",
            Role::FirstInspection => "first_inspection",
            Role::ConclusionDate => "conclusion_date",
            Role::Situation => "situation",
            Role::Coordination => "coordination",
            Role::Territory => "territory",
            Role::WorkedPopulation => "worked_population",
            Role::Exams => "exams",
            Role::Positives => "positives",
            Role::Treated => "treated",
            Role::ToTreat => "to_treat",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Role::ALL.iter().copied().find(|r| r.key() == s)
    }

    /// Sidebar label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Role::Date => "Data",
            Role::SymptomDate => "Data dos Primeiros Sintomas",
            Role::Locality => "Localidade",
            Role::District => "Distrito",
            Role::Sex => "Sexo",
            Role::Race => "Raça/Cor",
            Role::Education => "Escolaridade",
            Role::Occupation => "Ocupação",
            Role::WorkStatus => "Situação no Mercado de Trabalho",
            Role::Outcome => "Evolução do Caso",
            Role::EpiWeek => "Semana Epidemiológica",
            Role::Classification => "Classificação",
            Role::AgeBand => "Faixa Etária",
            Role::Pregnant => "Gestante",
            Role::IntakeDate => "Entrada",
            Role::FirstInspection => "1ª Inspeção",
            Role::ConclusionDate => "Data Conclusão",
            Role::Situation => "Situação",
            Role::Coordination => "Coordenação",
            Role::Territory => "Território",
            Role::WorkedPopulation => "População Trabalhada",
            Role::Exams => "Exames",
            Role::Positives => "Positivos",
            Role::Treated => "Tratados",
            Role::ToTreat => "A Tratar",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How a role's candidates are compared against normalized headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Candidate must equal a header.
    Exact,
    /// An exact hit wins; otherwise the candidate may appear anywhere inside a header.
    /// Used for free-text categories whose headers carry extra words.
    Contains,
}

/// One row of a page's candidate table: the role and its header spellings in priority order.
#[derive(Clone, Copy, Debug)]
pub struct RoleSpec {
    pub role: Role,
    pub candidates: &'static [&'static str],
    pub mode: MatchMode,
}

impl RoleSpec {
    pub const fn exact(role: Role, candidates: &'static [&'static str]) -> Self {
        Self {
            role,
            candidates,
            mode: MatchMode::Exact,
        }
    }

    pub const fn contains(role: Role, candidates: &'static [&'static str]) -> Self {
        Self {
            role,
            candidates,
            mode: MatchMode::Contains,
        }
    }
}
