use serde::{Deserialize, Serialize};

/// The transaction discriminator. Direction lives here, never in the sign of the amount.
///
/// Serialized with the backend's names: `despesa`, `ganho`, `salario`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "despesa", alias = "expense")]
    Expense,
    #[serde(rename = "ganho", alias = "income")]
    Income,
    #[serde(rename = "salario", alias = "salary")]
    Salary,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Expense, Kind::Income, Kind::Salary];

    /// The name the backend uses in paths and in the `tipo` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Kind::Expense => "despesa",
            Kind::Income => "ganho",
            Kind::Salary => "salario",
        }
    }

    /// The response field that may carry the identifier of a newly created record.
    pub fn id_field(self) -> &'static str {
        match self {
            Kind::Expense => "despesa_id",
            Kind::Income => "ganho_id",
            Kind::Salary => "salario_id",
        }
    }

    /// Income and salary both count as money coming in.
    pub fn is_inflow(self) -> bool {
        !matches!(self, Kind::Expense)
    }

    /// Lenient parsing of the many spellings the backend and older clients use.
    pub fn from_wire(s: &str) -> Option<Kind> {
        match s.trim().to_lowercase().as_str() {
            "despesa" | "despesas" | "expense" | "expenses" => Some(Kind::Expense),
            "ganho" | "ganhos" | "receita" | "receitas" | "income" => Some(Kind::Income),
            "salario" | "salário" | "salarios" | "salary" => Some(Kind::Salary),
            _ => None,
        }
    }
}

/// How often a salary repeats.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub enum Period {
    #[default]
    #[serde(rename = "mensal", alias = "monthly")]
    Monthly,
    #[serde(rename = "quinzenal", alias = "biweekly")]
    Biweekly,
    #[serde(rename = "semanal", alias = "weekly")]
    Weekly,
    #[serde(rename = "anual", alias = "yearly")]
    Yearly,
}

serde_plain::derive_display_from_serialize!(Period);
serde_plain::derive_fromstr_from_deserialize!(Period);
