//! The locally persisted category labels, one ordered sequence per transaction kind.
//!
//! Appends are read-modify-write against the cache with no lock. Two concurrent `add` calls for
//! the same kind can both read the old sequence and the later write wins, losing the other label.
//! This is a known gap; a per-kind append queue would close it.

use crate::cache::{self, KvCache};
use crate::model::Kind;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const EXPENSE_KEY: &str = "@VicCoin:categoriasDespesas";
pub const INCOME_KEY: &str = "@VicCoin:categoriasGanhos";
pub const SALARY_KEY: &str = "@VicCoin:categoriasSalario";

pub const DUPLICATE_MESSAGE: &str = "Esta categoria já existe";
pub const ADDED_MESSAGE: &str = "Categoria adicionada com sucesso";
pub const EMPTY_MESSAGE: &str = "O nome da categoria não pode ficar vazio";

const EXPENSE_DEFAULTS: [&str; 9] = [
    "Alimentação",
    "Transporte",
    "Moradia",
    "Saúde",
    "Educação",
    "Lazer",
    "Supermercado",
    "Vestuário",
    "Outras",
];
const INCOME_DEFAULTS: [&str; 5] = ["Freelance", "Investimentos", "Vendas", "Presentes", "Outras"];
const SALARY_DEFAULTS: [&str; 6] = [
    "Mensal",
    "Quinzenal",
    "Semanal",
    "Bônus",
    "Participação",
    "Outras",
];

/// The cache key for `kind`'s sequence.
pub fn key(kind: Kind) -> &'static str {
    match kind {
        Kind::Expense => EXPENSE_KEY,
        Kind::Income => INCOME_KEY,
        Kind::Salary => SALARY_KEY,
    }
}

/// The seed sequence used until something has been stored for `kind`.
pub fn defaults(kind: Kind) -> Vec<String> {
    let labels: &[&str] = match kind {
        Kind::Expense => &EXPENSE_DEFAULTS,
        Kind::Income => &INCOME_DEFAULTS,
        Kind::Salary => &SALARY_DEFAULTS,
    };
    labels.iter().map(|s| s.to_string()).collect()
}

/// The result of an `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub success: bool,
    pub message: String,
}

impl CategoryOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            message: ADDED_MESSAGE.to_string(),
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// All three sequences at once.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet {
    pub expense: Vec<String>,
    pub income: Vec<String>,
    pub salary: Vec<String>,
}

impl CategorySet {
    /// The seed sequences.
    pub fn defaults() -> Self {
        Self {
            expense: defaults(Kind::Expense),
            income: defaults(Kind::Income),
            salary: defaults(Kind::Salary),
        }
    }

    pub fn get(&self, kind: Kind) -> &[String] {
        match kind {
            Kind::Expense => &self.expense,
            Kind::Income => &self.income,
            Kind::Salary => &self.salary,
        }
    }

    /// Resolves a category reference to a label. Legacy numeric ids are 1-based positions in the
    /// kind's sequence; anything else, including an out-of-range number, is already a label.
    pub fn label_for(&self, kind: Kind, reference: &str) -> String {
        let labels = self.get(kind);
        reference
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .and_then(|n| labels.get(n - 1))
            .cloned()
            .unwrap_or_else(|| reference.to_string())
    }
}

/// Reads and appends category labels in the key-value cache.
#[derive(Clone)]
pub struct CategoryStore {
    cache: Arc<dyn KvCache>,
}

impl CategoryStore {
    pub fn new(cache: Arc<dyn KvCache>) -> Self {
        Self { cache }
    }

    /// The stored sequence for `kind`, or the seed defaults when nothing has been stored yet.
    pub async fn list(&self, kind: Kind) -> Result<Vec<String>> {
        let stored: Option<Vec<String>> = cache::read_json(self.cache.as_ref(), key(kind)).await?;
        Ok(stored.unwrap_or_else(|| defaults(kind)))
    }

    /// Appends `label` unless it is blank or already present (exact, case-sensitive match), then
    /// persists the whole sequence.
    pub async fn add(&self, kind: Kind, label: &str) -> Result<CategoryOutcome> {
        if label.trim().is_empty() {
            return Ok(CategoryOutcome::rejected(EMPTY_MESSAGE));
        }
        let mut labels = self.list(kind).await?;
        if labels.iter().any(|l| l == label) {
            debug!("Category '{label}' already exists for {kind}");
            return Ok(CategoryOutcome::rejected(DUPLICATE_MESSAGE));
        }
        labels.push(label.to_string());
        cache::write_json(self.cache.as_ref(), key(kind), &labels).await?;
        debug!("Added category '{label}' for {kind}");
        Ok(CategoryOutcome::ok())
    }

    pub async fn load_all(&self) -> Result<CategorySet> {
        Ok(CategorySet {
            expense: self.list(Kind::Expense).await?,
            income: self.list(Kind::Income).await?,
            salary: self.list(Kind::Salary).await?,
        })
    }
}

impl std::fmt::Debug for CategoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryStore").finish_non_exhaustive()
    }
}
