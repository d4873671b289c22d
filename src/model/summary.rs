use crate::model::{parse_records, signed_decimal, Amount, Kind, Period, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where the numbers in a `FinancialSummary` came from.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    /// Totals reported by the backend, balance recomputed.
    Backend,
    /// Folded from the full transaction list.
    Recomputed,
    /// Nothing could be fetched; everything is zero.
    #[default]
    Failed,
}

serde_plain::derive_display_from_serialize!(SummarySource);

/// Balance and totals as shown to the user. `balance == total_income - total_expenses` always
/// holds because the balance is only ever computed here.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub balance: Decimal,
    pub total_expenses: Amount,
    /// Income and salary together.
    pub total_income: Amount,
    #[serde(rename = "recentTransactions")]
    pub recent: Vec<Transaction>,
    pub source: SummarySource,
}

impl FinancialSummary {
    pub(crate) fn new(
        total_expenses: Amount,
        total_income: Amount,
        recent: Vec<Transaction>,
        source: SummarySource,
    ) -> Self {
        Self {
            balance: total_income.value() - total_expenses.value(),
            total_expenses,
            total_income,
            recent,
            source,
        }
    }

    /// The all-zero summary returned when nothing could be fetched.
    pub fn failed() -> Self {
        Self::new(Amount::ZERO, Amount::ZERO, Vec::new(), SummarySource::Failed)
    }
}

/// The summary as the backend reports it. Any field may be missing or unparseable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackendSummary {
    pub success: bool,
    pub balance: Option<Decimal>,
    pub total_expenses: Option<Amount>,
    pub total_income: Option<Amount>,
    pub recent: Vec<Transaction>,
}

impl BackendSummary {
    /// Reads a summary body. Accepts snake_case and camelCase totals, and totals nested under
    /// `data` or `resumo`.
    pub fn from_wire(value: &Value) -> Self {
        let success = value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let body = value
            .get("data")
            .or_else(|| value.get("resumo"))
            .filter(|v| v.is_object())
            .unwrap_or(value);

        let recent = pick(body, &["transacoes_recentes", "transacoesRecentes"])
            .and_then(Value::as_array)
            .map(|items| parse_records(items, None).transactions)
            .unwrap_or_default();

        Self {
            success,
            balance: pick(body, &["saldo", "balance"]).and_then(signed_decimal),
            total_expenses: pick(body, &["total_despesas", "totalDespesas"])
                .and_then(Amount::from_json),
            total_income: pick(body, &["total_ganhos", "totalGanhos"])
                .and_then(Amount::from_json),
            recent,
        }
    }
}

fn pick<'a>(body: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| body.get(*name))
        .find(|v| !v.is_null())
}

/// Filters for a period report. Every field is optional and sent only when present.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodo: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_inicio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_fim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo: Option<Kind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limite: Option<usize>,
}

impl ReportQuery {
    /// The query string pairs, in a stable order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(p) = self.periodo {
            params.push(("periodo", p.to_string()));
        }
        if let Some(d) = &self.data_inicio {
            params.push(("data_inicio", d.clone()));
        }
        if let Some(d) = &self.data_fim {
            params.push(("data_fim", d.clone()));
        }
        if let Some(k) = self.tipo {
            params.push(("tipo", k.to_string()));
        }
        if let Some(l) = self.limite {
            params.push(("limite", l.to_string()));
        }
        params
    }
}

/// A financial report for one period.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub success: bool,
    pub periodo: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub transacoes: Vec<Transaction>,
    pub total_despesas: Amount,
    pub total_ganhos: Amount,
    pub saldo_periodo: Decimal,
    pub total_por_categorias: BTreeMap<String, Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categoria_mais_gasta: Option<String>,
    #[serde(default)]
    pub skipped: usize,
}

impl Report {
    /// The empty report returned when the backend cannot be reached or refuses.
    pub fn failed(periodo: Period, message: impl Into<String>) -> Self {
        Self {
            success: false,
            periodo,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}
