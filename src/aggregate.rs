//! Balance and totals.
//!
//! `compute_summary` is pure: same inputs, same output. `refresh` is the async wrapper that
//! decides which inputs to fetch.

use crate::gateway::Gateway;
use crate::model::{Amount, BackendSummary, FinancialSummary, Kind, SummarySource, Transaction};
use crate::session::Session;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Label used for transactions without a category.
pub const UNCATEGORIZED: &str = "Sem categoria";

/// How far a backend-reported balance may drift from `ganhos - despesas` and still be trusted.
fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// A backend summary is usable when it says it succeeded, both totals parse, and its balance is
/// absent or within one cent of what the totals imply. A balance too far out of range to compare
/// is not usable.
pub fn is_usable(summary: &BackendSummary) -> bool {
    let (Some(expenses), Some(income)) = (summary.total_expenses, summary.total_income) else {
        return false;
    };
    if !summary.success {
        return false;
    }
    let Some(balance) = summary.balance else {
        return true;
    };
    income
        .value()
        .checked_sub(expenses.value())
        .and_then(|implied| balance.checked_sub(implied))
        .is_some_and(|drift| drift.abs() <= tolerance())
}

/// Builds the summary from a trusted backend summary when there is one, otherwise by folding the
/// full transaction list, otherwise as an all-zero summary tagged `Failed`. The balance is always
/// computed here from the totals.
pub fn compute_summary(
    backend: Option<&BackendSummary>,
    all: Option<&[Transaction]>,
    recent_limit: usize,
) -> FinancialSummary {
    if let Some(summary) = backend.filter(|s| is_usable(s)) {
        if let (Some(expenses), Some(income)) = (summary.total_expenses, summary.total_income) {
            let recent = if summary.recent.is_empty() {
                all.map(|a| most_recent(a, recent_limit)).unwrap_or_default()
            } else {
                most_recent(&summary.recent, recent_limit)
            };
            return FinancialSummary::new(expenses, income, recent, SummarySource::Backend);
        }
    }
    match all {
        Some(transactions) => {
            let (expenses, income) = fold(transactions);
            FinancialSummary::new(
                expenses,
                income,
                most_recent(transactions, recent_limit),
                SummarySource::Recomputed,
            )
        }
        None => FinancialSummary::failed(),
    }
}

/// Sums expenses and inflows (income and salary) separately, as `(expenses, income)`. A record
/// that would overflow its running total is left out.
pub fn fold(transactions: &[Transaction]) -> (Amount, Amount) {
    let mut expenses = Decimal::ZERO;
    let mut income = Decimal::ZERO;
    for t in transactions {
        let total = if t.kind.is_inflow() {
            &mut income
        } else {
            &mut expenses
        };
        add_or_skip(total, t);
    }
    (Amount::new(expenses), Amount::new(income))
}

fn add_or_skip(total: &mut Decimal, t: &Transaction) {
    match total.checked_add(t.amount.value()) {
        Some(sum) => *total = sum,
        None => warn!(
            "Leaving {} {} ({:?}) out of the totals: the sum overflows",
            t.kind,
            t.amount.value(),
            t.id
        ),
    }
}

/// The `limit` newest transactions, newest first. Undated ones sort last.
pub fn most_recent(transactions: &[Transaction], limit: usize) -> Vec<Transaction> {
    let mut sorted = transactions.to_vec();
    sorted.sort_by(|a, b| b.date().cmp(&a.date()));
    sorted.truncate(limit);
    sorted
}

/// Totals per category label, optionally for one kind only.
pub fn category_totals(
    transactions: &[Transaction],
    kind: Option<Kind>,
) -> BTreeMap<String, Amount> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for t in transactions.iter().filter(|t| kind.map_or(true, |k| t.kind == k)) {
        let label = t.category.clone().unwrap_or_else(|| UNCATEGORIZED.to_string());
        add_or_skip(totals.entry(label).or_default(), t);
    }
    totals
        .into_iter()
        .map(|(label, total)| (label, Amount::new(total)))
        .collect()
}

/// The expense category with the largest total. Ties go to the label that sorts first.
pub fn most_spent(transactions: &[Transaction]) -> Option<String> {
    category_totals(transactions, Some(Kind::Expense))
        .into_iter()
        .fold(None, |best: Option<(String, Amount)>, (label, total)| match best {
            Some((_, best_total)) if best_total >= total => best,
            _ => Some((label, total)),
        })
        .map(|(label, _)| label)
}

/// Fetches what is needed and computes the summary: the backend summary if it is usable, else the
/// full transaction list, else zeros. Never fails.
pub async fn refresh(gateway: &Gateway, session: &Session) -> FinancialSummary {
    let limit = gateway.recent_limit();
    match gateway.fetch_summary(session).await {
        Ok(summary) if is_usable(&summary) => {
            debug!("Using the backend summary");
            return compute_summary(Some(&summary), None, limit);
        }
        Ok(summary) => warn!(
            "The backend summary is unusable (success: {}, saldo: {:?}); recomputing",
            summary.success, summary.balance
        ),
        Err(e) => warn!("Fetching the backend summary failed: {e}; recomputing"),
    }

    let list = gateway.list_transactions(session, None, None).await;
    if list.success {
        compute_summary(None, Some(&list.transacoes), limit)
    } else {
        warn!("Unable to compute a summary; returning zeros");
        FinancialSummary::failed()
    }
}
