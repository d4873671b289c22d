//! Sequences gateway calls for the UI and keeps the client-visible state.
//!
//! Each mutation walks `Idle -> Requesting -> RefreshingSummary -> Idle` on success and
//! `Idle -> Requesting -> Idle` on failure. Only a successful mutation refreshes the summary.
//! Mutations take `&mut self`, so a single pipeline never has two in flight; separate pipelines
//! over the same backend are not coordinated.

use crate::aggregate;
use crate::categories::{CategoryOutcome, CategorySet, CategoryStore};
use crate::error::SyncError;
use crate::gateway::{Created, Gateway};
use crate::model::{FinancialSummary, Kind, Report, ReportQuery, SummarySource, Transaction};
use crate::normalize::{self, TransactionDraft};
use crate::session::Session;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const LIST_FAILED: &str = "Erro ao listar transações";
pub const SUMMARY_FAILED: &str = "Erro ao obter resumo financeiro";
pub const UPDATE_FAILED: &str = "Erro ao atualizar transação";

/// The message shown when adding a `kind` fails without a better explanation.
pub fn create_failed(kind: Kind) -> &'static str {
    match kind {
        Kind::Expense => "Erro ao adicionar despesa",
        Kind::Income => "Erro ao adicionar ganho",
        Kind::Salary => "Erro ao adicionar salário",
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Requesting,
    RefreshingSummary,
}

serde_plain::derive_display_from_serialize!(Phase);

/// What the UI renders.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub phase: Phase,
    pub transactions: Vec<Transaction>,
    pub summary: FinancialSummary,
    pub categories: CategorySet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// The result of one pipeline action, with the phases it went through in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub transitions: Vec<Phase>,
}

#[derive(Debug)]
pub struct ActionPipeline {
    gateway: Gateway,
    store: CategoryStore,
    session: Session,
    state: ClientState,
}

impl ActionPipeline {
    pub fn new(gateway: Gateway, store: CategoryStore, session: Session) -> Self {
        Self {
            gateway,
            store,
            session,
            state: ClientState {
                categories: CategorySet::defaults(),
                ..ClientState::default()
            },
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn store(&self) -> &CategoryStore {
        &self.store
    }

    pub async fn add_expense(&mut self, draft: &TransactionDraft) -> ActionOutcome {
        self.add_transaction(Kind::Expense, draft).await
    }

    pub async fn add_income(&mut self, draft: &TransactionDraft) -> ActionOutcome {
        self.add_transaction(Kind::Income, draft).await
    }

    pub async fn add_salary(&mut self, draft: &TransactionDraft) -> ActionOutcome {
        self.add_transaction(Kind::Salary, draft).await
    }

    /// Creates the transaction, adds its canonical form to the state and refreshes the summary.
    pub async fn add_transaction(&mut self, kind: Kind, draft: &TransactionDraft) -> ActionOutcome {
        let mut transitions = vec![self.enter(Phase::Requesting)];
        let result = self.gateway.create(&self.session, kind, draft).await;
        match &result {
            Ok(created) => {
                let mut wire = normalize::to_wire(kind, draft);
                if let Some(id) = &created.identifier {
                    wire.insert("id".to_string(), Value::String(id.clone()));
                }
                match Transaction::from_wire(&Value::Object(wire), Some(kind)) {
                    Ok(t) => {
                        let t = self.with_label(t);
                        self.state.transactions.push(t)
                    }
                    Err(e) => warn!("Created {kind} cannot be shown locally: {e}"),
                }
            }
            Err(e) => warn!("Adding {kind} failed: {e}"),
        }
        self.finish(result, create_failed(kind), &mut transitions).await
    }

    /// Updates the transaction remotely and, on success, in the local state.
    pub async fn update_transaction(
        &mut self,
        kind: Kind,
        id: &str,
        fields: &Map<String, Value>,
    ) -> ActionOutcome {
        let mut transitions = vec![self.enter(Phase::Requesting)];
        let result = self
            .gateway
            .update_transaction(&self.session, kind, id, fields)
            .await;
        if result.is_ok() {
            for t in self
                .state
                .transactions
                .iter_mut()
                .filter(|t| t.id.as_deref() == Some(id))
            {
                *t = apply_update(t, fields);
            }
        }
        self.finish(result, UPDATE_FAILED, &mut transitions).await
    }

    /// Replaces the state's transactions with a fresh listing. On failure the old list is kept.
    pub async fn load_transactions(
        &mut self,
        kind: Option<Kind>,
        limit: Option<usize>,
    ) -> ActionOutcome {
        let mut transitions = vec![self.enter(Phase::Requesting)];
        let list = self
            .gateway
            .list_transactions(&self.session, kind, limit)
            .await;
        transitions.push(self.enter(Phase::Idle));
        if list.success {
            let count = list.transacoes.len();
            self.state.transactions = list
                .transacoes
                .into_iter()
                .map(|t| self.with_label(t))
                .collect();
            self.state.last_error = None;
            ActionOutcome {
                success: true,
                message: format!("Loaded {count} transaction(s)"),
                identifier: None,
                transitions,
            }
        } else {
            let message = list.message.unwrap_or_else(|| LIST_FAILED.to_string());
            self.state.last_error = Some(message.clone());
            ActionOutcome {
                success: false,
                message,
                identifier: None,
                transitions,
            }
        }
    }

    /// Recomputes the summary and stores it in the state. Never fails; a summary that could not be
    /// computed is all zeros and sets `last_error`.
    pub async fn refresh_summary(&mut self) -> FinancialSummary {
        self.enter(Phase::RefreshingSummary);
        let summary = self.store_summary().await;
        self.enter(Phase::Idle);
        summary
    }

    pub async fn load_categories(&mut self) -> Result<CategorySet> {
        let set = self.store.load_all().await?;
        self.state.categories = set.clone();
        Ok(set)
    }

    /// Adds a category label locally and reloads the state's categories when it was accepted.
    pub async fn add_category(&mut self, kind: Kind, label: &str) -> Result<CategoryOutcome> {
        let outcome = self.store.add(kind, label).await?;
        if outcome.success {
            self.load_categories().await?;
        } else {
            self.state.last_error = Some(outcome.message.clone());
        }
        Ok(outcome)
    }

    pub async fn report(&mut self, query: &ReportQuery) -> Report {
        let report = self.gateway.report(&self.session, query).await;
        if !report.success {
            self.state.last_error = report.message.clone();
        }
        report
    }

    /// Replaces a legacy numeric category id with the label it stands for.
    fn with_label(&self, mut t: Transaction) -> Transaction {
        let kind = t.kind;
        t.category = t
            .category
            .map(|c| self.state.categories.label_for(kind, &c));
        t
    }

    async fn store_summary(&mut self) -> FinancialSummary {
        let summary = aggregate::refresh(&self.gateway, &self.session).await;
        if summary.source == SummarySource::Failed {
            self.state.last_error = Some(SUMMARY_FAILED.to_string());
        }
        self.state.summary = summary.clone();
        summary
    }

    fn enter(&mut self, phase: Phase) -> Phase {
        debug!("{} -> {}", self.state.phase, phase);
        self.state.phase = phase;
        phase
    }

    async fn finish(
        &mut self,
        result: std::result::Result<Created, SyncError>,
        fallback: &str,
        transitions: &mut Vec<Phase>,
    ) -> ActionOutcome {
        let outcome = match result {
            Ok(created) => {
                info!("{}", created.message);
                self.state.last_error = None;
                transitions.push(self.enter(Phase::RefreshingSummary));
                self.store_summary().await;
                ActionOutcome {
                    success: true,
                    message: created.message,
                    identifier: created.identifier,
                    transitions: Vec::new(),
                }
            }
            Err(e) => {
                let message = failure_message(&e, fallback);
                self.state.last_error = Some(message.clone());
                ActionOutcome {
                    success: false,
                    message,
                    identifier: None,
                    transitions: Vec::new(),
                }
            }
        };
        transitions.push(self.enter(Phase::Idle));
        ActionOutcome {
            transitions: std::mem::take(transitions),
            ..outcome
        }
    }
}

/// The server's or network's own words when there are any, otherwise `fallback`.
fn failure_message(error: &SyncError, fallback: &str) -> String {
    match error {
        SyncError::Server { message, .. } | SyncError::Network { message }
            if !message.trim().is_empty() =>
        {
            message.clone()
        }
        SyncError::Validation { .. } | SyncError::AuthMissing => error.to_string(),
        _ => fallback.to_string(),
    }
}

/// The local record with `fields` applied the same way the backend would apply them.
fn apply_update(existing: &Transaction, fields: &Map<String, Value>) -> Transaction {
    let mut wire = Map::new();
    wire.insert("tipo".to_string(), Value::String(existing.kind.wire_name().to_string()));
    wire.insert("valor".to_string(), existing.amount.to_json());
    if let Some(id) = &existing.id {
        wire.insert("id".to_string(), Value::String(id.clone()));
    }
    if let Some(category) = &existing.category {
        wire.insert("categoria".to_string(), Value::String(category.clone()));
    }
    if let Some(description) = &existing.description {
        wire.insert("descricao".to_string(), Value::String(description.clone()));
    }
    if let Some(date) = &existing.occurred_at {
        wire.insert("data".to_string(), Value::String(date.clone()));
    }
    if let Some(terms) = &existing.salary {
        if let Some(received) = &terms.received_at {
            wire.insert("data_recebimento".to_string(), Value::String(received.clone()));
        }
        wire.insert("recorrente".to_string(), Value::Bool(terms.recurring));
        wire.insert("periodo".to_string(), Value::String(terms.period.to_string()));
    }
    wire.extend(normalize::normalize_update(fields));
    Transaction::from_wire(&Value::Object(wire), Some(existing.kind))
        .unwrap_or_else(|_| existing.clone())
}
