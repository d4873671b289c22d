//! Create, list, update and report operations against the backend.
//!
//! Every operation takes the `Session` explicitly. Mutations return `Result<Created, SyncError>`;
//! reads never fail and instead return an empty value tagged `success: false`.

use crate::api::{
    self, Endpoints, HttpRequest, HttpResponse, Method, ProbeKind, Resolution, TransportChain,
};
use crate::categories::CategoryStore;
use crate::error::{ErrorDetails, SyncError};
use crate::model::{
    parse_records, signed_decimal, Amount, BackendSummary, Kind, Period, Report, ReportQuery,
    Transaction,
};
use crate::normalize::{self, TransactionDraft};
use crate::session::Session;
use crate::{aggregate, Config};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// A write the backend acknowledged. The identifier is `None` when the backend accepted the write
/// without saying which id it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub identifier: Option<String>,
    pub message: String,
}

/// The `{success, message, identifier?, errorDetails?}` object UI layers expect from a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReport {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
}

impl From<&std::result::Result<Created, SyncError>> for MutationReport {
    fn from(result: &std::result::Result<Created, SyncError>) -> Self {
        match result {
            Ok(created) => Self {
                success: true,
                message: created.message.clone(),
                identifier: created.identifier.clone(),
                error_details: None,
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                identifier: None,
                error_details: e.details(),
            },
        }
    }
}

/// The result of listing transactions. On failure `success` is false and the list is empty.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionList {
    pub success: bool,
    pub transacoes: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ganhos: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_despesas: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Records dropped because they had no usable kind or amount.
    #[serde(default)]
    pub skipped: usize,
}

impl TransactionList {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Talks to the backend on behalf of the rest of the crate.
#[derive(Debug)]
pub struct Gateway {
    endpoints: Endpoints,
    chain: TransportChain,
    recent_limit: usize,
    discovered: Mutex<BTreeMap<ProbeKind, String>>,
}

impl Gateway {
    pub fn new(config: &Config, chain: TransportChain) -> Self {
        Self {
            endpoints: Endpoints::new(config.base_url()),
            chain,
            recent_limit: config.recent_limit(),
            discovered: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn recent_limit(&self) -> usize {
        self.recent_limit
    }

    pub async fn create_expense(
        &self,
        session: &Session,
        draft: &TransactionDraft,
    ) -> std::result::Result<Created, SyncError> {
        self.create(session, Kind::Expense, draft).await
    }

    pub async fn create_income(
        &self,
        session: &Session,
        draft: &TransactionDraft,
    ) -> std::result::Result<Created, SyncError> {
        self.create(session, Kind::Income, draft).await
    }

    pub async fn create_salary(
        &self,
        session: &Session,
        draft: &TransactionDraft,
    ) -> std::result::Result<Created, SyncError> {
        self.create(session, Kind::Salary, draft).await
    }

    /// Validates, normalizes and POSTs a new transaction. Validation and the auth check happen
    /// before anything is sent.
    pub async fn create(
        &self,
        session: &Session,
        kind: Kind,
        draft: &TransactionDraft,
    ) -> std::result::Result<Created, SyncError> {
        let fields = missing_fields(kind, draft);
        if !fields.is_empty() {
            debug!("Not sending {kind}: missing {fields:?}");
            return Err(SyncError::Validation { fields });
        }
        let token = session.token().ok_or(SyncError::AuthMissing)?;

        let url = self.endpoints.create(kind);
        let wire = Value::Object(normalize::to_wire(kind, draft));
        debug!("Creating {kind} at {url}");
        let body = self.write(Method::Post, &url, token, wire).await?;

        let identifier = normalize::extract_id(kind, &body);
        if identifier.is_none() {
            warn!("The backend accepted the {kind} but did not say under which id");
        }
        Ok(Created {
            identifier,
            message: server_message(&body)
                .unwrap_or_else(|| "Transação registrada com sucesso".to_string()),
        })
    }

    /// PUTs normalized fields to the transaction. When that fails for any reason, PATCHes the raw
    /// fields to the same URL before giving up.
    pub async fn update_transaction(
        &self,
        session: &Session,
        kind: Kind,
        id: &str,
        fields: &Map<String, Value>,
    ) -> std::result::Result<Created, SyncError> {
        let mut missing = Vec::new();
        if id.trim().is_empty() {
            missing.push("id");
        }
        if fields.is_empty() {
            missing.push("fields");
        }
        if !missing.is_empty() {
            return Err(SyncError::Validation { fields: missing });
        }
        let token = session.token().ok_or(SyncError::AuthMissing)?;

        let url = self.endpoints.update(kind, id);
        let normalized = Value::Object(normalize::normalize_update(fields));
        let body = match self.write(Method::Put, &url, token, normalized).await {
            Ok(body) => body,
            Err(e) => {
                warn!("PUT {url} failed: {e}. Trying PATCH");
                self.write(Method::Patch, &url, token, Value::Object(fields.clone()))
                    .await?
            }
        };
        Ok(Created {
            identifier: Some(id.to_string()),
            message: server_message(&body)
                .unwrap_or_else(|| "Transação atualizada com sucesso".to_string()),
        })
    }

    /// Lists transactions, optionally filtered by kind and limited in number. Never fails.
    pub async fn list_transactions(
        &self,
        session: &Session,
        kind: Option<Kind>,
        limit: Option<usize>,
    ) -> TransactionList {
        let Some(token) = session.token() else {
            warn!("Not listing transactions: {}", SyncError::AuthMissing);
            return TransactionList::failed(SyncError::AuthMissing.to_string());
        };
        let url = self.endpoints.list(kind, limit);
        let body = match self.read(&url, token).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Listing transactions failed: {e}");
                return TransactionList::failed(e.to_string());
            }
        };

        let Some(items) = transaction_array(&body) else {
            warn!("The transaction list response has no transaction array");
            return TransactionList::failed("A resposta não contém a lista de transações");
        };
        let parsed = parse_records(items, kind);
        if parsed.skipped > 0 {
            warn!("Skipped {} unreadable transaction(s)", parsed.skipped);
        }
        TransactionList {
            success: true,
            transacoes: parsed.transactions,
            total_ganhos: body.get("total_ganhos").and_then(Amount::from_json),
            total_despesas: body.get("total_despesas").and_then(Amount::from_json),
            message: None,
            skipped: parsed.skipped,
        }
    }

    /// The backend's own summary, unvalidated.
    pub async fn fetch_summary(
        &self,
        session: &Session,
    ) -> std::result::Result<BackendSummary, SyncError> {
        let token = session.token().ok_or(SyncError::AuthMissing)?;
        let body = self.read(&self.endpoints.summary(), token).await?;
        Ok(BackendSummary::from_wire(&body))
    }

    /// A report for the period described by `query`. Totals and per-category figures the backend
    /// leaves out are computed from the report's transactions. Never fails.
    pub async fn report(&self, session: &Session, query: &ReportQuery) -> Report {
        let periodo = query.periodo.unwrap_or_default();
        let Some(token) = session.token() else {
            return Report::failed(periodo, SyncError::AuthMissing.to_string());
        };
        match self.read(&self.endpoints.report(query), token).await {
            Ok(body) => build_report(&body, query),
            Err(e) => {
                warn!("Fetching the report failed: {e}");
                Report::failed(periodo, e.to_string())
            }
        }
    }

    /// Probes the candidates for `kind` and remembers the winner for diagnostics.
    pub async fn probe(&self, session: &Session, kind: ProbeKind) -> Resolution {
        let candidates = self
            .endpoints
            .candidates(kind, session.user_id(), self.recent_limit);
        let resolution =
            api::probe(&self.chain, session.token(), &candidates, &kind.shape()).await;
        if let Resolution::Found { candidate, .. } = &resolution {
            self.discovered_lock().insert(kind, candidate.url.clone());
        }
        resolution
    }

    /// Category labels for `kind` from the backend, or from the local store when no candidate
    /// answers with a usable list.
    pub async fn remote_categories(
        &self,
        session: &Session,
        store: &CategoryStore,
        kind: Kind,
    ) -> Vec<String> {
        let remote = self
            .probe(session, ProbeKind::Categories)
            .await
            .into_payload()
            .map(|payload| category_labels(&payload, kind))
            .unwrap_or_default();
        if !remote.is_empty() {
            return remote;
        }
        debug!("Using local categories for {kind}");
        match store.list(kind).await {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Unable to read local categories: {e:#}");
                crate::categories::defaults(kind)
            }
        }
    }

    /// The balance as reported by the first endpoint that reports one.
    pub async fn fetch_balance(&self, session: &Session) -> Option<Decimal> {
        self.probe(session, ProbeKind::Balance)
            .await
            .payload()
            .and_then(signed_decimal)
    }

    /// Recent transactions from the first endpoint that lists any.
    pub async fn recent_transactions(&self, session: &Session) -> Vec<Transaction> {
        match self.probe(session, ProbeKind::RecentTransactions).await {
            Resolution::Found { payload, .. } => payload
                .as_array()
                .map(|items| {
                    let mut recent = parse_records(items, None).transactions;
                    recent.truncate(self.recent_limit);
                    recent
                })
                .unwrap_or_default(),
            Resolution::NotFound { .. } => Vec::new(),
        }
    }

    /// The winning URL per probe kind, as of the last successful probe. Informational only;
    /// probing never skips candidates because of it.
    pub fn discovered(&self) -> BTreeMap<ProbeKind, String> {
        self.discovered_lock().clone()
    }

    fn discovered_lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ProbeKind, String>> {
        self.discovered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads never fall back to the alternate transports.
    async fn read(&self, url: &str, token: &str) -> std::result::Result<Value, SyncError> {
        let request = HttpRequest::get(url).bearer(Some(token));
        let response = self.chain.send_primary(&request).await?;
        interpret(response)
    }

    async fn write(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Value,
    ) -> std::result::Result<Value, SyncError> {
        let request = HttpRequest::with_body(method, url, body).bearer(Some(token));
        let response = self.chain.send(&request).await?;
        interpret(response)
    }
}

/// The required fields for `kind` that are absent (or, for the amount, unparseable).
fn missing_fields(kind: Kind, draft: &TransactionDraft) -> Vec<&'static str> {
    let present = |field: &Option<String>| field.as_ref().is_some_and(|s| !s.trim().is_empty());
    let mut missing = Vec::new();
    if draft.amount().is_none() {
        missing.push("valor");
    }
    match kind {
        Kind::Expense | Kind::Income => {
            if !present(&draft.data) {
                missing.push("data");
            }
            if !draft.has_category() {
                missing.push("categoria");
            }
        }
        Kind::Salary => {
            if !present(&draft.data_recebimento) {
                missing.push("data_recebimento");
            }
        }
    }
    missing
}

/// Turns a response into a JSON body or a `SyncError`. Success requires a 2xx with a non-empty
/// JSON body that does not say `success: false`.
fn interpret(response: HttpResponse) -> std::result::Result<Value, SyncError> {
    let json = response.json();
    if !response.is_success() {
        let message = json
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| format!("The server responded with status {}", response.status));
        return Err(SyncError::Server {
            status: response.status,
            message,
            body: response.body,
        });
    }
    match json {
        None | Some(Value::Null) => Err(SyncError::ShapeMismatch {
            status: response.status,
            expected: "a JSON body",
            body: response.body,
        }),
        Some(value) if value.get("success") == Some(&Value::Bool(false)) => {
            Err(SyncError::Server {
                status: response.status,
                message: server_message(&value)
                    .unwrap_or_else(|| "The server reported a failure".to_string()),
                body: response.body,
            })
        }
        Some(value) => Ok(value),
    }
}

/// The human-readable message in a backend body, from `message`, `detail` or `error`.
fn server_message(body: &Value) -> Option<String> {
    ["message", "detail", "error"]
        .iter()
        .filter_map(|k| body.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        })
}

fn transaction_array(body: &Value) -> Option<&Vec<Value>> {
    body.as_array()
        .or_else(|| body.get("transacoes").and_then(Value::as_array))
        .or_else(|| {
            body.get("data")
                .and_then(|d| d.get("transacoes"))
                .and_then(Value::as_array)
        })
}

/// Category labels out of a probe payload: plain strings, or objects with a `nome`. Objects that
/// carry a `tipo` for another kind are left out.
fn category_labels(payload: &Value, kind: Kind) -> Vec<String> {
    payload
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => {
                        let other_kind = obj
                            .get("tipo")
                            .and_then(Value::as_str)
                            .and_then(Kind::from_wire)
                            .is_some_and(|k| k != kind);
                        if other_kind {
                            return None;
                        }
                        obj.get("nome")
                            .or_else(|| obj.get("name"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    }
                    _ => None,
                })
                .filter(|s| !s.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn build_report(body: &Value, query: &ReportQuery) -> Report {
    let report = body
        .get("relatorio")
        .or_else(|| body.get("data"))
        .filter(|v| v.is_object())
        .unwrap_or(body);

    let periodo = report
        .get("periodo")
        .and_then(|p| p.as_str().or_else(|| p.get("tipo").and_then(Value::as_str)))
        .and_then(|p| p.parse::<Period>().ok())
        .or(query.periodo)
        .unwrap_or_default();

    let parsed = report
        .get("transacoes")
        .and_then(Value::as_array)
        .map(|items| parse_records(items, query.tipo))
        .unwrap_or_default();
    let transactions = parsed.transactions;

    let (folded_expenses, folded_income) = aggregate::fold(&transactions);
    let total_despesas = report
        .get("total_despesas")
        .and_then(Amount::from_json)
        .unwrap_or(folded_expenses);
    let total_ganhos = report
        .get("total_ganhos")
        .and_then(Amount::from_json)
        .unwrap_or(folded_income);

    let reported_totals: BTreeMap<String, Amount> = report
        .get("total_por_categorias")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| Amount::from_json(v).map(|a| (k.clone(), a)))
                .collect()
        })
        .unwrap_or_default();
    let total_por_categorias = if reported_totals.is_empty() {
        aggregate::category_totals(&transactions, None)
    } else {
        reported_totals
    };

    let categoria_mais_gasta = report
        .get("categoria_mais_gasta")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| aggregate::most_spent(&transactions));

    Report {
        success: true,
        periodo,
        message: None,
        saldo_periodo: total_ganhos.value() - total_despesas.value(),
        transacoes: transactions,
        total_despesas,
        total_ganhos,
        total_por_categorias,
        categoria_mais_gasta,
        skipped: parsed.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Reply, TestTransport, Transport};
    use crate::cache::MemoryCache;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Arc;

    const BASE: &str = "http://backend";

    fn gateway(transports: Vec<Arc<TestTransport>>) -> Gateway {
        let chain = TransportChain::new(
            transports
                .into_iter()
                .map(|t| t as Arc<dyn Transport>)
                .collect(),
        );
        Gateway::new(&Config::in_memory(BASE), chain)
    }

    fn session() -> Session {
        Session::new("tok", None)
    }

    fn expense() -> TransactionDraft {
        serde_json::from_value(json!({
            "valor": "100",
            "data": "2024-03-01",
            "categoria": "Lazer"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_amount_sends_nothing() {
        let t = Arc::new(TestTransport::new("t"));
        let g = gateway(vec![t.clone()]);
        let draft: TransactionDraft =
            serde_json::from_value(json!({"data": "2024-03-01", "categoria": "1"})).unwrap();
        let err = g.create_expense(&session(), &draft).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::Validation {
                fields: vec!["valor"]
            }
        );
        assert_eq!(t.call_count(), 0);
    }

    #[tokio::test]
    async fn test_salary_required_fields() {
        let t = Arc::new(TestTransport::new("t"));
        let g = gateway(vec![t.clone()]);
        let err = g
            .create_salary(&session(), &TransactionDraft::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Validation {
                fields: vec!["valor", "data_recebimento"]
            }
        );
        assert_eq!(t.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_sends_nothing() {
        let t = Arc::new(TestTransport::new("t"));
        let g = gateway(vec![t.clone()]);
        let err = g
            .create_income(&Session::anonymous(), &expense())
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::AuthMissing);
        assert_eq!(t.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_success_posts_normalized_body() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Post,
            "/api/transacoes/despesa/",
            Reply::Status(201, json!({"success": true, "despesa_id": "d1"})),
        );
        let g = gateway(vec![t.clone()]);
        let created = g.create_expense(&session(), &expense()).await.unwrap();
        assert_eq!(created.identifier.as_deref(), Some("d1"));

        let call = &t.calls()[0];
        assert_eq!(call.url, "http://backend/api/transacoes/despesa/");
        assert_eq!(call.header("Authorization"), Some("Bearer tok"));
        let body = call.body.as_ref().unwrap();
        assert!(body["valor"].is_number());
        assert_eq!(body["tipo"], "despesa");
    }

    #[tokio::test]
    async fn test_create_without_identifier_is_success() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Post, "/", Reply::Status(200, json!({"success": true})));
        let g = gateway(vec![t]);
        let created = g.create_expense(&session(), &expense()).await.unwrap();
        assert!(created.identifier.is_none());
    }

    #[tokio::test]
    async fn test_create_empty_body_is_shape_mismatch() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Post, "/", Reply::Raw(201, String::new()));
        let g = gateway(vec![t]);
        let err = g.create_expense(&session(), &expense()).await.unwrap_err();
        assert!(matches!(err, SyncError::ShapeMismatch { status: 201, .. }));
        let report = MutationReport::from(&Err(err));
        assert!(!report.success);
        assert_eq!(report.error_details.unwrap().status, Some(201));
    }

    #[tokio::test]
    async fn test_create_server_error_message() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Post,
            "/",
            Reply::Status(400, json!({"detail": "Valor inválido"})),
        );
        let g = gateway(vec![t]);
        let err = g.create_expense(&session(), &expense()).await.unwrap_err();
        match err {
            SyncError::Server {
                status, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Valor inválido");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_false_is_server_error() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Post,
            "/",
            Reply::Status(200, json!({"success": false, "message": "Token inválido"})),
        );
        let g = gateway(vec![t]);
        let err = g.create_expense(&session(), &expense()).await.unwrap_err();
        assert_eq!(err.to_string(), "Server responded with status 200: Token inválido");
    }

    #[tokio::test]
    async fn test_create_retries_on_alternate_after_network_error() {
        let primary = Arc::new(TestTransport::new("primary"));
        primary.on(Method::Post, "/", Reply::Network("tls handshake".into()));
        let alternate = Arc::new(TestTransport::new("alternate"));
        alternate.on(
            Method::Post,
            "/",
            Reply::Status(201, json!({"success": true, "id": 42})),
        );
        let g = gateway(vec![primary.clone(), alternate.clone()]);
        let created = g.create_expense(&session(), &expense()).await.unwrap();
        assert_eq!(created.identifier.as_deref(), Some("42"));
        assert_eq!(primary.call_count(), 1);
        assert_eq!(alternate.call_count(), 1);
    }

    #[tokio::test]
    async fn test_create_server_error_is_not_retried() {
        let primary = Arc::new(TestTransport::new("primary"));
        primary.on(Method::Post, "/", Reply::Status(500, json!({"error": "boom"})));
        let alternate = Arc::new(TestTransport::new("alternate"));
        let g = gateway(vec![primary, alternate.clone()]);
        assert!(g.create_expense(&session(), &expense()).await.is_err());
        assert_eq!(alternate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reads_do_not_use_alternate() {
        let primary = Arc::new(TestTransport::new("primary"));
        primary.on(Method::Get, "/", Reply::Network("connection reset".into()));
        let alternate = Arc::new(TestTransport::new("alternate"));
        alternate.on(
            Method::Get,
            "/",
            Reply::Status(200, json!({"success": true, "transacoes": []})),
        );
        let g = gateway(vec![primary.clone(), alternate.clone()]);
        assert!(!g.list_transactions(&session(), None, None).await.success);
        assert!(g.fetch_summary(&session()).await.is_err());
        assert_eq!(primary.call_count(), 2);
        assert_eq!(alternate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_list_failure_is_empty_and_well_formed() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Get, "/", Reply::Network("offline".into()));
        let g = gateway(vec![t]);
        let list = g.list_transactions(&session(), None, None).await;
        assert!(!list.success);
        assert!(list.transacoes.is_empty());

        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["transacoes"], json!([]));
    }

    #[tokio::test]
    async fn test_list_parses_and_skips() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Get,
            "/api/transacoes/listar/?tipo=despesa&limite=10",
            Reply::Status(
                200,
                json!({
                    "success": true,
                    "transacoes": [
                        {"id": "1", "valor": 10, "categoria": "Lazer"},
                        {"id": "2", "valor": "abc"}
                    ],
                    "total_despesas": 10
                }),
            ),
        );
        let g = gateway(vec![t]);
        let list = g
            .list_transactions(&session(), Some(Kind::Expense), Some(10))
            .await;
        assert!(list.success);
        assert_eq!(list.transacoes.len(), 1);
        assert_eq!(list.transacoes[0].kind, Kind::Expense);
        assert_eq!(list.skipped, 1);
        assert_eq!(list.total_despesas.unwrap().value(), Decimal::from(10));
    }

    #[tokio::test]
    async fn test_list_nested_data() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Get,
            "/listar/",
            Reply::Status(
                200,
                json!({"data": {"transacoes": [{"tipo": "ganho", "valor": 5}]}}),
            ),
        );
        let g = gateway(vec![t]);
        let list = g.list_transactions(&session(), None, None).await;
        assert_eq!(list.transacoes.len(), 1);
    }

    #[tokio::test]
    async fn test_update_falls_back_to_patch_with_raw_fields() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Put, "/", Reply::Status(405, json!({"detail": "Method not allowed"})))
            .on(Method::Patch, "/", Reply::Status(200, json!({"success": true})));
        let g = gateway(vec![t.clone()]);
        let fields = json!({"valor": "R$ 20,00"});
        let updated = g
            .update_transaction(&session(), Kind::Income, "g1", fields.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(updated.identifier.as_deref(), Some("g1"));

        let calls = t.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, Method::Put);
        assert_eq!(calls[0].body.as_ref().unwrap()["valor"].as_f64(), Some(20.0));
        assert_eq!(calls[1].method, Method::Patch);
        assert_eq!(calls[1].url, "http://backend/api/transacoes/ganho/g1/");
        assert_eq!(calls[1].body.as_ref().unwrap()["valor"], "R$ 20,00");
    }

    #[tokio::test]
    async fn test_update_both_fail() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Put, "/", Reply::Network("x".into()))
            .on(Method::Patch, "/", Reply::Status(404, json!({})));
        let g = gateway(vec![t]);
        let fields = json!({"descricao": "y"});
        let err = g
            .update_transaction(&session(), Kind::Expense, "d1", fields.as_object().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_report_computes_missing_figures() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Get,
            "/relatorio/",
            Reply::Status(
                200,
                json!({"success": true, "relatorio": {
                    "periodo": "semanal",
                    "transacoes": [
                        {"tipo": "despesa", "valor": 30, "categoria": "Lazer"},
                        {"tipo": "despesa", "valor": 70, "categoria": "Moradia"},
                        {"tipo": "despesa", "valor": 10, "categoria": "Lazer"},
                        {"tipo": "ganho", "valor": 500, "categoria": "Vendas"}
                    ]
                }}),
            ),
        );
        let g = gateway(vec![t]);
        let report = g.report(&session(), &ReportQuery::default()).await;
        assert!(report.success);
        assert_eq!(report.periodo, Period::Weekly);
        assert_eq!(report.total_despesas.value(), Decimal::from(110));
        assert_eq!(report.total_ganhos.value(), Decimal::from(500));
        assert_eq!(report.saldo_periodo, Decimal::from(390));
        assert_eq!(report.categoria_mais_gasta.as_deref(), Some("Moradia"));
        assert_eq!(
            report.total_por_categorias["Lazer"].value(),
            Decimal::from(40)
        );
    }

    #[tokio::test]
    async fn test_report_failure_is_empty() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Get, "/", Reply::Status(400, json!({"message": "Período inválido"})));
        let g = gateway(vec![t]);
        let query = ReportQuery {
            periodo: Some(Period::Yearly),
            ..ReportQuery::default()
        };
        let report = g.report(&session(), &query).await;
        assert!(!report.success);
        assert_eq!(report.periodo, Period::Yearly);
        assert!(report.transacoes.is_empty());
    }

    #[tokio::test]
    async fn test_remote_categories_fall_back_to_store() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Get, "/categorias/", Reply::Status(404, json!({})));
        let g = gateway(vec![t.clone()]);
        let store = CategoryStore::new(Arc::new(MemoryCache::new()));
        let labels = g
            .remote_categories(&session(), &store, Kind::Income)
            .await;
        assert_eq!(labels, crate::categories::defaults(Kind::Income));
        assert!(g.discovered().is_empty());
    }

    #[tokio::test]
    async fn test_remote_categories_from_backend() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(
            Method::Get,
            "/categorias/?user_id=u1",
            Reply::Status(
                200,
                json!([
                    {"nome": "Pets", "tipo": "despesa"},
                    {"nome": "Bolsa", "tipo": "ganho"},
                    "Viagem"
                ]),
            ),
        );
        let g = gateway(vec![t.clone()]);
        let user: crate::session::AuthUser = serde_json::from_value(json!({"id": "u1"})).unwrap();
        let s = Session::new("tok", Some(user));
        let store = CategoryStore::new(Arc::new(MemoryCache::new()));
        let labels = g.remote_categories(&s, &store, Kind::Expense).await;
        assert_eq!(labels, vec!["Pets".to_string(), "Viagem".to_string()]);
        assert_eq!(t.call_count(), 1);
        assert_eq!(
            g.discovered().get(&ProbeKind::Categories).map(String::as_str),
            Some("http://backend/api/categorias/?user_id=u1")
        );
    }

    #[tokio::test]
    async fn test_fetch_balance_probes_in_order() {
        let t = Arc::new(TestTransport::new("t"));
        t.on(Method::Get, "/resumo/", Reply::Status(500, json!({})))
            .on(Method::Get, "/perfil/", Reply::Status(200, json!({"user": {"saldo": "-12,50"}})));
        let g = gateway(vec![t.clone()]);
        let balance = g.fetch_balance(&session()).await;
        assert_eq!(balance, Some(Decimal::from_str("-12.50").unwrap()));
        assert_eq!(t.call_count(), 2);
    }

    #[tokio::test]
    async fn test_recent_transactions_bounded() {
        let t = Arc::new(TestTransport::new("t"));
        let many: Vec<Value> = (1..=8)
            .map(|i| json!({"tipo": "despesa", "valor": i}))
            .collect();
        t.on(Method::Get, "/listar/", Reply::Status(200, json!({"transacoes": many})));
        let g = gateway(vec![t]);
        assert_eq!(g.recent_transactions(&session()).await.len(), 5);
    }
}
