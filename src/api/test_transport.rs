//! Implements the `Transport` trait in memory.
//!
//! Note: this is compiled even in the "production" version of this app so that the whole binary
//! can be run, top-to-bottom, without a live backend (see `Mode::Testing`).

use crate::api::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use crate::model::{Amount, Kind};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// A scripted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// An HTTP response with a JSON body.
    Status(u16, Value),
    /// An HTTP response with a raw body, e.g. an empty one or HTML.
    Raw(u16, String),
    /// A failure below HTTP.
    Network(String),
}

#[derive(Debug)]
struct Rule {
    method: Method,
    fragment: String,
    replies: VecDeque<Reply>,
}

/// A `Transport` that answers from scripted rules and records every request it sees.
///
/// A rule matches on the method and on a substring of the full URL. The first matching rule wins,
/// so register specific fragments before general ones. Each rule hands out its replies in order
/// and keeps repeating the last one. Requests that match no rule go to the fake backend when there
/// is one, and fail with a network error otherwise.
#[derive(Debug)]
pub struct TestTransport {
    name: String,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<HttpRequest>>,
    backend: Option<Mutex<FakeBackend>>,
}

impl TestTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            backend: None,
        }
    }

    /// A transport backed by an in-memory imitation of the VicCoin backend, seeded with a few
    /// transactions.
    pub fn with_fake_backend() -> Self {
        Self {
            backend: Some(Mutex::new(FakeBackend::seeded())),
            ..Self::new("fake-backend")
        }
    }

    /// Adds `reply` to the rule for `method` and `fragment`, creating the rule if needed.
    pub fn on(&self, method: Method, fragment: impl Into<String>, reply: Reply) -> &Self {
        let fragment = fragment.into();
        let mut rules = lock(&self.rules);
        match rules
            .iter_mut()
            .find(|r| r.method == method && r.fragment == fragment)
        {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(Rule {
                method,
                fragment,
                replies: VecDeque::from([reply]),
            }),
        }
        self
    }

    /// Every request sent so far, in order.
    pub fn calls(&self) -> Vec<HttpRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn scripted(&self, request: &HttpRequest) -> Option<Reply> {
        let mut rules = lock(&self.rules);
        let rule = rules
            .iter_mut()
            .find(|r| r.method == request.method && request.url.contains(&r.fragment))?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }
}

#[async_trait::async_trait]
impl Transport for TestTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        lock(&self.calls).push(request.clone());

        let reply = match self.scripted(request) {
            Some(reply) => reply,
            None => match &self.backend {
                Some(backend) => return Ok(lock(backend).handle(request)),
                None => Reply::Network(format!("No rule for {} {}", request.method, request.url)),
            },
        };

        match reply {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body.to_string())),
            Reply::Raw(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Network(message) => Err(TransportError::Failed(message)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Just enough of the backend to run the binary against: create, list, update, summary, report
/// and health. Categories are not served, so callers fall back to their local set.
#[derive(Debug, Default)]
struct FakeBackend {
    records: Vec<Map<String, Value>>,
}

impl FakeBackend {
    fn seeded() -> Self {
        let seed = [
            json!({"tipo": "despesa", "valor": 120.5, "categoria": "Supermercado",
                   "descricao": "Compras da semana", "data": "2024-01-10"}),
            json!({"tipo": "ganho", "valor": 800, "categoria": "Freelance",
                   "descricao": "Site institucional", "data": "2024-01-12"}),
            json!({"tipo": "salario", "valor": 3500, "categoria": "Mensal", "descricao": "",
                   "data": "2024-01-05", "data_recebimento": "2024-01-05",
                   "recorrente": true, "periodo": "mensal"}),
        ];
        let mut backend = Self::default();
        for value in seed {
            if let Value::Object(record) = value {
                backend.insert(record);
            }
        }
        backend
    }

    fn insert(&mut self, mut record: Map<String, Value>) -> String {
        let id = Uuid::new_v4().to_string();
        record.insert("id".into(), Value::from(id.clone()));
        self.records.push(record);
        id
    }

    fn handle(&mut self, request: &HttpRequest) -> HttpResponse {
        let Ok(url) = url::Url::parse(&request.url) else {
            return respond(400, json!({"success": false, "message": "Bad URL"}));
        };
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();

        if matches!(segments.as_slice(), ["api", "health"] | ["health"]) {
            return respond(200, json!({"status": "ok"}));
        }
        if segments.first() != Some(&"api") || segments.get(1) != Some(&"transacoes") {
            return respond(404, json!({"detail": "Not found."}));
        }
        if !request.has_auth() {
            return respond(
                401,
                json!({"success": false, "message": "Usuário não autenticado"}),
            );
        }

        match (request.method, &segments[2..]) {
            (Method::Get, ["listar"]) => {
                let kind = param("tipo").and_then(|t| Kind::from_wire(&t));
                let limit = param("limite").and_then(|l| l.parse().ok());
                let items = self.filtered(kind, limit);
                let (despesas, ganhos) = totals(&items);
                respond(
                    200,
                    json!({"success": true, "transacoes": items,
                           "total_despesas": despesas, "total_ganhos": ganhos}),
                )
            }
            (Method::Get, ["resumo"]) => {
                let items = self.filtered(None, None);
                let (despesas, ganhos) = totals(&items);
                let recent: Vec<&Map<String, Value>> = items.iter().rev().take(5).collect();
                respond(
                    200,
                    json!({"success": true, "saldo": ganhos - despesas,
                           "total_despesas": despesas, "total_ganhos": ganhos,
                           "transacoes_recentes": recent}),
                )
            }
            (Method::Get, ["relatorio"]) => {
                let kind = param("tipo").and_then(|t| Kind::from_wire(&t));
                let limit = param("limite").and_then(|l| l.parse().ok());
                let items = self.filtered(kind, limit);
                let (despesas, ganhos) = totals(&items);
                respond(
                    200,
                    json!({"success": true, "relatorio": {
                        "periodo": param("periodo").unwrap_or_else(|| "mensal".to_string()),
                        "transacoes": items,
                        "total_despesas": despesas,
                        "total_ganhos": ganhos,
                        "saldo_periodo": ganhos - despesas,
                    }}),
                )
            }
            (Method::Post, [kind]) => match (Kind::from_wire(kind), &request.body) {
                (Some(kind), Some(Value::Object(body))) => {
                    let mut record = body.clone();
                    record.insert("tipo".into(), Value::from(kind.wire_name()));
                    let id = self.insert(record);
                    let mut response = Map::new();
                    response.insert("success".into(), Value::from(true));
                    response.insert("message".into(), Value::from("Transação registrada"));
                    response.insert(kind.id_field().into(), Value::from(id));
                    respond(201, Value::Object(response))
                }
                _ => respond(400, json!({"success": false, "message": "Dados inválidos"})),
            },
            (Method::Put | Method::Patch, [_, id]) => {
                let Some(record) = self
                    .records
                    .iter_mut()
                    .find(|r| r.get("id").and_then(Value::as_str) == Some(*id))
                else {
                    return respond(
                        404,
                        json!({"success": false, "message": "Transação não encontrada"}),
                    );
                };
                if let Some(Value::Object(fields)) = &request.body {
                    for (k, v) in fields {
                        if k != "id" {
                            record.insert(k.clone(), v.clone());
                        }
                    }
                }
                respond(200, json!({"success": true, "message": "Transação atualizada"}))
            }
            _ => respond(404, json!({"detail": "Not found."})),
        }
    }

    fn filtered(&self, kind: Option<Kind>, limit: Option<usize>) -> Vec<Map<String, Value>> {
        self.records
            .iter()
            .filter(|r| match kind {
                None => true,
                Some(k) => r.get("tipo").and_then(Value::as_str) == Some(k.wire_name()),
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Expense and inflow totals as JSON-friendly floats.
fn totals(records: &[Map<String, Value>]) -> (f64, f64) {
    let mut despesas = Decimal::ZERO;
    let mut ganhos = Decimal::ZERO;
    for record in records {
        let Some(amount) = record.get("valor").and_then(Amount::from_json) else {
            continue;
        };
        let total = match record.get("tipo").and_then(Value::as_str).and_then(Kind::from_wire) {
            Some(Kind::Expense) => &mut despesas,
            Some(_) => &mut ganhos,
            None => continue,
        };
        if let Some(sum) = total.checked_add(amount.value()) {
            *total = sum;
        }
    }
    (
        despesas.to_f64().unwrap_or_default(),
        ganhos.to_f64().unwrap_or_default(),
    )
}

fn respond(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}
