//! URL construction and endpoint probing.
//!
//! The backend has moved its routes around more than once, so a few logical reads are described as
//! an ordered list of candidate URLs plus the shape a good answer must have. `probe` walks the list
//! and returns the first candidate that answers with that shape.

use crate::api::{HttpRequest, TransportChain};
use crate::model::{Amount, Kind, ReportQuery};
use crate::utils::join_url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

const API: &str = "/api";

/// Builds every URL the crate uses from the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// `POST` target for a new transaction of `kind`.
    pub fn create(&self, kind: Kind) -> String {
        self.url(&format!("{API}/transacoes/{}/", kind.wire_name()), &[])
    }

    pub fn list(&self, kind: Option<Kind>, limit: Option<usize>) -> String {
        let mut params = Vec::new();
        if let Some(kind) = kind {
            params.push(("tipo", kind.wire_name().to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limite", limit.to_string()));
        }
        self.url(&format!("{API}/transacoes/listar/"), &params)
    }

    pub fn summary(&self) -> String {
        self.url(&format!("{API}/transacoes/resumo/"), &[])
    }

    pub fn report(&self, query: &ReportQuery) -> String {
        self.url(&format!("{API}/transacoes/relatorio/"), &query.params())
    }

    /// `PUT` and `PATCH` target for an existing transaction.
    pub fn update(&self, kind: Kind, id: &str) -> String {
        let id: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        self.url(&format!("{API}/transacoes/{}/{id}/", kind.wire_name()), &[])
    }

    /// The ordered candidates for `kind`. Candidates that need a user id are left out when there
    /// is none.
    pub fn candidates(
        &self,
        kind: ProbeKind,
        user_id: Option<&str>,
        limit: usize,
    ) -> Vec<Candidate> {
        let user = |name: &'static str| user_id.map(|u| vec![(name, u.to_string())]);
        let categories = format!("{API}/categorias/");
        let mut out = Vec::new();
        match kind {
            ProbeKind::Categories => {
                if let Some(params) = user("user_id") {
                    out.push(Candidate::protected(self.url(&categories, &params)));
                }
                if let Some(params) = user("userId") {
                    out.push(Candidate::protected(self.url(&categories, &params)));
                }
                out.push(Candidate::protected(self.url(&categories, &[])));
                out.push(Candidate::public(self.url(&categories, &[])));
            }
            ProbeKind::Balance => {
                out.push(Candidate::protected(self.summary()));
                if let Some(params) = user("user_id") {
                    out.push(Candidate::protected(
                        self.url(&format!("{API}/health/"), &params),
                    ));
                }
                out.push(Candidate::protected(
                    self.url(&format!("{API}/users/perfil/"), &[]),
                ));
            }
            ProbeKind::RecentTransactions => {
                out.push(Candidate::protected(self.list(None, Some(limit))));
                if let Some(params) = user("user_id") {
                    out.push(Candidate::protected(
                        self.url(&format!("{API}/despesas/"), &params),
                    ));
                    out.push(Candidate::protected(
                        self.url(&format!("{API}/receitas/"), &params),
                    ));
                }
            }
            ProbeKind::Health => {
                out.push(Candidate::public(self.url(&format!("{API}/health/"), &[])));
                out.push(Candidate::public(self.url("/health/", &[])));
                out.push(Candidate::protected(self.url(&format!("{API}/"), &[])));
            }
        }
        out
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        let url = join_url(&self.base, path);
        if params.is_empty() {
            return url;
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        format!("{url}?{query}")
    }
}

/// The logical reads that are resolved by probing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Categories,
    Balance,
    RecentTransactions,
    Health,
}

serde_plain::derive_display_from_serialize!(ProbeKind);

impl ProbeKind {
    /// What a good answer looks like for this kind.
    pub fn shape(self) -> Shape {
        match self {
            ProbeKind::Categories => Shape::NonEmptyArray(&["", "categorias", "data"]),
            ProbeKind::Balance => Shape::Number(&["saldo", "balance", "user.saldo"]),
            ProbeKind::RecentTransactions => {
                Shape::NonEmptyArray(&["", "transacoes", "data.transacoes"])
            }
            ProbeKind::Health => Shape::Object,
        }
    }
}

/// One URL to try. Public candidates are sent without the auth header.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub public: bool,
}

impl Candidate {
    pub fn protected(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public: false,
        }
    }

    pub fn public(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public: true,
        }
    }
}

/// The structure a successful probe response must have. Paths are dotted; the empty path is the
/// document root.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Shape {
    /// A non-empty array at the first of these paths that has one.
    NonEmptyArray(&'static [&'static str]),
    /// A number, or a string that parses as one, at the first of these paths that has one.
    Number(&'static [&'static str]),
    /// Any JSON object.
    Object,
}

impl Shape {
    /// Returns the part of `body` that satisfies the shape, or `None`.
    pub fn extract(&self, body: &Value) -> Option<Value> {
        match self {
            Shape::NonEmptyArray(paths) => paths
                .iter()
                .filter_map(|p| at_path(body, p))
                .find(|v| v.as_array().is_some_and(|a| !a.is_empty()))
                .cloned(),
            Shape::Number(paths) => paths
                .iter()
                .filter_map(|p| at_path(body, p))
                .find(|v| is_numeric(v))
                .cloned(),
            Shape::Object => body.is_object().then(|| body.clone()),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::NonEmptyArray(_) => "a non-empty array",
            Shape::Number(_) => "a number",
            Shape::Object => "a JSON object",
        }
    }
}

fn at_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }
    path.split('.').try_fold(body, |v, segment| v.get(segment))
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(_) => Amount::from_json(value).is_some(),
        _ => false,
    }
}

/// The outcome of probing a candidate list.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found {
        candidate: Candidate,
        payload: Value,
        attempts: usize,
    },
    NotFound {
        attempts: usize,
    },
}

impl Resolution {
    pub fn attempts(&self) -> usize {
        match self {
            Resolution::Found { attempts, .. } | Resolution::NotFound { attempts } => *attempts,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Resolution::Found { payload, .. } => Some(payload),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn into_payload(self) -> Option<Value> {
        match self {
            Resolution::Found { payload, .. } => Some(payload),
            Resolution::NotFound { .. } => None,
        }
    }
}

/// GETs each candidate in order and stops at the first 2xx whose body has `shape`. Network errors,
/// error statuses and wrong shapes are all logged and treated the same: move on. Only the chain's
/// primary transport is used. Never fails.
pub async fn probe(
    chain: &TransportChain,
    token: Option<&str>,
    candidates: &[Candidate],
    shape: &Shape,
) -> Resolution {
    let mut attempts = 0;
    for candidate in candidates {
        attempts += 1;
        let auth = if candidate.public { None } else { token };
        let request = HttpRequest::get(&candidate.url).bearer(auth);
        trace!(
            "Probe {attempts}: {} ({})",
            candidate.url,
            if candidate.public { "public" } else { "protected" }
        );

        let response = match chain.send_primary(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Probe of {} failed: {e}", candidate.url);
                continue;
            }
        };
        if !response.is_success() {
            debug!("Probe of {} answered {}", candidate.url, response.status);
            continue;
        }
        match response.json().as_ref().and_then(|body| shape.extract(body)) {
            Some(payload) => {
                debug!("Probe of {} succeeded", candidate.url);
                return Resolution::Found {
                    candidate: candidate.clone(),
                    payload,
                    attempts,
                };
            }
            None => debug!(
                "Probe of {} answered {} without {}",
                candidate.url,
                response.status,
                shape.describe()
            ),
        }
    }
    warn!("No candidate out of {attempts} answered as expected");
    Resolution::NotFound { attempts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, Reply, TestTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn endpoints() -> Endpoints {
        Endpoints::new("http://backend/")
    }

    #[test]
    fn test_urls() {
        let e = endpoints();
        assert_eq!(e.create(Kind::Salary), "http://backend/api/transacoes/salario/");
        assert_eq!(
            e.list(Some(Kind::Income), Some(5)),
            "http://backend/api/transacoes/listar/?tipo=ganho&limite=5"
        );
        assert_eq!(e.list(None, None), "http://backend/api/transacoes/listar/");
        assert_eq!(
            e.update(Kind::Expense, "a b"),
            "http://backend/api/transacoes/despesa/a+b/"
        );
        let q = ReportQuery {
            data_inicio: Some("2024-01-01".into()),
            ..ReportQuery::default()
        };
        assert_eq!(
            e.report(&q),
            "http://backend/api/transacoes/relatorio/?data_inicio=2024-01-01"
        );
    }

    #[test]
    fn test_category_candidates() {
        let with_user = endpoints().candidates(ProbeKind::Categories, Some("u1"), 5);
        let urls: Vec<&str> = with_user.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://backend/api/categorias/?user_id=u1",
                "http://backend/api/categorias/?userId=u1",
                "http://backend/api/categorias/",
                "http://backend/api/categorias/",
            ]
        );
        assert!(with_user[3].public);
        assert!(!with_user[2].public);

        let anonymous = endpoints().candidates(ProbeKind::Categories, None, 5);
        assert_eq!(anonymous.len(), 2);
    }

    #[test]
    fn test_health_candidates_public_first() {
        let c = endpoints().candidates(ProbeKind::Health, None, 5);
        assert!(c[0].public && c[1].public);
        assert!(!c[2].public);
    }

    #[test]
    fn test_shapes() {
        let balance = ProbeKind::Balance.shape();
        assert_eq!(balance.extract(&json!({"saldo": 10})), Some(json!(10)));
        assert_eq!(
            balance.extract(&json!({"user": {"saldo": "12,5"}})),
            Some(json!("12,5"))
        );
        assert_eq!(balance.extract(&json!({"saldo": "n/a"})), None);

        let recent = ProbeKind::RecentTransactions.shape();
        assert_eq!(
            recent.extract(&json!({"data": {"transacoes": [1]}})),
            Some(json!([1]))
        );
        assert_eq!(recent.extract(&json!({"transacoes": []})), None);
        assert_eq!(recent.extract(&json!([2])), Some(json!([2])));

        assert!(ProbeKind::Health.shape().extract(&json!([])).is_none());
    }

    #[tokio::test]
    async fn test_probe_stops_at_second_candidate() {
        let transport = Arc::new(TestTransport::new("t"));
        transport
            .on(Method::Get, "/one", Reply::Status(200, json!([])))
            .on(Method::Get, "/two", Reply::Status(200, json!(["Lazer"])))
            .on(Method::Get, "/three", Reply::Status(200, json!(["Outras"])));
        let chain = TransportChain::single(transport.clone());

        let candidates = vec![
            Candidate::protected("http://x/one"),
            Candidate::protected("http://x/two"),
            Candidate::protected("http://x/three"),
        ];
        let shape = ProbeKind::Categories.shape();
        let resolution = probe(&chain, Some("tok"), &candidates, &shape).await;

        assert_eq!(resolution.attempts(), 2);
        assert_eq!(transport.call_count(), 2);
        match resolution {
            Resolution::Found {
                candidate, payload, ..
            } => {
                assert_eq!(candidate.url, "http://x/two");
                assert_eq!(payload, json!(["Lazer"]));
            }
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_never_fails() {
        let transport = Arc::new(TestTransport::new("t"));
        transport
            .on(Method::Get, "/net", Reply::Network("refused".into()))
            .on(Method::Get, "/500", Reply::Status(500, json!({"error": "x"})))
            .on(Method::Get, "/html", Reply::Raw(200, "<html>".into()));
        let chain = TransportChain::single(transport.clone());
        let candidates = vec![
            Candidate::protected("http://x/net"),
            Candidate::protected("http://x/500"),
            Candidate::protected("http://x/html"),
        ];
        let resolution = probe(&chain, None, &candidates, &Shape::Object).await;
        assert_eq!(resolution, Resolution::NotFound { attempts: 3 });
    }

    #[tokio::test]
    async fn test_candidates_use_primary_only() {
        let primary = Arc::new(TestTransport::new("primary"));
        primary.on(Method::Get, "/", Reply::Network("timed out".into()));
        let alternate = Arc::new(TestTransport::new("alternate"));
        alternate.on(Method::Get, "/", Reply::Network("timed out".into()));
        let chain = TransportChain::new(vec![
            primary.clone() as Arc<dyn crate::api::Transport>,
            alternate.clone() as Arc<dyn crate::api::Transport>,
        ]);
        let candidates = vec![
            Candidate::protected("http://x/a"),
            Candidate::protected("http://x/b"),
            Candidate::public("http://x/c"),
        ];
        let resolution = probe(&chain, Some("tok"), &candidates, &Shape::Object).await;

        assert_eq!(resolution, Resolution::NotFound { attempts: 3 });
        assert_eq!(primary.call_count(), 3);
        assert_eq!(alternate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_public_candidates_omit_auth() {
        let transport = Arc::new(TestTransport::new("t"));
        transport.on(Method::Get, "/", Reply::Status(404, json!({})));
        let chain = TransportChain::single(transport.clone());
        let candidates = vec![
            Candidate::public("http://x/a"),
            Candidate::protected("http://x/b"),
        ];
        probe(&chain, Some("tok"), &candidates, &Shape::Object).await;

        let calls = transport.calls();
        assert!(!calls[0].has_auth());
        assert!(calls[1].has_auth());
    }
}
