//! Maps caller records to the wire format the backend expects, and pulls identifiers back out of
//! backend responses.
//!
//! Everything here is pure and total. Missing optional fields are defaulted, never rejected;
//! required-field validation happens in the gateway.

use crate::model::{Amount, Kind, Period};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The category sent when the caller did not pick one.
pub const DEFAULT_CATEGORY: &str = "1";

/// A transaction as the caller describes it, before normalization. Field names follow the
/// backend's vocabulary so that a draft can be deserialized straight from a form or a CLI.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    /// A number or a string such as `"50"` or `"R$ 1.234,56"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valor: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_recebimento: Option<String>,
    /// A label or a numeric category id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categoria: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorrente: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodo: Option<String>,
    /// Anything else is passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionDraft {
    pub fn new(valor: impl Into<Value>) -> Self {
        Self {
            valor: Some(valor.into()),
            ..Self::default()
        }
    }

    /// The amount, if one was given and it parses.
    pub fn amount(&self) -> Option<Amount> {
        self.valor.as_ref().and_then(Amount::from_json)
    }

    pub(crate) fn has_category(&self) -> bool {
        self.categoria.as_ref().is_some_and(is_present)
    }
}

/// Builds the wire record for `kind`, using today's local date where a date is defaulted.
pub fn to_wire(kind: Kind, draft: &TransactionDraft) -> Map<String, Value> {
    to_wire_at(kind, draft, chrono::Local::now().date_naive())
}

/// Builds the wire record for `kind` with an explicit "today".
pub fn to_wire_at(kind: Kind, draft: &TransactionDraft, today: NaiveDate) -> Map<String, Value> {
    let mut wire = draft.extra.clone();

    if let Some(amount) = draft.amount() {
        wire.insert("valor".into(), amount.to_json());
    }

    let categoria = draft
        .categoria
        .as_ref()
        .filter(|v| is_present(v))
        .map(category_value)
        .unwrap_or_else(|| Value::from(DEFAULT_CATEGORY));
    wire.insert("categoria".into(), categoria);

    wire.insert(
        "descricao".into(),
        Value::from(draft.descricao.clone().unwrap_or_default()),
    );

    let data = draft
        .data
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    wire.insert("data".into(), Value::from(data));
    wire.insert("tipo".into(), Value::from(kind.wire_name()));

    if kind == Kind::Salary {
        if let Some(received) = &draft.data_recebimento {
            wire.insert("data_recebimento".into(), Value::from(received.clone()));
        }
        wire.insert(
            "recorrente".into(),
            Value::from(draft.recorrente.unwrap_or(true)),
        );
        wire.insert("periodo".into(), period_value(draft.periodo.as_deref()));
    } else {
        if let Some(received) = &draft.data_recebimento {
            wire.insert("data_recebimento".into(), Value::from(received.clone()));
        }
        if let Some(recurring) = draft.recorrente {
            wire.insert("recorrente".into(), Value::from(recurring));
        }
        if draft.periodo.is_some() {
            wire.insert("periodo".into(), period_value(draft.periodo.as_deref()));
        }
    }

    wire
}

/// Coerces update fields to wire types without filling in any defaults.
pub fn normalize_update(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| {
            let coerced = match key.as_str() {
                "valor" => Amount::from_json(value)
                    .map(Amount::to_json)
                    .unwrap_or_else(|| value.clone()),
                "categoria" => category_value(value),
                "periodo" => period_value(value.as_str()),
                "tipo" => value
                    .as_str()
                    .and_then(Kind::from_wire)
                    .map(|k| Value::from(k.wire_name()))
                    .unwrap_or_else(|| value.clone()),
                _ => value.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

/// Pulls the identifier of a newly created record out of a response, checking `id`, then
/// `<kind>_id`, then `data.id`. `None` means the write probably happened but the backend did not
/// say under which id.
pub fn extract_id(kind: Kind, response: &Value) -> Option<String> {
    response
        .get("id")
        .and_then(id_text)
        .or_else(|| response.get(kind.id_field()).and_then(id_text))
        .or_else(|| {
            response
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(id_text)
        })
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// The backend stores categories as strings, including numeric ids.
fn category_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::from(n.to_string()),
        other => other.clone(),
    }
}

/// Known periods are sent with their wire name, unknown ones as given, missing ones as monthly.
fn period_value(period: Option<&str>) -> Value {
    match period {
        None => Value::from(Period::default().to_string()),
        Some(raw) => match raw.parse::<Period>() {
            Ok(p) => Value::from(p.to_string()),
            Err(_) => Value::from(raw),
        },
    }
}
