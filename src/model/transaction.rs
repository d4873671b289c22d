use crate::model::{Amount, Kind, Period};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The canonical, backend-agnostic transaction record.
///
/// The amount is always a positive magnitude; `kind` says which way the money went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    /// Assigned by the backend. Absent for records the backend listed without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: Kind,
    pub amount: Amount,
    /// Either a label or a legacy numeric category id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The date the transaction happened, as the backend sent it (usually `YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<String>,
    /// Only present for salary records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<SalaryTerms>,
}

/// Payment terms that only apply to salary records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SalaryTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    pub recurring: bool,
    pub period: Period,
}

impl Default for SalaryTerms {
    fn default() -> Self {
        Self {
            received_at: None,
            recurring: true,
            period: Period::default(),
        }
    }
}

/// Why a backend record could not be turned into a `Transaction`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("The record is not a JSON object")]
    NotAnObject,
    #[error("The record has no recognizable kind")]
    UnknownKind,
    #[error("The record has no parseable amount")]
    BadAmount,
}

const ID_FIELDS: [&str; 3] = ["id", "_id", "transacao_id"];
const KIND_FIELDS: [&str; 3] = ["tipo", "type", "kind"];
const AMOUNT_FIELDS: [&str; 3] = ["valor", "value", "amount"];
const CATEGORY_FIELDS: [&str; 4] = ["categoria", "categoria_nome", "categoria_id", "category"];
const DESCRIPTION_FIELDS: [&str; 2] = ["descricao", "description"];
const DATE_FIELDS: [&str; 3] = ["data", "date", "data_criacao"];

impl Transaction {
    /// Parses one backend record. The record's own kind field wins over `kind_hint`; the hint is
    /// used for endpoints that only ever return one kind and leave the field out.
    pub fn from_wire(value: &Value, kind_hint: Option<Kind>) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let kind = match first(obj, &KIND_FIELDS) {
            Some(Value::String(s)) => Kind::from_wire(s).ok_or(RecordError::UnknownKind)?,
            Some(_) => return Err(RecordError::UnknownKind),
            None => kind_hint.ok_or(RecordError::UnknownKind)?,
        };

        let amount = first(obj, &AMOUNT_FIELDS)
            .and_then(Amount::from_json)
            .ok_or(RecordError::BadAmount)?;

        let id = first(obj, &ID_FIELDS)
            .or_else(|| obj.get(kind.id_field()))
            .and_then(scalar_text);

        let salary = (kind == Kind::Salary).then(|| SalaryTerms {
            received_at: obj.get("data_recebimento").and_then(scalar_text),
            recurring: obj
                .get("recorrente")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            period: obj
                .get("periodo")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        });

        Ok(Self {
            id,
            kind,
            amount,
            category: first(obj, &CATEGORY_FIELDS).and_then(category_text),
            description: first(obj, &DESCRIPTION_FIELDS).and_then(scalar_text),
            occurred_at: first(obj, &DATE_FIELDS).and_then(scalar_text),
            salary,
        })
    }

    /// The date used for ordering: the occurrence date, or for salaries the payment date.
    pub fn date(&self) -> Option<&str> {
        self.occurred_at.as_deref().or_else(|| {
            self.salary
                .as_ref()
                .and_then(|s| s.received_at.as_deref())
        })
    }
}

/// The outcome of parsing a list of backend records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedRecords {
    pub transactions: Vec<Transaction>,
    /// Records that were dropped because they had no usable kind or amount.
    pub skipped: usize,
}

/// Parses every record, skipping (and counting) the ones that cannot be understood.
pub fn parse_records(values: &[Value], kind_hint: Option<Kind>) -> ParsedRecords {
    let mut parsed = ParsedRecords::default();
    for (ix, value) in values.iter().enumerate() {
        match Transaction::from_wire(value, kind_hint) {
            Ok(t) => parsed.transactions.push(t),
            Err(e) => {
                tracing::debug!("Skipping record {ix}: {e}");
                parsed.skipped += 1;
            }
        }
    }
    parsed
}

fn first<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

/// Strings and numbers as text. Blank strings count as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Categories sometimes arrive as `{ "id": .., "nome": .. }`.
fn category_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => obj
            .get("nome")
            .or_else(|| obj.get("name"))
            .or_else(|| obj.get("id"))
            .and_then(scalar_text),
        other => scalar_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_from_wire_portuguese_fields() {
        let value = json!({
            "id": "abc",
            "tipo": "despesa",
            "valor": 100.5,
            "categoria": "Alimentação",
            "descricao": "Almoço",
            "data": "2024-03-01"
        });
        let t = Transaction::from_wire(&value, None).unwrap();
        assert_eq!(t.id.as_deref(), Some("abc"));
        assert_eq!(t.kind, Kind::Expense);
        assert_eq!(t.amount.value(), Decimal::new(1005, 1));
        assert_eq!(t.category.as_deref(), Some("Alimentação"));
        assert_eq!(t.date(), Some("2024-03-01"));
        assert!(t.salary.is_none());
    }

    #[test]
    fn test_from_wire_english_fields_and_string_amount() {
        let value = json!({
            "_id": 7,
            "type": "income",
            "amount": "R$ 1.234,50",
            "category": 3,
            "description": "Freela",
            "date": "2024-03-02"
        });
        let t = Transaction::from_wire(&value, None).unwrap();
        assert_eq!(t.id.as_deref(), Some("7"));
        assert_eq!(t.kind, Kind::Income);
        assert_eq!(t.amount.value(), Decimal::new(123450, 2));
        assert_eq!(t.category.as_deref(), Some("3"));
    }

    #[test]
    fn test_kind_hint_and_kind_specific_id() {
        let value = json!({
            "salario_id": "s1",
            "valor": -3000,
            "data_recebimento": "2024-01-05",
            "periodo": "quinzenal",
            "recorrente": false
        });
        let t = Transaction::from_wire(&value, Some(Kind::Salary)).unwrap();
        assert_eq!(t.id.as_deref(), Some("s1"));
        assert_eq!(t.amount.value(), Decimal::new(3000, 0));
        let terms = t.salary.as_ref().unwrap();
        assert_eq!(terms.period, Period::Biweekly);
        assert!(!terms.recurring);
        assert_eq!(t.date(), Some("2024-01-05"));
    }

    #[test]
    fn test_record_kind_wins_over_hint() {
        let value = json!({"tipo": "ganho", "valor": 1});
        let t = Transaction::from_wire(&value, Some(Kind::Expense)).unwrap();
        assert_eq!(t.kind, Kind::Income);
    }

    #[test]
    fn test_from_wire_rejections() {
        assert_eq!(
            Transaction::from_wire(&json!([1]), None),
            Err(RecordError::NotAnObject)
        );
        assert_eq!(
            Transaction::from_wire(&json!({"valor": 1}), None),
            Err(RecordError::UnknownKind)
        );
        assert_eq!(
            Transaction::from_wire(&json!({"tipo": "transfer", "valor": 1}), None),
            Err(RecordError::UnknownKind)
        );
        assert_eq!(
            Transaction::from_wire(&json!({"tipo": "despesa", "valor": "abc"}), None),
            Err(RecordError::BadAmount)
        );
    }

    #[test]
    fn test_category_object() {
        let value = json!({"tipo": "despesa", "valor": 1, "categoria": {"id": 2, "nome": "Lazer"}});
        let t = Transaction::from_wire(&value, None).unwrap();
        assert_eq!(t.category.as_deref(), Some("Lazer"));
    }

    #[test]
    fn test_parse_records_counts_skips() {
        let values = vec![
            json!({"tipo": "despesa", "valor": 10}),
            json!({"tipo": "despesa", "valor": null}),
            json!("junk"),
            json!({"tipo": "salario", "valor": "20"}),
        ];
        let parsed = parse_records(&values, None);
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.skipped, 2);
    }
}
