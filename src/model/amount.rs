//! Amount type for handling monetary values as a positive magnitude.
//!
//! The backend and older clients send amounts as JSON numbers, as plain strings, and as
//! formatted Brazilian-real strings such as `R$ 1.234,56`. `Amount` accepts all of them and
//! always holds the absolute value: the transaction `Kind` carries the direction.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

const CURRENCY: &str = "R$";

/// A monetary magnitude.
///
/// # Examples
///
/// Parsing a formatted real amount:
/// ```
/// # use viccoin_sync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("R$ 1.234,56").unwrap();
/// assert_eq!(amount.to_string(), "R$ 1.234,56");
/// ```
///
/// The sign is dropped:
/// ```
/// # use viccoin_sync::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("-50").unwrap();
/// let b = Amount::from_str("50.00").unwrap();
/// assert_eq!(a.value(), b.value());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Creates an `Amount` from any decimal, keeping only its magnitude.
    pub fn new(value: Decimal) -> Self {
        Self(value.abs())
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Reads an amount out of a JSON value, which may be a number or a string. Anything else,
    /// including non-finite numbers, is `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Amount::new(Decimal::from(i)))
                } else {
                    n.as_f64().and_then(Decimal::from_f64).map(Amount::new)
                }
            }
            serde_json::Value::String(s) => Amount::from_str(s).ok(),
            _ => None,
        }
    }

    /// The amount as a JSON number.
    pub fn to_json(self) -> serde_json::Value {
        self.0
            .to_f64()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// An error that can occur when parsing strings into `Amount` values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("An empty string is not an amount")]
    Empty,
    #[error("'{input}' is not an amount: {message}")]
    Invalid { input: String, message: String },
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unsigned = trimmed.trim_start_matches(['-', '+']).trim();
        let digits = unsigned.strip_prefix(CURRENCY).unwrap_or(unsigned).trim();

        if digits.is_empty() {
            return Err(AmountError::Empty);
        }

        // Whichever separator comes last is the decimal separator; the other one groups
        // thousands. A lone comma is a decimal comma.
        let normalized = match (digits.rfind(','), digits.rfind('.')) {
            (Some(comma), Some(dot)) if comma > dot => digits.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => digits.replace(',', ""),
            (Some(_), None) => digits.replace(',', "."),
            _ => digits.to_string(),
        };

        let value = Decimal::from_str(&normalized).map_err(|e| AmountError::Invalid {
            input: s.to_string(),
            message: e.to_string(),
        })?;
        Ok(Amount::new(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&format_brl(self.0))
    }
}

/// Brazilian formatting of any decimal, e.g. `R$ 1.234,56` or `-R$ 10,00`.
pub fn format_brl(value: Decimal) -> String {
    let us = format_num::format_num!(",.2", value.abs().to_f64().unwrap_or_default());
    let br: String = us
        .chars()
        .map(|c| match c {
            ',' => '.',
            '.' => ',',
            other => other,
        })
        .collect();
    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{CURRENCY} {br}")
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Amount::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is not an amount")))
    }
}

/// Reads a signed decimal, such as a balance, from a JSON number or string.
pub(crate) fn signed_decimal(value: &serde_json::Value) -> Option<Decimal> {
    let magnitude = Amount::from_json(value)?.value();
    let negative = match value {
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f < 0.0),
        serde_json::Value::String(s) => s.trim_start().starts_with('-'),
        _ => false,
    };
    Some(if negative { -magnitude } else { magnitude })
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
