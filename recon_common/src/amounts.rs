//! Serde helpers for monetary amounts held in loosely-typed documents.
//!
//! Receipt documents are written by several producers; some store amounts as JSON numbers, others as strings. These
//! helpers accept either. Anything that isn't a finite number is treated as "not set" rather than a hard error, so that
//! one bad field doesn't make the whole document unreadable.
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a decimal from a plain or scientific-notation string.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)).ok()
}

/// Lenient conversion from an arbitrary JSON value.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Deserialize an optional decimal from a JSON number, a numeric string, or null. Unparseable values become `None`.
pub fn deserialize_lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value))
}

/// Deserialize an optional epoch-millisecond timestamp from a number or numeric string.
pub fn deserialize_lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let millis = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    Ok(millis)
}
