//! Lenient deserializers for alert payloads
//!
//! Charting tools template their JSON by string substitution, so numbers
//! often arrive quoted (`"qty": "0.1"`) and unset optionals arrive as `""`
//! or `0`. These helpers accept both shapes.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

fn value_to_decimal<E: de::Error>(value: &Value) -> Result<Option<Decimal>, E> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Some)
            .map_err(E::custom),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Decimal::from_str(s.trim()).map(Some).map_err(E::custom),
        other => Err(E::custom(format!("expected a number, got {}", other))),
    }
}

/// Deserializes a required `Decimal` from a number or numeric string.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_decimal::<D::Error>(&value)?.ok_or_else(|| de::Error::custom("missing number"))
}

/// Deserializes an `Option<Decimal>`.
///
/// `null`, `""` and zero all mean "not set".
pub fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_decimal::<D::Error>(&value)?.filter(|d| !d.is_zero()))
}

/// Deserializes an `Option<u32>` from a number or numeric string.
///
/// `null`, `""` and zero all mean "not set".
pub fn deserialize_optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match value {
        Value::Null => None,
        Value::Number(n) => Some(
            n.as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| de::Error::custom(format!("expected a positive integer, got {}", n)))?,
        ),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(u32::from_str(s.trim()).map_err(de::Error::custom)?),
        other => {
            return Err(de::Error::custom(format!(
                "expected an integer, got {}",
                other
            )))
        }
    };
    Ok(parsed.filter(|v| *v != 0))
}

/// Deserializes a boolean from `true`/`false`, `"true"`/`"false"`, or `1`/`0`.
pub fn deserialize_flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_i64().map(|v| v != 0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean: {}", other))),
        },
        other => Err(de::Error::custom(format!("expected a boolean, got {}", other))),
    }
}
