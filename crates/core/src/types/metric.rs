//! Loosely-typed numeric metrics.
//!
//! The ad platform reports insight metrics as decimal strings (`"12.34"`),
//! file imports carry numbers, strings with thousands separators or blanks.
//! [`MetricValue`] keeps the raw JSON value and converts on demand. Anything
//! that does not parse as a number counts as zero, so aggregation never
//! propagates a non-numeric value.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw metric value as received from a source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricValue(Value);

impl MetricValue {
    /// Wrap a raw JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON value.
    #[must_use]
    pub const fn raw(&self) -> &Value {
        &self.0
    }

    /// Whether the source supplied any value at all.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.0.is_null()
    }

    /// Whether the source left the value out.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.0.is_null()
    }

    /// The value as a decimal, or zero when absent or unparsable.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        parse_decimal(&self.0).unwrap_or(Decimal::ZERO)
    }

    /// The value as a non-negative whole count (impressions, clicks).
    ///
    /// Fractions are truncated; negative or unparsable values count as zero.
    #[must_use]
    pub fn to_count(&self) -> u64 {
        self.to_decimal().trunc().to_u64().unwrap_or(0)
    }
}

impl From<Decimal> for MetricValue {
    fn from(value: Decimal) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        Self(Value::from(value))
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<Value> for MetricValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Parse a JSON number or numeric string into a decimal.
///
/// Strings may carry surrounding whitespace and `,` thousands separators.
#[must_use]
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .ok()
        }
        _ => None,
    }
}
