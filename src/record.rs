//! Procurement line-items as returned by the items endpoint.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// API field holding the unit of measure.
pub const UNIT_FIELD: &str = "unidadeMedida";
/// API field holding the awarded unit price.
pub const PRICE_FIELD: &str = "valorUnitarioResultado";

/// One procurement line-item.
///
/// `attributes` holds every field exactly as the API sent it and is what the
/// records table writes back out. The unit of measure and the awarded unit
/// price are read from it once, leniently, for grouping and statistics: a
/// field of an unexpected type leaves the typed view empty instead of
/// rejecting the item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Record {
    unit_of_measure: Option<String>,
    result_unit_price: Option<f64>,
    pub attributes: Map<String, Value>,
}

impl From<Map<String, Value>> for Record {
    fn from(attributes: Map<String, Value>) -> Self {
        Self {
            unit_of_measure: attributes.get(UNIT_FIELD).and_then(coerce_text),
            result_unit_price: attributes.get(PRICE_FIELD).and_then(coerce_f64),
            attributes,
        }
    }
}

impl Record {
    pub fn unit(&self) -> Option<&str> {
        self.unit_of_measure.as_deref()
    }

    pub fn price(&self) -> Option<f64> {
        self.result_unit_price
    }

    /// Returns the value of `field` as the API sent it.
    pub fn field(&self, field: &str) -> Option<Value> {
        self.attributes.get(field).cloned()
    }

    /// Field names in the order they appear on this record.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

/// Reads a JSON value as a label. Strings are taken as-is and numbers are
/// rendered as text; anything else has no label.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a JSON value as a finite number. Numeric strings count, anything
/// else (null, text, objects) is treated as absent.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Reads a JSON value as an integer, accepting floats and numeric strings.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_i64))
}
