//! Input record model for the field-transformation engine.
//!
//! - [`Scalar`] - a single cell value (text, integer or float)
//! - [`Row`] - one input record, an ordered name → optional value map
//!
//! Absence is modelled with `Option<Scalar>`: a cell that is missing or null
//! is `None`, which is never confused with the text `"null"`.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Scalar
// =============================================================================

/// A single non-null cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Free text, as read from a delimited file.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
}

impl Scalar {
    /// Build a scalar from a JSON value. `null`, arrays and objects have no
    /// scalar form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Integer(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            Value::Bool(b) => Some(Scalar::Text(b.to_string())),
            _ => None,
        }
    }

    /// Convert back to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(format_number(*f))),
        }
    }

    /// Numeric view of the value. Text is trimmed before parsing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => parse_number(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(v) => f.write_str(&format_number(*v)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

/// Parse a decimal number, tolerating surrounding whitespace.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Render a double the way loader control files expect it: integral values
/// keep one decimal place (`60.0`), others use the shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

// =============================================================================
// Row
// =============================================================================

/// One input record.
///
/// Fields keep their insertion order, which decides the winner when two keys
/// differ only by case. Exact-name lookups go through a hash index first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Option<Scalar>)>,
    index: HashMap<String, usize>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<Scalar>) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&pos) => self.fields[pos].1 = value,
            None => {
                self.index.insert(name.clone(), self.fields.len());
                self.fields.push((name, value));
            }
        }
    }

    /// Builder-style insert of a present value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, Some(value.into()));
        self
    }

    /// Builder-style insert of a null value.
    pub fn with_null(mut self, name: impl Into<String>) -> Self {
        self.insert(name, None);
        self
    }

    /// Look a field up by name: exact match first, then case-insensitive in
    /// insertion order. Returns `None` when the field is absent or null.
    pub fn lookup(&self, name: &str) -> Option<&Scalar> {
        if let Some(&pos) = self.index.get(name) {
            return self.fields[pos].1.as_ref();
        }
        let lowered = name.to_lowercase();
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name) || key.to_lowercase() == lowered)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Whether a field with this name exists (case-insensitive), null or not.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
            || self.fields.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Scalar>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Build a row from a JSON object. Returns `None` for non-objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut row = Row::new();
        for (key, val) in obj {
            row.insert(key.clone(), Scalar::from_json(val));
        }
        Some(row)
    }

    /// Convert to a JSON object; absent values become `null`.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.as_ref().map(Scalar::to_json).unwrap_or(Value::Null)))
            .collect();
        Value::Object(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Scalar>)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Option<Scalar>)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, &value.as_ref().map(Scalar::to_json))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Row::from_json(&value).ok_or_else(|| de::Error::custom("a row must be a JSON object"))
    }
}
