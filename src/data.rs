use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A coerced cell value produced by the somatometria field mapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::String(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Length of the numeric prefix of `text`: an optional sign, digits and, when
/// `fraction` is set, a `.digits` part and an exponent. Zero when no digit leads.
fn numeric_prefix_len(text: &str, fraction: bool) -> usize {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let whole = digits_from(end);
    end += whole;
    let mut any_digit = whole > 0;
    if fraction {
        if bytes.get(end) == Some(&b'.') {
            let part = digits_from(end + 1);
            if part > 0 {
                end += 1 + part;
                any_digit = true;
            }
        }
        if any_digit && matches!(bytes.get(end), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
            let exponent = digits_from(end + 1 + sign);
            if exponent > 0 {
                end += 1 + sign + exponent;
            }
        }
    }
    if any_digit { end } else { 0 }
}

/// Parses the leading measurement of a cell, ignoring any trailing unit.
///
/// The first `,` is read as the decimal separator, so `"72,5 kg"` is 72.5.
pub fn parse_measurement(raw: &str) -> Option<f64> {
    let text = raw.trim().replacen(',', ".", 1);
    let len = numeric_prefix_len(&text, true);
    if len == 0 {
        return None;
    }
    text[..len].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses the leading integer of a cell: `"20 años"` is 20, `"80.0"` is 80.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let text = raw.trim();
    let len = numeric_prefix_len(text, false);
    if len == 0 {
        return None;
    }
    text[..len].parse::<i64>().ok()
}

pub fn non_empty_text(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// One generic row: normalized column names paired with raw cell values.
///
/// Serializes as a JSON object whose key order follows the column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowData {
    fields: Vec<(String, String)>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            fields: pairs.into_iter().collect(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for RowData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct RowDataVisitor;

impl<'de> Visitor<'de> for RowDataVisitor {
    type Value = RowData;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object of column names to string values")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            fields.push((key, value));
        }
        Ok(RowData { fields })
    }
}

impl<'de> Deserialize<'de> for RowData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RowDataVisitor)
    }
}
