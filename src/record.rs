//! Row shapes flowing through the fetch pipeline.
//!
//! Records are dynamically shaped: every cell is a `serde_json::Value`, and the
//! crate enables `preserve_order` so a record keeps the key order it was
//! delivered with.

use std::fmt;
use std::str::FromStr;

use derive_setters::Setters;
use indexmap::IndexMap;
use serde_json::Value;

pub type Record = serde_json::Map<String, Value>;
pub type Table = Vec<Record>;

/// Filter value meaning "no constraint" besides null and the empty string.
pub const ALL_SENTINEL: &str = "all";

pub fn is_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == ALL_SENTINEL,
        _ => false,
    }
}

/// Plain textual form of a value, the way a cell shows a scalar.
///
/// Integral floats print without a fraction so `1.0` and `1` look the same.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

pub fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Column → constraint. Sentinel constraints are kept but never applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec(IndexMap<String, Value>);

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) {
        self.0.shift_remove(column);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constraints that actually restrict the result.
    pub fn active(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter(|(_, v)| !is_sentinel(v))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub ascending: bool,
}

impl OrderSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "asc" } else { "desc" };
        write!(f, "{}.{}", self.column, direction)
    }
}

/// Parses `column`, `column:asc` or `column:desc`.
impl FromStr for OrderSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, direction) = match s.rsplit_once(':') {
            Some((c, d)) => (c.trim(), d.trim().to_ascii_lowercase()),
            None => (s.trim(), "asc".to_string()),
        };
        if column.is_empty() {
            return Err(format!("missing column in order '{s}'"));
        }
        match direction.as_str() {
            "asc" => Ok(Self::asc(column)),
            "desc" => Ok(Self::desc(column)),
            other => Err(format!("unknown order direction '{other}'")),
        }
    }
}

/// Search for an integer inside a sequence valued column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    pub column: String,
    pub value: String,
}

impl SearchSpec {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// A search without a column or without a value does not take the search path.
    pub fn is_active(&self) -> bool {
        !self.column.is_empty() && !self.value.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Setters)]
#[setters(strip_option)]
pub struct FetchOptions {
    pub search: Option<SearchSpec>,
    pub filters: FilterSpec,
    pub order_by: Option<OrderSpec>,
}

impl FetchOptions {
    pub fn active_search(&self) -> Option<&SearchSpec> {
        self.search.as_ref().filter(|s| s.is_active())
    }
}
