//! Column schema, declared once per table.
//!
//! The schema fixes which columns a table view shows and in which order. It is
//! either declared up front or inferred from the first record a table ever
//! delivers, after which it no longer changes.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::trace;

use crate::record::{Record, scalar_text};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Boolean,
    Sequence,
    Structured,
    #[default]
    Unknown,
}

impl ColumnKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ColumnKind::Unknown,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Number(_) => ColumnKind::Number,
            Value::String(_) => ColumnKind::Text,
            Value::Array(_) => ColumnKind::Sequence,
            Value::Object(_) => ColumnKind::Structured,
        }
    }

    /// Typed equality between a cell and a filter constraint.
    ///
    /// Constraints usually arrive as text from an input field, so they are
    /// parsed into the column's kind before comparing. A null cell never
    /// matches.
    pub fn matches(self, cell: &Value, wanted: &Value) -> bool {
        if cell.is_null() {
            return false;
        }
        match self {
            ColumnKind::Unknown => ColumnKind::of(cell).matches(cell, wanted),
            ColumnKind::Number => match (as_number(cell), as_number(wanted)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            ColumnKind::Text => match (cell, wanted) {
                (Value::Array(_) | Value::Object(_), _) => false,
                (_, Value::Null | Value::Array(_) | Value::Object(_)) => false,
                _ => scalar_text(cell) == scalar_text(wanted),
            },
            ColumnKind::Boolean => match (as_bool(cell), as_bool(wanted)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            ColumnKind::Sequence | ColumnKind::Structured => match wanted {
                Value::String(s) => serde_json::from_str::<Value>(s)
                    .map(|parsed| &parsed == cell)
                    .unwrap_or(false),
                other => other == cell,
            },
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text",
            ColumnKind::Number => "number",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Sequence => "sequence",
            ColumnKind::Structured => "structured",
            ColumnKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for ColumnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(ColumnKind::Text),
            "number" | "int" | "integer" | "float" => Ok(ColumnKind::Number),
            "bool" | "boolean" => Ok(ColumnKind::Boolean),
            "sequence" | "array" | "list" => Ok(ColumnKind::Sequence),
            "structured" | "object" | "json" => Ok(ColumnKind::Structured),
            "" | "unknown" => Ok(ColumnKind::Unknown),
            other => Err(format!("unknown column kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub sortable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sortable: true,
        }
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }
}

/// Parses `name` or `name:kind`. A trailing `!` marks the column unsortable.
impl FromStr for ColumnDef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (definition, sortable) = match s.trim().strip_suffix('!') {
            Some(rest) => (rest, false),
            None => (s, true),
        };
        let (name, kind) = match definition.split_once(':') {
            Some((n, k)) => (n.trim(), k.parse::<ColumnKind>()?),
            None => (definition.trim(), ColumnKind::Unknown),
        };
        if name.is_empty() {
            return Err(format!("missing column name in '{s}'"));
        }
        let column = ColumnDef::new(name, kind);
        Ok(if sortable { column } else { column.unsortable() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn declare(columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        let mut schema = Self::default();
        for column in columns {
            if schema.get(&column.name).is_none() {
                schema.columns.push(column);
            }
        }
        schema
    }

    /// Schema in the key order of `record`.
    pub fn infer(record: &Record) -> Self {
        let schema = Self::declare(
            record
                .iter()
                .map(|(name, value)| ColumnDef::new(name.clone(), ColumnKind::of(value))),
        );
        trace!("Inferred schema with {} columns", schema.len());
        schema
    }

    /// Fills in kinds still unknown from the first non-null value found in `rows`.
    pub fn refine(&mut self, rows: &[Record]) {
        for column in self.columns.iter_mut() {
            if column.kind != ColumnKind::Unknown {
                continue;
            }
            if let Some(value) = rows
                .iter()
                .filter_map(|r| r.get(&column.name))
                .find(|v| !v.is_null())
            {
                column.kind = ColumnKind::of(value);
                trace!("Column {} refined to {}", column.name, column.kind);
            }
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn kind_of(&self, name: &str) -> ColumnKind {
        self.get(name).map(|c| c.kind).unwrap_or(ColumnKind::Unknown)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
