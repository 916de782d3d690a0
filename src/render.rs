//! Turns records into rows of display text.
//!
//! The renderer knows nothing about the terminal. It produces a `TableBody`
//! (rows of cell strings, or a single placeholder row) and the header cells
//! with their hidden and sort markers; `ui` draws those.

use std::sync::Arc;

use serde_json::Value;

use crate::notation::NotationConverter;
use crate::prefs::ColumnVisibility;
use crate::record::{Record, number_text, scalar_text};
use crate::schema::TableSchema;
use crate::sort::{SortIndicator, SortState};

pub const NO_RESULTS: &str = "No results found";
pub const LOADING: &str = "Loading data...";
pub const NULL_CELL: &str = "-";
pub const BINARY_VECTOR_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRow {
    Cells(Vec<String>),
    /// One cell across `span` columns.
    Placeholder { span: usize, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableBody {
    rows: Vec<BodyRow>,
}

impl TableBody {
    pub fn placeholder(span: usize, message: impl Into<String>) -> Self {
        Self {
            rows: vec![BodyRow::Placeholder {
                span: span.max(1),
                message: message.into(),
            }],
        }
    }

    pub fn rows(&self) -> &[BodyRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Placeholder message, when the body is a single placeholder row.
    pub fn placeholder_message(&self) -> Option<&str> {
        match self.rows.as_slice() {
            [BodyRow::Placeholder { message, .. }] => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub column: String,
    pub sortable: bool,
    pub hidden: bool,
    pub indicator: Option<SortIndicator>,
}

impl HeaderCell {
    pub fn new(column: impl Into<String>, sortable: bool) -> Self {
        Self {
            column: column.into(),
            sortable,
            hidden: false,
            indicator: None,
        }
    }
}

/// Twelve elements, each the number 0 or 1.
pub fn is_binary_vector(value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            items.len() == BINARY_VECTOR_LEN
                && items
                    .iter()
                    .all(|v| v.as_f64().is_some_and(|n| n == 0.0 || n == 1.0))
        }
        _ => false,
    }
}

#[derive(Clone)]
pub struct TableRenderer {
    converter: Arc<dyn NotationConverter>,
}

impl TableRenderer {
    pub fn new(converter: Arc<dyn NotationConverter>) -> Self {
        Self { converter }
    }

    /// Display text of one cell. First matching rule wins.
    pub fn format_cell(&self, value: Option<&Value>, notation: &str) -> String {
        let Some(value) = value else {
            return NULL_CELL.to_string();
        };
        if let Value::Array(items) = value
            && is_binary_vector(value)
        {
            return items
                .iter()
                .filter_map(Value::as_number)
                .map(number_text)
                .collect::<Vec<_>>()
                .join(" ");
        }
        match value {
            Value::Null => NULL_CELL.to_string(),
            Value::Array(items) if items.first().is_some_and(Value::is_number) => {
                self.converter.convert(items, notation)
            }
            Value::Array(_) | Value::Object(_) => value.to_string(),
            scalar => scalar_text(scalar),
        }
    }

    /// Body for `rows`, one cell per visible schema column in schema order.
    pub fn render(
        &self,
        rows: &[Record],
        schema: &TableSchema,
        visibility: &ColumnVisibility,
        notation: &str,
    ) -> TableBody {
        let columns: Vec<&str> = schema.names().filter(|c| !visibility.is_hidden(c)).collect();
        if rows.is_empty() {
            return TableBody::placeholder(columns.len(), NO_RESULTS);
        }
        let rows = rows
            .iter()
            .map(|row| {
                BodyRow::Cells(
                    columns
                        .iter()
                        .map(|c| self.format_cell(row.get(*c), notation))
                        .collect(),
                )
            })
            .collect();
        TableBody { rows }
    }

    pub fn headers(schema: &TableSchema) -> Vec<HeaderCell> {
        schema
            .columns()
            .iter()
            .map(|c| HeaderCell::new(c.name.clone(), c.sortable))
            .collect()
    }

    /// Hidden markers for every header, a sort indicator on the sorted one.
    pub fn refresh_headers(headers: &mut [HeaderCell], visibility: &ColumnVisibility, sort: &SortState) {
        for header in headers.iter_mut() {
            header.hidden = visibility.is_hidden(&header.column);
            header.indicator = if header.sortable {
                sort.indicator_for(&header.column)
            } else {
                None
            };
        }
    }
}
