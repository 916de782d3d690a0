//! Row stores the gateway can query.
//!
//! A store answers a select-all with optional equality filters and one order
//! column. `RestStore` talks to a PostgREST style HTTP endpoint,
//! `MemoryStore` keeps tables in memory and is what fixtures and tests use.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, trace};

use crate::domain::{ExplorerError, FetchError};
use crate::record::{OrderSpec, Record, Table, scalar_text};
use crate::schema::ColumnKind;
use crate::sort::natural_cmp;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub filters: Vec<(String, Value)>,
    pub order: Option<OrderSpec>,
}

impl SelectQuery {
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push((column.into(), value));
        self
    }

    pub fn order(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Table, FetchError>;

    fn name(&self) -> &str;
}

pub struct RestStore {
    base_url: String,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let key_value = HeaderValue::from_str(key)
                .map_err(|e| FetchError::new(format!("invalid api key: {e}")))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| FetchError::new(format!("invalid api key: {e}")))?;
            headers.insert("apikey", key_value);
            headers.insert(AUTHORIZATION, bearer);
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::new(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Query string pairs in PostgREST syntax.
    pub fn query_params(query: &SelectQuery) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for (column, value) in query.filters.iter() {
            let literal = match value {
                Value::Array(_) | Value::Object(_) => value.to_string(),
                other => scalar_text(other),
            };
            params.push((column.clone(), format!("eq.{literal}")));
        }
        if let Some(order) = &query.order {
            params.push(("order".to_string(), order.to_string()));
        }
        params
    }
}

#[async_trait]
impl RowStore for RestStore {
    async fn select(&self, query: &SelectQuery) -> Result<Table, FetchError> {
        let url = self.table_url(&query.table);
        let params = Self::query_params(query);
        debug!("GET {url} {params:?}");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::new(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::new(e.to_string()))?;

        if !status.is_success() {
            return Err(serde_json::from_str::<FetchError>(&body).unwrap_or_else(|_| {
                FetchError::new(format!("{status}: {body}")).with_code(status.as_str())
            }));
        }

        let rows: Table = serde_json::from_str(&body)
            .map_err(|e| FetchError::new(format!("malformed response: {e}")))?;
        trace!("Received {} rows from {}", rows.len(), query.table);
        Ok(rows)
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    name: String,
    tables: HashMap<String, Table>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: Table) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }

    /// Loads `{"table": [records...], ...}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ExplorerError> {
        let content = fs::read_to_string(path)?;
        let tables: HashMap<String, Table> = serde_json::from_str(&content)
            .map_err(|e| ExplorerError::LoadingFailed(format!("{}: {e}", path.display())))?;
        debug!("Loaded {} tables from {}", tables.len(), path.display());
        Ok(Self {
            name: path.display().to_string(),
            tables,
        })
    }

    fn row_matches(row: &Record, filters: &[(String, Value)]) -> bool {
        filters.iter().all(|(column, wanted)| {
            row.get(column)
                .map(|cell| ColumnKind::of(cell).matches(cell, wanted))
                .unwrap_or(false)
        })
    }

    /// SQL style order: nulls last when ascending, first when descending.
    fn order_rows(rows: &mut [Record], order: &OrderSpec) {
        rows.sort_by(|a, b| {
            let a = a.get(&order.column).filter(|v| !v.is_null());
            let b = b.get(&order.column).filter(|v| !v.is_null());
            let ordering = match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => natural_cmp(x, y),
            };
            if order.ascending { ordering } else { ordering.reverse() }
        });
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Table, FetchError> {
        let rows = self.tables.get(&query.table).ok_or_else(|| {
            FetchError::new(format!("relation \"{}\" does not exist", query.table))
                .with_code("42P01")
        })?;

        let mut result: Table = rows
            .iter()
            .filter(|row| Self::row_matches(row, &query.filters))
            .cloned()
            .collect();
        if let Some(order) = &query.order {
            Self::order_rows(&mut result, order);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
