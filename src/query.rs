//! Query gateway and filter combiner.
//!
//! `fetch_table_data` pushes filters and ordering to the store. Searching a
//! sequence column has no store side predicate, so `search_in_array_column`
//! fetches the whole table and filters locally; `fetch_filtered_data` then
//! applies whatever the store could not.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, error, instrument, trace};

use crate::domain::FetchError;
use crate::record::{FetchOptions, FilterSpec, OrderSpec, Record, Table};
use crate::schema::TableSchema;
use crate::sort::natural_cmp;
use crate::store::{RowStore, SelectQuery};

#[derive(Clone)]
pub struct QueryGateway {
    store: Arc<dyn RowStore>,
}

impl QueryGateway {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Equality filtered, optionally ordered select-all. Sentinel filter values
    /// are not sent.
    #[instrument(level = "debug", skip(self, filters, order_by))]
    pub async fn fetch_table_data(
        &self,
        table: &str,
        filters: &FilterSpec,
        order_by: Option<&OrderSpec>,
    ) -> Result<Table, FetchError> {
        let mut query = SelectQuery::all(table);
        for (column, value) in filters.active() {
            query = query.eq(column, value.clone());
        }
        if let Some(order) = order_by {
            query = query.order(order.clone());
        }

        match self.store.select(&query).await {
            Ok(rows) => {
                debug!("Fetched {} rows from {table}", rows.len());
                Ok(rows)
            }
            Err(e) => {
                error!(table, error = %e.diagnostic(), "Error fetching data");
                Err(e)
            }
        }
    }

    /// Rows whose `column` is a sequence containing `search_value` parsed as an
    /// integer. A value that does not parse returns the table unfiltered.
    #[instrument(level = "debug", skip(self))]
    pub async fn search_in_array_column(
        &self,
        table: &str,
        column: &str,
        search_value: &str,
    ) -> Result<Table, FetchError> {
        let rows = match self.store.select(&SelectQuery::all(table)).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(table, column, error = %e.diagnostic(), "Error searching data");
                return Err(e);
            }
        };

        let Some(needle) = parse_leading_int(search_value) else {
            debug!("Search value {search_value:?} is not a number, returning all rows");
            return Ok(rows);
        };

        let matches: Table = rows
            .into_par_iter()
            .filter(|row| row.get(column).is_some_and(|v| sequence_contains(v, needle)))
            .collect();
        trace!("{} rows of {table} contain {needle} in {column}", matches.len());
        Ok(matches)
    }

    /// Search path or direct path, whichever `options` asks for.
    ///
    /// On the search path the extra filters are applied locally with typed
    /// equality (column kinds from `schema` when given, otherwise from each
    /// cell) and ordering is done here since the store never saw it.
    #[instrument(level = "debug", skip(self, options, schema))]
    pub async fn fetch_filtered_data(
        &self,
        table: &str,
        options: &FetchOptions,
        schema: Option<&TableSchema>,
    ) -> Result<Table, FetchError> {
        let mut rows = match options.active_search() {
            Some(search) => {
                let mut rows = self
                    .search_in_array_column(table, &search.column, &search.value)
                    .await?;
                for (column, wanted) in options.filters.active() {
                    let kind = schema.map(|s| s.kind_of(column)).unwrap_or_default();
                    rows.retain(|row| row.get(column).is_some_and(|cell| kind.matches(cell, wanted)));
                }
                rows
            }
            None => {
                self.fetch_table_data(table, &options.filters, options.order_by.as_ref())
                    .await?
            }
        };

        // A search with a column but no value still gets the local order.
        let searching = options.search.as_ref().is_some_and(|s| !s.column.is_empty());
        if searching && let Some(order) = &options.order_by {
            sort_search_results(&mut rows, order);
        }
        Ok(rows)
    }
}

/// Order for search results.
///
/// Nulls go last in both directions, the rest compares by natural order.
/// Unlike the header sort, sequences are not compared by length here.
pub fn sort_search_results(rows: &mut [Record], order: &OrderSpec) {
    rows.sort_by(|a, b| {
        let a = a.get(&order.column).filter(|v| !v.is_null());
        let b = b.get(&order.column).filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) if order.ascending => natural_cmp(x, y),
            (Some(x), Some(y)) => natural_cmp(y, x),
        }
    });
}

/// Leading integer of `s`: optional whitespace, optional sign, digits.
/// Anything after the digits is ignored, `"12abc"` gives 12. Integers too
/// large for `i64` still parse, as the nearest `f64`.
pub fn parse_leading_int(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    if digits.is_empty() {
        return None;
    }
    let magnitude: f64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn sequence_contains(value: &Value, needle: f64) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .any(|item| item.as_f64().is_some_and(|n| n == needle)),
        _ => false,
    }
}

/// Tags fetches so only the most recently issued one is applied.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, id: u64) -> bool {
        id == self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn raags() -> Table {
        serde_json::from_value(json!([
            {"name": "Yaman", "thaat": "Kalyan", "aaroh": [0, 2, 4, 6, 7, 9, 11], "id": 3},
            {"name": "Bhupali", "thaat": "Kalyan", "aaroh": [0, 2, 4, 7, 9], "id": 1},
            {"name": "Bhairav", "thaat": "Bhairav", "aaroh": [0, 1, 4, 5, 7, 8, 11], "id": null},
            {"name": "Malkauns", "thaat": "Bhairavi", "aaroh": [0, 3, 5, 8, 10], "id": 2},
            {"name": "Unknown", "thaat": "all", "aaroh": null, "id": 4},
        ]))
        .unwrap()
    }

    fn gateway() -> QueryGateway {
        QueryGateway::new(Arc::new(MemoryStore::new("test").with_table("raags", raags())))
    }

    fn names(rows: &Table) -> Vec<String> {
        rows.iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    struct FailingStore;

    #[async_trait]
    impl RowStore for FailingStore {
        async fn select(&self, _query: &SelectQuery) -> Result<Table, FetchError> {
            Err(FetchError::new("permission denied for table raags").with_code("42501"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct RecordingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
        last_query: std::sync::Mutex<Option<SelectQuery>>,
    }

    #[async_trait]
    impl RowStore for RecordingStore {
        async fn select(&self, query: &SelectQuery) -> Result<Table, FetchError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            *self.last_query.lock().unwrap() = Some(query.clone());
            self.inner.select(query).await
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn sentinel_filters_fetch_everything() {
        let gateway = gateway();
        let sentinels = FilterSpec::new()
            .with("thaat", "all")
            .with("name", "")
            .with("id", Value::Null);

        let filtered = gateway.fetch_table_data("raags", &sentinels, None).await.unwrap();
        let unfiltered = gateway
            .fetch_table_data("raags", &FilterSpec::new(), None)
            .await
            .unwrap();
        assert_eq!(filtered, unfiltered);
        assert_eq!(filtered.len(), 5);
    }

    #[tokio::test]
    async fn direct_fetch_filters_and_orders_in_store() {
        let rows = gateway()
            .fetch_table_data(
                "raags",
                &FilterSpec::new().with("thaat", "Kalyan"),
                Some(&OrderSpec::asc("id")),
            )
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["Bhupali", "Yaman"]);
    }

    #[tokio::test]
    async fn non_numeric_search_returns_everything() {
        let rows = gateway()
            .search_in_array_column("raags", "aaroh", "abc")
            .await
            .unwrap();
        assert_eq!(rows, raags());
    }

    #[tokio::test]
    async fn oversized_search_value_matches_nothing() {
        let rows = gateway()
            .search_in_array_column("raags", "aaroh", "99999999999999999999")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn empty_search_value_still_sorts_locally() {
        let options = FetchOptions::default()
            .search(crate::record::SearchSpec::new("aaroh", ""))
            .order_by(OrderSpec::desc("id"));

        let rows = gateway().fetch_filtered_data("raags", &options, None).await.unwrap();
        assert_eq!(names(&rows), vec!["Unknown", "Yaman", "Malkauns", "Bhupali", "Bhairav"]);
    }

    #[tokio::test]
    async fn numeric_search_matches_containing_sequences() {
        let rows = gateway()
            .search_in_array_column("raags", "aaroh", "5")
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["Bhairav", "Malkauns"]);
    }

    #[tokio::test]
    async fn search_fetches_the_whole_table() {
        let store = Arc::new(RecordingStore {
            inner: MemoryStore::new("inner").with_table("raags", raags()),
            calls: AtomicUsize::new(0),
            last_query: std::sync::Mutex::new(None),
        });
        let gateway = QueryGateway::new(store.clone());
        let options = FetchOptions::default()
            .search(crate::record::SearchSpec::new("aaroh", "11"))
            .filters(FilterSpec::new().with("thaat", "Kalyan"))
            .order_by(OrderSpec::desc("id"));

        gateway.fetch_filtered_data("raags", &options, None).await.unwrap();

        assert_eq!(store.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(
            store.last_query.lock().unwrap().clone(),
            Some(SelectQuery::all("raags"))
        );
    }

    #[tokio::test]
    async fn search_path_applies_filters_and_sorts_locally() {
        let options = FetchOptions::default()
            .search(crate::record::SearchSpec::new("aaroh", "7"))
            .filters(FilterSpec::new().with("thaat", "Kalyan").with("name", "all"))
            .order_by(OrderSpec::asc("id"));

        let rows = gateway().fetch_filtered_data("raags", &options, None).await.unwrap();
        assert_eq!(names(&rows), vec!["Bhupali", "Yaman"]);
    }

    #[tokio::test]
    async fn search_path_filter_uses_typed_equality() {
        let options = FetchOptions::default()
            .search(crate::record::SearchSpec::new("aaroh", "0"))
            .filters(FilterSpec::new().with("id", "3"));

        let rows = gateway().fetch_filtered_data("raags", &options, None).await.unwrap();
        assert_eq!(names(&rows), vec!["Yaman"]);
    }

    #[tokio::test]
    async fn search_results_keep_nulls_last_descending() {
        let options = FetchOptions::default()
            .search(crate::record::SearchSpec::new("aaroh", "0"))
            .order_by(OrderSpec::desc("id"));

        let rows = gateway().fetch_filtered_data("raags", &options, None).await.unwrap();
        assert_eq!(names(&rows), vec!["Yaman", "Malkauns", "Bhupali", "Bhairav"]);
    }

    #[test]
    fn search_sort_ignores_sequence_length() {
        let mut rows: Table = serde_json::from_value(json!([
            {"s": [9]},
            {"s": [1, 2, 3]},
        ]))
        .unwrap();
        sort_search_results(&mut rows, &OrderSpec::asc("s"));
        assert_eq!(rows[0]["s"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn errors_propagate_unchanged() {
        let gateway = QueryGateway::new(Arc::new(FailingStore));
        let expected = FetchError::new("permission denied for table raags").with_code("42501");

        let err = gateway
            .fetch_table_data("raags", &FilterSpec::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err, expected);

        let err = gateway
            .search_in_array_column("raags", "aaroh", "1")
            .await
            .unwrap_err();
        assert_eq!(err, expected);

        let options = FetchOptions::default().search(crate::record::SearchSpec::new("aaroh", "1"));
        let err = gateway
            .fetch_filtered_data("raags", &options, None)
            .await
            .unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn leading_integer_parsing() {
        assert_eq!(parse_leading_int("5"), Some(5.0));
        assert_eq!(parse_leading_int("  12"), Some(12.0));
        assert_eq!(parse_leading_int("7abc"), Some(7.0));
        assert_eq!(parse_leading_int("3.9"), Some(3.0));
        assert_eq!(parse_leading_int("-2"), Some(-2.0));
        assert_eq!(parse_leading_int("+4"), Some(4.0));
        assert_eq!(parse_leading_int("99999999999999999999"), Some(1e20));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
    }

    #[test]
    fn only_latest_request_is_current() {
        let mut tracker = RequestTracker::new();
        let first = tracker.issue();
        let second = tracker.issue();
        assert!(second > first);
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }
}
