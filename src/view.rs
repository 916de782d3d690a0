//! State of one table view.
//!
//! Everything the page shows for a table goes through `TableView`: the active
//! table and its schema, the current rows, sort state, hidden columns,
//! notation, the rendered body and headers and the error banner. Views do not
//! share state, so several can exist side by side.

use tracing::{debug, info, trace};

use crate::domain::PrefsError;
use crate::prefs::{ColumnVisibility, KeyValueStore, NotationPreference};
use crate::record::Table;
use crate::render::{HeaderCell, LOADING, TableBody, TableRenderer};
use crate::schema::TableSchema;
use crate::sort::{SortState, sort_records};

pub struct TableView {
    table: String,
    schema: Option<TableSchema>,
    prefs: Box<dyn KeyValueStore>,
    visibility: ColumnVisibility,
    notation: NotationPreference,
    sort: SortState,
    renderer: TableRenderer,
    data: Table,
    body: TableBody,
    headers: Vec<HeaderCell>,
    sortable_columns: Vec<String>,
    error_banner: Option<String>,
}

impl TableView {
    /// Sets up a view of `table`, loading its hidden columns and the notation
    /// from `prefs`. Without a declared schema the first non-empty render
    /// fixes one.
    pub fn initialize(
        table: impl Into<String>,
        prefs: Box<dyn KeyValueStore>,
        renderer: TableRenderer,
        schema: Option<TableSchema>,
        default_notation: &str,
    ) -> Self {
        let table = table.into();
        let visibility = ColumnVisibility::load(prefs.as_ref(), &table);
        let notation = NotationPreference::load(prefs.as_ref(), default_notation);
        info!(
            "Initialized view of {table} (notation {}, hidden: [{}])",
            notation.current(),
            visibility.hidden().collect::<Vec<_>>().join(", ")
        );

        let mut view = Self {
            table,
            schema: None,
            prefs,
            visibility,
            notation,
            sort: SortState::new(),
            renderer,
            data: Table::new(),
            body: TableBody::default(),
            headers: Vec::new(),
            sortable_columns: Vec::new(),
            error_banner: None,
        };
        if let Some(schema) = schema.filter(|s| !s.is_empty()) {
            view.set_schema(schema);
        }
        view
    }

    fn set_schema(&mut self, schema: TableSchema) {
        self.headers = TableRenderer::headers(&schema);
        self.schema = Some(schema);
    }

    /// Replaces the whole body with `rows`.
    pub fn render(&mut self, rows: Table) {
        if self.schema.is_none()
            && let Some(first) = rows.first()
        {
            self.set_schema(TableSchema::infer(first));
        }
        if let Some(schema) = self.schema.as_mut() {
            schema.refine(&rows);
        }
        self.data = rows;
        self.refresh();
    }

    /// Re-renders the current rows with the current preferences.
    pub fn refresh(&mut self) {
        let unset = TableSchema::default();
        let schema = self.schema.as_ref().unwrap_or(&unset);
        self.body = self
            .renderer
            .render(&self.data, schema, &self.visibility, self.notation.current());
        TableRenderer::refresh_headers(&mut self.headers, &self.visibility, &self.sort);
        trace!("Rendered {} rows of {}", self.body.len(), self.table);
    }

    /// Binds header clicks for every sortable header. Returns how many were bound.
    pub fn attach_sorting(&mut self) -> usize {
        self.sortable_columns = self
            .headers
            .iter()
            .filter(|h| h.sortable)
            .map(|h| h.column.clone())
            .collect();
        debug!("Sorting attached to {} headers", self.sortable_columns.len());
        self.sortable_columns.len()
    }

    /// Header click. Only bound headers sort.
    pub fn click_header(&mut self, column: &str) -> bool {
        if self.sortable_columns.iter().any(|c| c == column) {
            self.sort_table(column);
            true
        } else {
            trace!("Ignoring click on unbound header {column}");
            false
        }
    }

    pub fn sort_table(&mut self, column: &str) {
        self.sort.toggle(column);
        sort_records(&mut self.data, column, self.sort.ascending());
        self.refresh();
    }

    pub fn toggle_column(&mut self, column: &str, visible: bool) -> Result<(), PrefsError> {
        self.visibility
            .toggle(self.prefs.as_mut(), column, visible)?;
        debug!("Column {column} visible: {visible}");
        self.refresh();
        Ok(())
    }

    /// Persists a new notation. The body keeps the old notation until the next
    /// render or refresh.
    pub fn set_notation(&mut self, notation: &str) -> Result<(), PrefsError> {
        self.notation.set(self.prefs.as_mut(), notation)?;
        debug!("Notation set to {notation}");
        Ok(())
    }

    /// Notation control change: persist, then show it.
    pub fn select_notation(&mut self, notation: &str) -> Result<(), PrefsError> {
        self.set_notation(notation)?;
        self.refresh();
        Ok(())
    }

    pub fn show_loading(&mut self) {
        self.body = TableBody::placeholder(self.visible_columns().count(), LOADING);
    }

    /// Shows `message` in the banner, replacing any earlier one.
    pub fn show_error(&mut self, message: &str) {
        self.error_banner = Some(format!("Error: {message}"));
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn data(&self) -> &Table {
        &self.data
    }

    pub fn body(&self) -> &TableBody {
        &self.body
    }

    pub fn headers(&self) -> &[HeaderCell] {
        &self.headers
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &HeaderCell> {
        self.headers.iter().filter(|h| !h.hidden)
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.visibility.is_hidden(column)
    }

    pub fn notation(&self) -> &str {
        self.notation.current()
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn error_banner(&self) -> Option<&str> {
        self.error_banner.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::SvarNotation;
    use crate::prefs::MemoryKeyValueStore;
    use crate::render::{BodyRow, NO_RESULTS};
    use crate::schema::{ColumnDef, ColumnKind};
    use crate::sort::SortIndicator;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn rows(value: Value) -> Table {
        serde_json::from_value(value).unwrap()
    }

    fn open_view(store: &MemoryKeyValueStore) -> TableView {
        TableView::initialize(
            "raags",
            Box::new(store.clone()),
            TableRenderer::new(Arc::new(SvarNotation)),
            None,
            "sargam",
        )
    }

    fn cells(view: &TableView) -> Vec<Vec<String>> {
        view.body()
            .rows()
            .iter()
            .map(|r| match r {
                BodyRow::Cells(c) => c.clone(),
                BodyRow::Placeholder { message, .. } => vec![message.clone()],
            })
            .collect()
    }

    #[test]
    fn empty_render_is_one_spanning_row() {
        let store = MemoryKeyValueStore::new();
        let mut view = open_view(&store);
        view.render(rows(json!([{"name": "Yaman", "id": 1}])));
        view.render(Table::new());
        assert_eq!(
            view.body().rows(),
            &[BodyRow::Placeholder {
                span: 2,
                message: NO_RESULTS.to_string()
            }]
        );
    }

    #[test]
    fn first_render_fixes_schema() {
        let store = MemoryKeyValueStore::new();
        let mut view = open_view(&store);
        view.render(rows(json!([{"name": "Yaman", "id": 1}])));
        view.render(rows(json!([{"id": 2, "name": "Kafi", "extra": true}])));
        assert_eq!(cells(&view), vec![vec!["Kafi", "2"]]);
    }

    #[test]
    fn hidden_column_survives_reload() {
        let store = MemoryKeyValueStore::new();
        let data = rows(json!([
            {"name": "Yaman", "col": 1},
            {"name": "Kafi", "col": 2},
        ]));

        let mut first = open_view(&store);
        first.render(data.clone());
        first.toggle_column("col", false).unwrap();
        assert_eq!(cells(&first), vec![vec!["Yaman"], vec!["Kafi"]]);
        assert!(first.headers()[1].hidden);

        let mut reloaded = open_view(&store);
        reloaded.render(data);
        assert!(reloaded.is_hidden("col"));
        assert_eq!(cells(&reloaded), vec![vec!["Yaman"], vec!["Kafi"]]);

        reloaded.toggle_column("col", true).unwrap();
        assert_eq!(cells(&reloaded), vec![vec!["Yaman", "1"], vec!["Kafi", "2"]]);
    }

    #[test]
    fn sorting_moves_the_indicator() {
        let store = MemoryKeyValueStore::new();
        let mut view = open_view(&store);
        view.render(rows(json!([
            {"name": "Yaman", "x": null},
            {"name": "Kafi", "x": 2},
            {"name": "Bhairav", "x": 1},
        ])));
        assert_eq!(view.attach_sorting(), 2);

        assert!(view.click_header("x"));
        assert_eq!(cells(&view), vec![vec!["Bhairav", "1"], vec!["Kafi", "2"], vec!["Yaman", "-"]]);
        assert_eq!(view.headers()[1].indicator, Some(SortIndicator::Ascending));

        view.click_header("x");
        assert_eq!(cells(&view), vec![vec!["Kafi", "2"], vec!["Bhairav", "1"], vec!["Yaman", "-"]]);
        assert_eq!(view.headers()[1].indicator, Some(SortIndicator::Descending));

        view.click_header("name");
        assert_eq!(view.headers()[0].indicator, Some(SortIndicator::Ascending));
        assert_eq!(view.headers()[1].indicator, None);
    }

    #[test]
    fn unbound_headers_do_not_sort() {
        let store = MemoryKeyValueStore::new();
        let schema = TableSchema::declare(vec![
            ColumnDef::new("name", ColumnKind::Text),
            ColumnDef::new("meta", ColumnKind::Structured).unsortable(),
        ]);
        let mut view = TableView::initialize(
            "raags",
            Box::new(store),
            TableRenderer::new(Arc::new(SvarNotation)),
            Some(schema),
            "sargam",
        );
        assert!(!view.click_header("name"));
        assert_eq!(view.attach_sorting(), 1);
        assert!(!view.click_header("meta"));
        assert!(view.click_header("name"));
    }

    #[test]
    fn notation_change_needs_a_refresh() {
        let store = MemoryKeyValueStore::new();
        let mut view = open_view(&store);
        view.render(rows(json!([{"aaroh": [0, 4, 7]}])));
        assert_eq!(cells(&view), vec![vec!["S G P"]]);

        view.set_notation("western").unwrap();
        assert_eq!(cells(&view), vec![vec!["S G P"]]);
        view.refresh();
        assert_eq!(cells(&view), vec![vec!["C E G"]]);

        view.select_notation("numeric").unwrap();
        assert_eq!(cells(&view), vec![vec!["0 4 7"]]);
        assert_eq!(open_view(&store).notation(), "numeric");
    }

    #[test]
    fn one_error_banner_at_a_time() {
        let store = MemoryKeyValueStore::new();
        let mut view = open_view(&store);
        view.show_error("first");
        view.show_error("second");
        assert_eq!(view.error_banner(), Some("Error: second"));
    }

    #[test]
    fn loading_placeholder() {
        let store = MemoryKeyValueStore::new();
        let mut view = open_view(&store);
        view.render(rows(json!([{"a": 1, "b": 2, "c": 3}])));
        view.show_loading();
        assert_eq!(view.body().placeholder_message(), Some(LOADING));
        assert_eq!(
            view.body().rows(),
            &[BodyRow::Placeholder {
                span: 3,
                message: LOADING.to_string()
            }]
        );
    }
}
