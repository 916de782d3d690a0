use std::path::PathBuf;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use rtv::notation::SvarNotation;
use rtv::prefs::FileKeyValueStore;
use rtv::query::QueryGateway;
use rtv::record::{FetchOptions, FilterSpec, OrderSpec, SearchSpec};
use rtv::render::{BodyRow, NO_RESULTS, TableRenderer};
use rtv::schema::{ColumnDef, TableSchema};
use rtv::store::MemoryStore;
use rtv::view::TableView;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/raags.json")
}

fn gateway() -> QueryGateway {
    let store = MemoryStore::from_json_file(&fixture()).unwrap();
    QueryGateway::new(Arc::new(store))
}

fn open_view(prefs: &std::path::Path, schema: Option<TableSchema>) -> TableView {
    TableView::initialize(
        "raags",
        Box::new(FileKeyValueStore::open(prefs).unwrap()),
        TableRenderer::new(Arc::new(SvarNotation)),
        schema,
        "sargam",
    )
}

fn cells(view: &TableView) -> Vec<Vec<String>> {
    view.body()
        .rows()
        .iter()
        .map(|row| match row {
            BodyRow::Cells(cells) => cells.clone(),
            BodyRow::Placeholder { message, .. } => vec![message.clone()],
        })
        .collect()
}

#[tokio::test]
async fn search_filter_order_and_render() {
    let dir = tempfile::tempdir().unwrap();
    let mut view = open_view(&dir.path().join("prefs.json"), None);

    let options = FetchOptions::default()
        .search(SearchSpec::new("aaroh", "7"))
        .filters(FilterSpec::new().with("thaat", "Kalyan"))
        .order_by(OrderSpec::desc("name"));
    let rows = gateway()
        .fetch_filtered_data("raags", &options, view.schema())
        .await
        .unwrap();
    view.render(rows);

    assert_eq!(
        cells(&view),
        vec![
            vec!["1", "Yaman", "Kalyan", "S R G M P D N", "-", "1 0 1 0 1 0 1 1 0 1 0 1"],
            vec!["2", "Bhupali", "Kalyan", "S R G P D", "G R S .D S", "1 0 1 0 1 0 0 1 0 1 0 0"],
        ]
    );
}

#[tokio::test]
async fn direct_fetch_uses_store_order() {
    let options = FetchOptions::default()
        .filters(FilterSpec::new().with("thaat", "all"))
        .order_by(OrderSpec::asc("name"));
    let rows = gateway()
        .fetch_filtered_data("raags", &options, None)
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
    assert_eq!(
        names,
        vec![json!("Bhairav"), json!("Bhupali"), json!("Kafi"), json!("Malkauns"), json!("Yaman")]
    );
}

#[tokio::test]
async fn preferences_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("rtv").join("prefs.json");
    let rows = gateway()
        .fetch_table_data("raags", &FilterSpec::new(), None)
        .await
        .unwrap();

    let mut first = open_view(&prefs, None);
    first.render(rows.clone());
    first.toggle_column("vector", false).unwrap();
    first.toggle_column("id", false).unwrap();
    first.select_notation("western").unwrap();
    drop(first);

    let mut second = open_view(&prefs, None);
    second.render(rows);
    assert!(second.is_hidden("vector") && second.is_hidden("id"));
    assert_eq!(second.notation(), "western");
    assert_eq!(
        cells(&second)[0],
        vec!["Yaman", "Kalyan", "C D E F# G A B", "-"]
    );
}

#[tokio::test]
async fn declared_schema_fixes_columns() {
    let dir = tempfile::tempdir().unwrap();
    let columns: Vec<ColumnDef> = ["name", "aaroh:sequence", "raga_time:text!"]
        .iter()
        .map(|c| c.parse().unwrap())
        .collect();
    let mut view = open_view(&dir.path().join("prefs.json"), Some(TableSchema::declare(columns)));
    assert_eq!(view.attach_sorting(), 2);

    let rows = gateway()
        .fetch_filtered_data(
            "raags",
            &FetchOptions::default().search(SearchSpec::new("aaroh", "1")),
            view.schema(),
        )
        .await
        .unwrap();
    view.render(rows);
    assert_eq!(cells(&view), vec![vec!["Bhairav", "S r G m P d N", "-"]]);
    assert!(!view.click_header("raga_time"));

    assert!(view.click_header("aaroh"));
    view.render(Vec::new());
    assert_eq!(cells(&view), vec![vec![NO_RESULTS]]);
}

#[tokio::test]
async fn header_sort_orders_sequences_by_length() {
    let dir = tempfile::tempdir().unwrap();
    let mut view = open_view(&dir.path().join("prefs.json"), None);
    let rows = gateway()
        .fetch_table_data("raags", &FilterSpec::new(), None)
        .await
        .unwrap();
    view.render(rows);
    view.attach_sorting();

    view.click_header("aaroh");
    let names: Vec<_> = view.data().iter().map(|r| r["name"].clone()).collect();
    assert_eq!(
        names,
        vec![json!("Bhupali"), json!("Malkauns"), json!("Yaman"), json!("Bhairav"), json!("Kafi")]
    );

    view.click_header("pakad");
    let pakad: Vec<_> = view.data().iter().map(|r| r["pakad"].clone()).collect();
    assert_eq!(
        pakad,
        vec![json!("G R S .D S"), json!("S G m P"), json!("m g m S"), json!(null), json!(null)]
    );
}

#[tokio::test]
async fn unknown_table_shows_error_banner() {
    let dir = tempfile::tempdir().unwrap();
    let mut view = open_view(&dir.path().join("prefs.json"), None);
    let err = gateway()
        .fetch_table_data("thaats", &FilterSpec::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code.as_deref(), Some("42P01"));

    view.show_error(&err.diagnostic());
    assert_eq!(
        view.error_banner(),
        Some("Error: relation \"thaats\" does not exist")
    );
}
