//! Terminal explorer for raag tables.
//!
//! Rows come from a [`store::RowStore`] through the [`query::QueryGateway`],
//! a [`view::TableView`] keeps sort, hidden columns and notation for one
//! table, and [`render::TableRenderer`] turns records into display text.

pub mod cmdline;
pub mod controller;
pub mod domain;
pub mod logging;
pub mod model;
pub mod notation;
pub mod prefs;
pub mod query;
pub mod record;
pub mod render;
pub mod schema;
pub mod sort;
pub mod store;
pub mod ui;
pub mod view;
