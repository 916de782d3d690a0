//! Display preferences that survive restarts.
//!
//! Preferences live in a small string keyed, string valued store: the hidden
//! column set of each table under `"{table}_hiddenColumns"` and the notation
//! under `"notation"`. Every change is written back immediately.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use crate::domain::PrefsError;

pub const NOTATION_KEY: &str = "notation";

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;
}

/// JSON object on disk. The whole file is rewritten through a temporary file
/// and a rename on every `set`.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileKeyValueStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring unreadable preference file {}: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!("Opened preferences {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

/// In-memory store. Clones share the same entries, the way every page of a
/// session sees the same local storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Hidden columns of one table, in the order they were hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnVisibility {
    table: String,
    hidden: IndexSet<String>,
}

impl ColumnVisibility {
    pub fn storage_key(table: &str) -> String {
        format!("{table}_hiddenColumns")
    }

    pub fn load(store: &dyn KeyValueStore, table: &str) -> Self {
        let key = Self::storage_key(table);
        let hidden = match store.get(&key) {
            Some(saved) => match serde_json::from_str::<Vec<String>>(&saved) {
                Ok(columns) => columns.into_iter().collect(),
                Err(e) => {
                    warn!("Ignoring unreadable {key}: {e}");
                    IndexSet::new()
                }
            },
            None => IndexSet::new(),
        };
        trace!("Loaded {} hidden columns for {table}", hidden.len());
        Self {
            table: table.to_string(),
            hidden,
        }
    }

    /// Shows or hides `column` and persists the full set.
    pub fn toggle(
        &mut self,
        store: &mut dyn KeyValueStore,
        column: &str,
        visible: bool,
    ) -> Result<(), PrefsError> {
        if visible {
            self.hidden.shift_remove(column);
        } else {
            self.hidden.insert(column.to_string());
        }
        self.save(store)
    }

    fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), PrefsError> {
        let columns: Vec<&String> = self.hidden.iter().collect();
        store.set(
            &Self::storage_key(&self.table),
            &serde_json::to_string(&columns)?,
        )
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden.contains(column)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &str> {
        self.hidden.iter().map(String::as_str)
    }
}

/// The notation numeric sequences are shown in. One value for all tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationPreference {
    current: String,
}

impl NotationPreference {
    pub fn load(store: &dyn KeyValueStore, default: &str) -> Self {
        let current = store
            .get(NOTATION_KEY)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default.to_string());
        Self { current }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn set(&mut self, store: &mut dyn KeyValueStore, notation: &str) -> Result<(), PrefsError> {
        self.current = notation.to_string();
        store.set(NOTATION_KEY, notation)
    }
}
