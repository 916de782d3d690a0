use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use serde::Deserialize;
use thiserror::Error;

/// A failed query against the row store.
///
/// Carries whatever diagnostic the remote side returned. A PostgREST style
/// store answers with `message`, `code`, `details` and `hint`; transport
/// failures only fill in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
            hint: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Message with the optional details appended, as shown in the error banner.
    pub fn diagnostic(&self) -> String {
        match (&self.details, &self.hint) {
            (Some(d), Some(h)) => format!("{} ({d}; hint: {h})", self.message),
            (Some(d), None) => format!("{} ({d})", self.message),
            (None, Some(h)) => format!("{} (hint: {h})", self.message),
            (None, None) => self.message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("could not access preference store: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode preference value: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not set up logging: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ExplorerConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub default_notation: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            default_notation: "sargam".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    SearchInColumn,
    FilterByColumn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Sort,
    HideColumn,
    Menu,
    Toggle,
    Search,
    Filter,
    ClearQuery,
    Reload,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
q            quit
arrows/hjkl  move selection
PgUp/PgDn    page up / down
g / G        first / last row
s, Enter     sort by selected column (again to reverse)
x            hide selected column
m            column & notation menu (space toggles, Esc closes)
/            search selected sequence column for a number
f            filter selected column (empty or 'all' clears)
c            clear search and filters
r            reload
?            this help (Esc closes)";
