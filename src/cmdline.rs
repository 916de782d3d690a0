use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::domain::CMDMode;

/// One line command input for search and filter values.
///
/// The cursor counts characters, not bytes.
#[derive(Debug, Default)]
pub struct CommandLine {
    mode: Option<CMDMode>,
    column: String,
    input: String,
    cursor: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandInput {
    pub mode: Option<CMDMode>,
    pub column: String,
    pub input: String,
    pub cursor: usize,
    pub finished: bool,
    pub canceled: bool,
}

impl CommandInput {
    pub fn prompt(&self) -> String {
        match self.mode {
            Some(CMDMode::SearchInColumn) => format!("search {} for: ", self.column),
            Some(CMDMode::FilterByColumn) => format!("filter {} = ", self.column),
            None => String::new(),
        }
    }
}

impl CommandLine {
    /// Starts editing a value for `column`, prefilled with `initial`.
    pub fn open(&mut self, mode: CMDMode, column: &str, initial: &str) {
        self.mode = Some(mode);
        self.column = column.to_string();
        self.input = initial.to_string();
        self.cursor = self.input.chars().count();
        self.finished = false;
        self.canceled = false;
        trace!("Command line opened: {mode:?} on {column}");
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_some() && !self.finished
    }

    pub fn read(&mut self, key: KeyEvent) -> CommandInput {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor = (self.cursor + 1).min(self.len()),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.input.clear();
                self.cursor = 0;
            }
            (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_pos(self.cursor);
                self.input.insert(at, c);
                self.cursor += 1;
            }
            _ => {}
        }
        self.get()
    }

    pub fn get(&self) -> CommandInput {
        CommandInput {
            mode: self.mode,
            column: self.column.clone(),
            input: self.input.clone(),
            cursor: self.cursor,
            finished: self.finished,
            canceled: self.canceled,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            let at = self.byte_pos(self.cursor - 1);
            self.input.remove(at);
            self.cursor -= 1;
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_pos(self.cursor);
            self.input.remove(at);
        }
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.input.len())
    }
}
