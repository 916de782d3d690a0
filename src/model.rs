use serde_json::Value;
use tracing::{debug, error, info, trace};

use crate::cmdline::{CommandInput, CommandLine};
use crate::domain::{CMDMode, ExplorerConfig, FetchError, HELP_TEXT, Message};
use crate::notation::SvarNotation;
use crate::query::{QueryGateway, RequestTracker};
use crate::record::{FetchOptions, FilterSpec, OrderSpec, SearchSpec, Table, is_sentinel, scalar_text};
use crate::render::BodyRow;
use crate::schema::TableSchema;
use crate::ui::{BANNER_HEIGHT, COLUMN_SPACING, COLUMN_WIDTH_MARGIN, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT};
use crate::view::TableView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Loading,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modus {
    Table,
    Menu,
    Popup,
    CmdInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Column { name: String, visible: bool },
    Notation { name: &'static str, selected: bool },
}

/// A fetch to run off the UI thread. Tagged with the id the tracker issued.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub id: u64,
    pub table: String,
    pub options: FetchOptions,
    pub schema: Option<TableSchema>,
}

#[derive(Debug)]
pub struct FetchResponse {
    pub id: u64,
    pub result: Result<Table, FetchError>,
}

impl FetchRequest {
    pub async fn run(self, gateway: QueryGateway) -> FetchResponse {
        let result = gateway
            .fetch_filtered_data(&self.table, &self.options, self.schema.as_ref())
            .await;
        FetchResponse {
            id: self.id,
            result,
        }
    }
}

pub struct Model {
    config: ExplorerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    view: TableView,
    sorting_attached: bool,
    tracker: RequestTracker,
    pending: Option<FetchRequest>,
    search: Option<SearchSpec>,
    filters: FilterSpec,
    order_by: Option<OrderSpec>,
    selected_row: usize,
    offset_row: usize,
    selected_column: usize,
    offset_column: usize,
    width: usize,
    height: usize,
    menu_cursor: usize,
    cmdline: CommandLine,
    last_input: CommandInput,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &ExplorerConfig,
        view: TableView,
        order_by: Option<OrderSpec>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            view,
            sorting_attached: false,
            tracker: RequestTracker::new(),
            pending: None,
            search: None,
            filters: FilterSpec::new(),
            order_by,
            selected_row: 0,
            offset_row: 0,
            selected_column: 0,
            offset_column: 0,
            width: ui_width,
            height: ui_height,
            menu_cursor: 0,
            cmdline: CommandLine::default(),
            last_input: CommandInput::default(),
            status_message: "Started rtv!".to_string(),
        };
        model.attach_sorting();
        model.reload();
        model
    }

    fn attach_sorting(&mut self) {
        if !self.sorting_attached && !self.view.headers().is_empty() {
            self.view.attach_sorting();
            self.sorting_attached = true;
        }
    }

    /// Issues a new fetch for the current search and filters. Any fetch still
    /// in flight becomes stale.
    pub fn reload(&mut self) {
        let options = FetchOptions {
            search: self.search.clone(),
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
        };
        let id = self.tracker.issue();
        debug!("Issuing fetch #{id} for {}: {options:?}", self.view.table_name());
        self.pending = Some(FetchRequest {
            id,
            table: self.view.table_name().to_string(),
            options,
            schema: self.view.schema().cloned(),
        });
        self.status = Status::Loading;
        self.view.show_loading();
    }

    pub fn take_fetch_request(&mut self) -> Option<FetchRequest> {
        self.pending.take()
    }

    /// Applies a finished fetch unless a newer one was issued since.
    pub fn apply_fetch(&mut self, response: FetchResponse) -> bool {
        if !self.tracker.is_current(response.id) {
            debug!(
                "Dropping stale fetch #{} (latest #{})",
                response.id,
                self.tracker.latest()
            );
            return false;
        }
        self.status = Status::Ready;
        match response.result {
            Ok(rows) => {
                info!("Fetch #{} returned {} rows", response.id, rows.len());
                self.set_status_message(format!("Loaded {} rows", rows.len()));
                self.view.render(rows);
                self.attach_sorting();
                self.selected_row = 0;
                self.offset_row = 0;
                self.clamp_column();
            }
            Err(e) => {
                error!("Fetch #{} failed: {}", response.id, e.diagnostic());
                self.view.show_error(&e.diagnostic());
                self.view.refresh();
                self.set_status_message("Fetch failed");
            }
        }
        true
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        trace!("Update: {:?}, {msg:?}", self.modus);
        match self.modus {
            Modus::Table => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_rows_down(1),
                Message::MoveUp => self.move_rows_up(1),
                Message::MovePageDown => self.move_rows_down(self.table_height().max(1)),
                Message::MovePageUp => self.move_rows_up(self.table_height().max(1)),
                Message::MoveBeginning => self.move_rows_up(usize::MAX),
                Message::MoveEnd => self.move_rows_down(usize::MAX),
                Message::MoveLeft => self.move_column_left(),
                Message::MoveRight => self.move_column_right(),
                Message::Sort => self.sort_selected_column(),
                Message::HideColumn => self.hide_selected_column(),
                Message::Menu => self.open_menu(),
                Message::Search => self.enter_cmd_mode(CMDMode::SearchInColumn),
                Message::Filter => self.enter_cmd_mode(CMDMode::FilterByColumn),
                Message::ClearQuery => self.clear_query(),
                Message::Reload => self.reload(),
                Message::Help => self.show_popup(),
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
            Modus::Menu => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_menu(1),
                Message::MoveUp => self.move_menu(-1),
                Message::Toggle | Message::Sort => self.toggle_menu_entry(),
                Message::Menu | Message::Exit => self.close_overlay(),
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
            Modus::Popup => match msg {
                Message::Quit => self.quit(),
                Message::Help | Message::Exit => self.close_overlay(),
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
            Modus::CmdInput => match msg {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
        }
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    /// Whether the controller should pass keys through untranslated.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CmdInput && self.cmdline.is_active()
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized! w:{}->{width}, h:{}->{height}", self.width, self.height);
        self.width = width;
        self.height = height;
        self.scroll_to_row();
        self.scroll_to_column();
    }

    // -------------------- Row and column selection ---------------------- //

    fn row_count(&self) -> usize {
        self.view
            .body()
            .rows()
            .iter()
            .filter(|r| matches!(r, BodyRow::Cells(_)))
            .count()
    }

    pub fn table_height(&self) -> usize {
        let banner = if self.view.error_banner().is_some() { BANNER_HEIGHT } else { 0 };
        self.height
            .saturating_sub(TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT + banner)
    }

    fn move_rows_down(&mut self, size: usize) {
        let rows = self.row_count();
        if rows == 0 {
            return;
        }
        self.selected_row = self.selected_row.saturating_add(size).min(rows - 1);
        self.scroll_to_row();
    }

    fn move_rows_up(&mut self, size: usize) {
        self.selected_row = self.selected_row.saturating_sub(size);
        self.scroll_to_row();
    }

    fn scroll_to_row(&mut self) {
        let height = self.table_height().max(1);
        if self.selected_row < self.offset_row {
            self.offset_row = self.selected_row;
        } else if self.selected_row >= self.offset_row + height {
            self.offset_row = self.selected_row + 1 - height;
        }
    }

    fn visible_column_count(&self) -> usize {
        self.view.visible_columns().count()
    }

    pub fn selected_column(&self) -> Option<&str> {
        self.view
            .visible_columns()
            .nth(self.selected_column)
            .map(|h| h.column.as_str())
    }

    fn move_column_left(&mut self) {
        self.selected_column = self.selected_column.saturating_sub(1);
        self.scroll_to_column();
    }

    fn move_column_right(&mut self) {
        if self.selected_column + 1 < self.visible_column_count() {
            self.selected_column += 1;
        }
        self.scroll_to_column();
    }

    fn clamp_column(&mut self) {
        self.selected_column = self
            .selected_column
            .min(self.visible_column_count().saturating_sub(1));
        self.scroll_to_column();
    }

    fn scroll_to_column(&mut self) {
        if self.selected_column < self.offset_column {
            self.offset_column = self.selected_column;
        }
        while self.offset_column < self.selected_column
            && self.column_window().1 <= self.selected_column
        {
            self.offset_column += 1;
        }
    }

    /// Render width of every visible column, capped at `max_column_width`.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .view
            .visible_columns()
            .map(|h| h.column.chars().count() + 2)
            .collect();
        for row in self.view.body().rows() {
            if let BodyRow::Cells(cells) = row {
                for (width, cell) in widths.iter_mut().zip(cells.iter()) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }
        widths
            .into_iter()
            .map(|w| (w + COLUMN_WIDTH_MARGIN).min(self.config.max_column_width))
            .collect()
    }

    /// Visible column range `[start, end)` that fits the screen width.
    pub fn column_window(&self) -> (usize, usize) {
        let widths = self.column_widths();
        let start = self.offset_column.min(widths.len());
        let mut used = 0;
        let mut end = start;
        for width in widths[start..].iter() {
            if end > start && used + width > self.width {
                break;
            }
            used += width + COLUMN_SPACING;
            end += 1;
        }
        (start, end)
    }

    // -------------------- Actions ---------------------- //

    fn sort_selected_column(&mut self) {
        let Some(column) = self.selected_column().map(str::to_string) else {
            return;
        };
        if self.view.click_header(&column) {
            let sort = self.view.sort_state();
            let direction = if sort.ascending() { "ascending" } else { "descending" };
            let message = format!("Sorted by {} ({direction})", sort.column().unwrap_or(&column));
            self.set_status_message(message);
        } else {
            self.set_status_message(format!("{column} is not sortable"));
        }
    }

    fn hide_selected_column(&mut self) {
        let Some(column) = self.selected_column().map(str::to_string) else {
            return;
        };
        self.toggle_column(&column, false);
        self.clamp_column();
    }

    fn toggle_column(&mut self, column: &str, visible: bool) {
        if let Err(e) = self.view.toggle_column(column, visible) {
            error!("Could not save column visibility: {e}");
            self.view.show_error(&e.to_string());
        }
    }

    fn clear_query(&mut self) {
        self.search = None;
        self.filters.clear();
        self.set_status_message("Cleared search and filters");
        self.reload();
    }

    fn show_popup(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
    }

    fn open_menu(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Menu;
        self.menu_cursor = 0;
    }

    fn close_overlay(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Table;
        self.clamp_column();
    }

    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        let columns = self
            .view
            .headers()
            .iter()
            .map(|h| MenuEntry::Column {
                name: h.column.clone(),
                visible: !h.hidden,
            });
        let notations = SvarNotation::NOTATIONS.iter().map(|&name| MenuEntry::Notation {
            name,
            selected: name == self.view.notation(),
        });
        columns.chain(notations).collect()
    }

    fn move_menu(&mut self, step: isize) {
        let entries = self.menu_entries().len();
        if entries == 0 {
            return;
        }
        self.menu_cursor = self
            .menu_cursor
            .saturating_add_signed(step)
            .min(entries - 1);
    }

    fn toggle_menu_entry(&mut self) {
        match self.menu_entries().into_iter().nth(self.menu_cursor) {
            Some(MenuEntry::Column { name, visible }) => self.toggle_column(&name, !visible),
            Some(MenuEntry::Notation { name, .. }) => {
                if let Err(e) = self.view.select_notation(name) {
                    error!("Could not save notation: {e}");
                    self.view.show_error(&e.to_string());
                }
            }
            None => {}
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        let Some(column) = self.selected_column().map(str::to_string) else {
            return;
        };
        let initial = match mode {
            CMDMode::SearchInColumn => self
                .search
                .as_ref()
                .filter(|s| s.column == column)
                .map(|s| s.value.clone()),
            CMDMode::FilterByColumn => self.filters.get(&column).map(scalar_text),
        }
        .unwrap_or_default();

        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmdline.open(mode, &column, &initial);
        self.last_input = self.cmdline.get();
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.cmdline.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        let input = std::mem::take(&mut self.last_input);
        self.cmdline.clear();
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;

        if input.canceled {
            trace!("Command input canceled");
            return;
        }
        let value = input.input.trim().to_string();
        match input.mode {
            Some(CMDMode::SearchInColumn) => {
                if value.is_empty() {
                    self.search = None;
                    self.set_status_message("Search cleared");
                } else {
                    self.set_status_message(format!("Searching {} for {value}", input.column));
                    self.search = Some(SearchSpec::new(input.column, value));
                }
            }
            Some(CMDMode::FilterByColumn) => {
                let constraint = Value::String(value);
                if is_sentinel(&constraint) {
                    self.filters.remove(&input.column);
                    self.set_status_message(format!("Filter on {} cleared", input.column));
                } else {
                    self.set_status_message(format!("Filtering {}", input.column));
                    self.filters.insert(input.column, constraint);
                }
            }
            None => return,
        }
        self.reload();
    }

    // -------------------- Accessors for the ui ---------------------- //

    pub fn view(&self) -> &TableView {
        &self.view
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn offset_row(&self) -> usize {
        self.offset_row
    }

    pub fn selected_column_index(&self) -> usize {
        self.selected_column
    }

    pub fn menu_cursor(&self) -> usize {
        self.menu_cursor
    }

    pub fn show_menu(&self) -> bool {
        self.modus == Modus::Menu
    }

    pub fn popup_message(&self) -> Option<&str> {
        (self.modus == Modus::Popup).then_some(HELP_TEXT)
    }

    pub fn command_input(&self) -> Option<&CommandInput> {
        (self.modus == Modus::CmdInput).then_some(&self.last_input)
    }

    pub fn status_line(&self) -> String {
        let mut parts = vec![
            self.view.table_name().to_string(),
            format!("{} rows", self.row_count()),
            format!("notation: {}", self.view.notation()),
        ];
        if let Some(search) = &self.search {
            parts.push(format!("search: {} ∋ {}", search.column, search.value));
        }
        let filters: Vec<String> = self
            .filters
            .active()
            .map(|(c, v)| format!("{c}={}", scalar_text(v)))
            .collect();
        if !filters.is_empty() {
            parts.push(format!("filters: {}", filters.join(", ")));
        }
        if self.status == Status::Loading {
            parts.push("loading ...".to_string());
        }
        parts.push(self.status_message.clone());
        parts.join(" | ")
    }
}
