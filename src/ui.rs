use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::ExplorerConfig;
use crate::model::{MenuEntry, Model};
use crate::render::BodyRow;
use crate::sort::SortIndicator;

pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const BANNER_HEIGHT: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const COLUMN_SPACING: usize = 1;

const POPUP_WIDTH_PERCENT: u16 = 60;
const POPUP_HEIGHT_PERCENT: u16 = 70;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &ExplorerConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let view = model.view();
        let banner_height = if view.error_banner().is_some() { BANNER_HEIGHT } else { 0 };
        let [banner_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(banner_height as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        if let Some(banner) = view.error_banner() {
            frame.render_widget(
                Paragraph::new(banner).style(Style::new().fg(Color::White).bg(Color::Red)),
                banner_area,
            );
        }

        self.draw_table(model, frame, table_area);
        Self::draw_status(model, frame, status_area);

        if model.show_menu() {
            Self::draw_menu(model, frame);
        }
        if let Some(message) = model.popup_message() {
            Self::draw_popup(" Help ", message, frame);
        }
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let view = model.view();
        let (start, end) = model.column_window();
        let widths: Vec<Constraint> = model.column_widths()[start..end]
            .iter()
            .map(|w| Constraint::Length((*w).min(self.max_column_width) as u16))
            .collect();
        let selected_column = model.selected_column_index();

        let header = Row::new(
            view.visible_columns()
                .enumerate()
                .skip(start)
                .take(end - start)
                .map(|(idx, h)| {
                    let marker = match h.indicator {
                        Some(SortIndicator::Ascending) => " ▲",
                        Some(SortIndicator::Descending) => " ▼",
                        None => "",
                    };
                    let style = if idx == selected_column {
                        Style::new().bold().reversed()
                    } else {
                        Style::new().bold()
                    };
                    Cell::from(format!("{}{marker}", h.column)).style(style)
                }),
        )
        .height(TABLE_HEADER_HEIGHT as u16);

        if let Some(message) = view.body().placeholder_message() {
            let [header_area, body_area] =
                Layout::vertical([Constraint::Length(TABLE_HEADER_HEIGHT as u16), Constraint::Min(0)])
                    .areas(area);
            frame.render_widget(
                Table::new(Vec::<Row>::new(), widths.clone())
                    .header(header)
                    .column_spacing(COLUMN_SPACING as u16),
                header_area,
            );
            frame.render_widget(Paragraph::new(message).centered().italic(), body_area);
            return;
        }

        let offset = model.offset_row();
        let rows = view
            .body()
            .rows()
            .iter()
            .enumerate()
            .skip(offset)
            .take(model.table_height())
            .filter_map(|(row_idx, row)| match row {
                BodyRow::Cells(cells) => Some((row_idx, cells)),
                BodyRow::Placeholder { .. } => None,
            })
            .map(|(row_idx, cells)| {
                let selected = row_idx == model.selected_row();
                let row_cells = cells[start.min(cells.len())..end.min(cells.len())]
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        let cell = Cell::from(text.as_str());
                        if selected && start + i == selected_column {
                            cell.style(Style::new().add_modifier(Modifier::REVERSED | Modifier::BOLD))
                        } else {
                            cell
                        }
                    });
                let row = Row::new(row_cells);
                if selected { row.style(Style::new().bg(Color::DarkGray)) } else { row }
            });

        frame.render_widget(
            Table::new(rows, widths)
                .header(header)
                .column_spacing(COLUMN_SPACING as u16),
            area,
        );
    }

    fn draw_status(model: &Model, frame: &mut Frame, area: Rect) {
        if let Some(input) = model.command_input() {
            let prompt = input.prompt();
            let x = area.x + (prompt.chars().count() + input.cursor) as u16;
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::from(prompt).yellow().bold(),
                    Span::from(input.input.as_str()),
                ])),
                area,
            );
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }
        frame.render_widget(
            Paragraph::new(model.status_line()).style(Style::new().reversed()),
            area,
        );
    }

    fn draw_menu(model: &Model, frame: &mut Frame) {
        let lines: Vec<Line> = model
            .menu_entries()
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let text = match entry {
                    MenuEntry::Column { name, visible } => {
                        format!("[{}] {name}", if visible { "x" } else { " " })
                    }
                    MenuEntry::Notation { name, selected } => {
                        format!("({}) notation: {name}", if selected { "•" } else { " " })
                    }
                };
                if idx == model.menu_cursor() {
                    Line::from(text).reversed()
                } else {
                    Line::from(text)
                }
            })
            .collect();
        let area = Self::popup_area(frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(lines).block(Block::bordered().title(" Columns & notation ")),
            area,
        );
    }

    fn draw_popup(title: &str, message: &str, frame: &mut Frame) {
        let area = Self::popup_area(frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(title)),
            area,
        );
    }

    fn popup_area(area: Rect) -> Rect {
        let [area] = Layout::vertical([Constraint::Percentage(POPUP_HEIGHT_PERCENT)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::horizontal([Constraint::Percentage(POPUP_WIDTH_PERCENT)])
            .flex(Flex::Center)
            .areas(area);
        area
    }
}
