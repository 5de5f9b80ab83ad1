use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
};

use unicode_width::UnicodeWidthStr;

use crate::actions::ROW_ACTIONS;
use crate::columns::ColumnAlign;
use crate::domain::HELP_TEXT;
use crate::model::{Model, Modus};
use crate::projection::{CellKind, ProjectedRow, TableProjection};

pub const CMDLINE_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const TABLE_BORDER_HEIGHT: u16 = 2;
const MENU_MARGIN: u16 = 4;

/// Centered rectangle holding the row action menu inside `area`.
pub fn menu_area(area: Rect) -> Rect {
    let label_width = ROW_ACTIONS
        .iter()
        .map(|a| a.label.width())
        .max()
        .unwrap_or(0) as u16;
    popup_area(area, label_width + MENU_MARGIN, ROW_ACTIONS.len() as u16 + 2)
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = std::cmp::min(width, area.width);
    let height = std::cmp::min(height, area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn alignment(align: ColumnAlign) -> Alignment {
    match align {
        ColumnAlign::Left => Alignment::Left,
        ColumnAlign::Center => Alignment::Center,
        ColumnAlign::Right => Alignment::Right,
    }
}

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [table_area, cmdline_area] =
            Layout::vertical([Constraint::Fill(1), Constraint::Length(CMDLINE_HEIGHT)])
                .areas(frame.area());

        self.draw_table(model, frame, table_area);
        self.draw_cmdline(model, frame, cmdline_area);

        match model.modus() {
            Modus::MENU => self.draw_menu(model, frame),
            Modus::POPUP => self.draw_help(frame),
            Modus::TABLE | Modus::SEARCH => {}
        }
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let projection = model.projection();
        let title = Line::from(vec![
            format!(" {} ", model.dataset_name()).bold(),
            format!("({}) ", projection.visible_count()).into(),
        ]);
        let block = Block::bordered()
            .title(title)
            .title_bottom(Line::from(" ? help ").right_aligned())
            .border_set(border::THICK);

        let header = Row::new(projection.header.iter().map(|h| {
            Cell::from(Line::from(h.label.clone()).alignment(alignment(h.align)))
        }))
        .style(Style::new().bold().underlined())
        .height(TABLE_HEADER_HEIGHT);

        let rows = projection.rows.iter().map(table_row);
        let table = Table::new(rows, widths(projection))
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed());

        let mut state = TableState::default().with_selected(model.selected_row());
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_cmdline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let line = if model.modus() == Modus::SEARCH {
            let input = model.cmdinput();
            let cursor_x = area.x + 1 + cursor_column(&input.input, input.curser_pos);
            frame.set_cursor_position((cursor_x, area.y));
            Line::from(vec!["/".yellow().bold(), Span::raw(input.input.clone())])
        } else {
            let projection = model.projection();
            let mut spans = vec![Span::raw(format!(
                "{}/{} ",
                projection.visible_count(),
                projection.total_count
            ))];
            if !model.view().query.is_empty() {
                spans.push(format!("/{} ", model.view().query).yellow());
            }
            if model.view().hide_applied {
                spans.push("[applied hidden] ".dim());
            }
            spans.push(Span::raw(model.status_message().to_string()));
            Line::from(spans)
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_menu(&self, model: &Model, frame: &mut Frame) {
        let (Some(area), Some(menu)) = (model.menu_area(), model.menu()) else {
            return;
        };
        let items: Vec<ListItem> = ROW_ACTIONS.iter().map(|a| ListItem::new(a.label)).collect();
        let list = List::new(items)
            .block(Block::bordered().title(" Actions "))
            .highlight_style(Style::new().reversed());
        let mut state = ListState::default().with_selected(Some(menu.selected));

        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_help(&self, frame: &mut Frame) {
        let text = Text::from(HELP_TEXT);
        let width = text.width() as u16 + 4;
        let height = text.height() as u16 + 2;
        let area = popup_area(frame.area(), width, height);

        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text).block(
                Block::bordered()
                    .title(Line::from(" Help ").centered())
                    .border_set(border::ROUNDED),
            ),
            area,
        );
    }
}

// Display cells before the `curser_pos`-th character of `input`.
fn cursor_column(input: &str, curser_pos: usize) -> u16 {
    let end = input
        .char_indices()
        .nth(curser_pos)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(input.len());
    u16::try_from(input[..end].width()).unwrap_or(u16::MAX)
}

fn widths(projection: &TableProjection) -> Vec<Constraint> {
    projection
        .header
        .iter()
        .map(|h| Constraint::Length(h.width))
        .collect()
}

fn table_row(row: &ProjectedRow) -> Row<'_> {
    let cells = row.cells.iter().map(|cell| {
        let line = match cell.kind {
            CellKind::Link => Line::from(cell.text.as_str().blue().underlined()),
            CellKind::Sequence => Line::from(cell.text.as_str().dim()),
            CellKind::Text => Line::from(cell.text.as_str()),
        };
        Cell::from(line.alignment(alignment(cell.align)))
    });
    let style = if row.applied {
        Style::new().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
    } else {
        Style::new()
    };
    Row::new(cells).style(style)
}
