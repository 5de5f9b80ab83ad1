//! Pure projection of rows through the column configuration into display
//! cells. The terminal adapter in `ui` only paints what is produced here.

use unicode_width::UnicodeWidthStr;

use crate::columns::{ColumnAlign, ColumnConfig, ColumnResolver, ColumnWidth};
use crate::dataset::{Dataset, FieldRoles, Row};

/// Visible label of every link cell.
pub const LINK_LABEL: &str = "Open";
pub const SEQUENCE_LABEL: &str = "#";
pub const COLUMN_WIDTH_MARGIN: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Link,
    Sequence,
}

/// A visible column: header position plus its resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub index: usize,
    pub label: String,
    pub config: ColumnConfig,
    pub kind: ColumnKind,
}

/// The visible columns in header order, resolved once per load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableLayout {
    columns: Vec<ColumnLayout>,
}

impl TableLayout {
    pub fn resolve(dataset: &Dataset, resolver: &ColumnResolver) -> Self {
        let roles = dataset.roles();
        let columns = dataset
            .header()
            .iter()
            .enumerate()
            .map(|(index, field)| (index, field, resolver.resolve(&field.key)))
            .filter(|(_, _, config)| !config.hide)
            .map(|(index, field, config)| {
                let kind = if roles.link == Some(index) {
                    ColumnKind::Link
                } else if config.display_name.as_deref() == Some(SEQUENCE_LABEL) {
                    ColumnKind::Sequence
                } else {
                    ColumnKind::Text
                };
                ColumnLayout {
                    index,
                    label: config.label(&field.raw).to_string(),
                    config,
                    kind,
                }
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnLayout] {
        &self.columns
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub label: String,
    pub width: u16,
    pub align: ColumnAlign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    Text,
    Sequence,
    Link,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub align: ColumnAlign,
    pub kind: CellKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    /// Index of the row in the dataset.
    pub data_idx: usize,
    pub link: Option<String>,
    pub applied: bool,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableProjection {
    pub header: Vec<HeaderCell>,
    pub rows: Vec<ProjectedRow>,
    pub total_count: usize,
}

impl TableProjection {
    /// Number shown in the count label.
    pub fn visible_count(&self) -> usize {
        self.rows.len()
    }
}

fn project_cell(column: &ColumnLayout, row: &Row, position: usize) -> Cell {
    let value = row.get(column.index).unwrap_or("");
    let (text, kind) = match column.kind {
        ColumnKind::Link if !value.is_empty() => (LINK_LABEL.to_string(), CellKind::Link),
        ColumnKind::Link | ColumnKind::Text => (value.to_string(), CellKind::Text),
        ColumnKind::Sequence => ((position + 1).to_string(), CellKind::Sequence),
    };
    Cell {
        text,
        align: column.config.column_align,
        kind,
    }
}

fn project_row(
    layout: &TableLayout,
    roles: &FieldRoles,
    row: &Row,
    data_idx: usize,
    position: usize,
    is_applied: &impl Fn(&str) -> bool,
) -> ProjectedRow {
    let link = row.link(roles).map(str::to_string);
    ProjectedRow {
        data_idx,
        applied: link.as_deref().is_some_and(is_applied),
        link,
        cells: layout
            .columns()
            .iter()
            .map(|column| project_cell(column, row, position))
            .collect(),
    }
}

// Same rule as the viewer's column sizing: content plus margin, capped.
fn column_width(column: &ColumnLayout, rows: &[ProjectedRow], col: usize, max_width: u16) -> u16 {
    match column.config.column_width {
        ColumnWidth::Cells(cells) => cells,
        ColumnWidth::Auto => {
            let content = rows
                .iter()
                .map(|r| r.cells[col].text.width())
                .chain(std::iter::once(column.label.width()))
                .max()
                .unwrap_or(0);
            let width = u16::try_from(content).unwrap_or(u16::MAX);
            std::cmp::min(width.saturating_add(COLUMN_WIDTH_MARGIN), max_width)
        }
    }
}

/// Project the `visible` rows (indices into the dataset, in display order).
/// Sequence cells show the 1-based position within `visible`.
pub fn project(
    dataset: &Dataset,
    layout: &TableLayout,
    visible: &[usize],
    is_applied: impl Fn(&str) -> bool,
    max_column_width: u16,
) -> TableProjection {
    let rows: Vec<ProjectedRow> = visible
        .iter()
        .enumerate()
        .map(|(position, &data_idx)| {
            project_row(
                layout,
                dataset.roles(),
                &dataset.rows()[data_idx],
                data_idx,
                position,
                &is_applied,
            )
        })
        .collect();

    let header = layout
        .columns()
        .iter()
        .enumerate()
        .map(|(col, column)| HeaderCell {
            label: column.label.clone(),
            width: column_width(column, &rows, col, max_column_width),
            align: column.config.column_align,
        })
        .collect();

    TableProjection {
        header,
        rows,
        total_count: dataset.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnOverride;
    use std::collections::HashMap;

    const JOBS: &str = "S.No,Company,Job title,Job link,Match percentage,Notes\n\
                        1,Acme,\"Senior, Eng\",http://a,90,\n\
                        2,Globex,Intern,http://b,40,x\n\
                        3,Initech,Eng,http://c,70,\n\
                        4,Hooli";

    fn texts(row: &ProjectedRow) -> Vec<&str> {
        row.cells.iter().map(|c| c.text.as_str()).collect()
    }

    fn setup() -> (Dataset, TableLayout) {
        let ds = Dataset::load(JOBS);
        let layout = TableLayout::resolve(&ds, &ColumnResolver::builtin());
        (ds, layout)
    }

    #[test]
    fn hidden_columns_are_left_out_in_header_order() {
        let (_, layout) = setup();
        let labels: Vec<&str> = layout.columns().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["#", "Company", "Title", "Link", "Notes"]);
        let kinds: Vec<ColumnKind> = layout.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Sequence,
                ColumnKind::Text,
                ColumnKind::Text,
                ColumnKind::Link,
                ColumnKind::Text
            ]
        );
    }

    #[test]
    fn projects_cells() {
        let (ds, layout) = setup();
        let table = project(&ds, &layout, &[0, 1], |_| false, 40);
        assert_eq!(texts(&table.rows[0]), vec!["1", "Acme", "Senior, Eng", "Open", ""]);
        assert_eq!(table.rows[0].cells[3].kind, CellKind::Link);
        assert_eq!(table.rows[0].cells[0].align, ColumnAlign::Center);
        assert_eq!(table.rows[1].link.as_deref(), Some("http://b"));
        assert_eq!(table.visible_count(), 2);
        assert_eq!(table.total_count, 4);
    }

    #[test]
    fn numbers_rows_by_visible_position() {
        let (ds, layout) = setup();
        // The third data row is the second visible row.
        let table = project(&ds, &layout, &[0, 2], |_| false, 40);
        assert_eq!(table.rows[1].data_idx, 2);
        assert_eq!(table.rows[1].cells[0].text, "2");
    }

    #[test]
    fn short_rows_render_blank_cells() {
        let (ds, layout) = setup();
        let table = project(&ds, &layout, &[3], |_| false, 40);
        assert_eq!(texts(&table.rows[0]), vec!["1", "Hooli", "", "", ""]);
        assert_eq!(table.rows[0].cells[3].kind, CellKind::Text);
        assert_eq!(table.rows[0].link, None);
    }

    #[test]
    fn marks_applied_rows() {
        let (ds, layout) = setup();
        let table = project(&ds, &layout, &[0, 1, 2, 3], |l| l == "http://b", 40);
        let applied: Vec<bool> = table.rows.iter().map(|r| r.applied).collect();
        assert_eq!(applied, vec![false, true, false, false]);
    }

    #[test]
    fn unknown_headers_use_raw_label_and_auto_width() {
        let (ds, layout) = setup();
        let table = project(&ds, &layout, &[0, 1], |_| false, 40);
        let notes = &table.header[4];
        assert_eq!(notes.label, "Notes");
        assert_eq!(notes.width, "Notes".len() as u16 + COLUMN_WIDTH_MARGIN);
        assert_eq!(notes.align, ColumnAlign::Left);
        // Fixed widths come from the configuration.
        assert_eq!(table.header[0].width, 4);
    }

    #[test]
    fn auto_width_counts_display_cells() {
        let ds = Dataset::load("company\n東京株式会社\nAcme");
        let layout = TableLayout::resolve(&ds, &ColumnResolver::builtin());
        let auto = TableLayout::resolve(
            &ds,
            &ColumnResolver::builtin().with_overrides(HashMap::from([(
                "company".to_string(),
                ColumnOverride::default(),
            )])),
        );
        // Six wide characters take twelve cells.
        let table = project(&ds, &auto, &[0, 1], |_| false, 40);
        assert_eq!(table.header[0].width, 12 + COLUMN_WIDTH_MARGIN);
        // The built-in entry pins the company width.
        let table = project(&ds, &layout, &[0, 1], |_| false, 40);
        assert_eq!(table.header[0].width, 16);
    }

    #[test]
    fn auto_width_is_capped() {
        let ds = Dataset::load("blurb\naaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let layout = TableLayout::resolve(&ds, &ColumnResolver::builtin());
        let table = project(&ds, &layout, &[0], |_| false, 12);
        assert_eq!(table.header[0].width, 12);
    }

    #[test]
    fn custom_sequence_column() {
        let ds = Dataset::load("rank,company\n7,Acme\n9,Globex");
        let overrides = HashMap::from([(
            "rank".to_string(),
            ColumnOverride {
                display_name: Some("#".into()),
                ..Default::default()
            },
        )]);
        let resolver = ColumnResolver::builtin().with_overrides(overrides);
        let layout = TableLayout::resolve(&ds, &resolver);
        let table = project(&ds, &layout, &[1], |_| false, 40);
        assert_eq!(texts(&table.rows[0]), vec!["1", "Globex"]);
    }

    #[test]
    fn empty_dataset_projects_nothing() {
        let ds = Dataset::empty();
        let layout = TableLayout::resolve(&ds, &ColumnResolver::builtin());
        let table = project(&ds, &layout, &[], |_| false, 40);
        assert!(table.header.is_empty());
        assert_eq!(table.visible_count(), 0);
    }
}
