use crate::dataset::{FieldRoles, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    ToggleApplied,
    OpenLink,
    CopyLink,
}

/// What the model has to do after a row action was chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEffect {
    SetApplied { link: String, applied: bool },
    OpenInBrowser(String),
    CopyToClipboard(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowAction {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: ActionKind,
}

/// The menu shown for every row, in display order.
pub const ROW_ACTIONS: &[RowAction] = &[
    RowAction {
        id: "toggle-applied",
        label: "Toggle status",
        kind: ActionKind::ToggleApplied,
    },
    RowAction {
        id: "open-link",
        label: "Open link",
        kind: ActionKind::OpenLink,
    },
    RowAction {
        id: "copy-link",
        label: "Copy link",
        kind: ActionKind::CopyLink,
    },
];

impl RowAction {
    pub fn by_id(id: &str) -> Option<&'static RowAction> {
        ROW_ACTIONS.iter().find(|a| a.id == id)
    }

    /// Decide the effect of running this action on `row`. Rows without a link
    /// produce no effect.
    pub fn apply(
        &self,
        row: &Row,
        roles: &FieldRoles,
        is_applied: impl Fn(&str) -> bool,
    ) -> Option<ActionEffect> {
        let link = row.link(roles)?;
        let effect = match self.kind {
            ActionKind::ToggleApplied => ActionEffect::SetApplied {
                link: link.to_string(),
                applied: !is_applied(link),
            },
            ActionKind::OpenLink => ActionEffect::OpenInBrowser(link.to_string()),
            ActionKind::CopyLink => ActionEffect::CopyToClipboard(link.to_string()),
        };
        Some(effect)
    }
}

/// The single open row action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMenu {
    /// Dataset index of the row the menu belongs to.
    pub data_idx: usize,
    pub selected: usize,
}

impl ActionMenu {
    pub fn new(data_idx: usize) -> Self {
        Self {
            data_idx,
            selected: 0,
        }
    }

    pub fn up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn down(&mut self) {
        self.selected = std::cmp::min(self.selected + 1, ROW_ACTIONS.len() - 1);
    }

    pub fn action(&self) -> &'static RowAction {
        &ROW_ACTIONS[self.selected]
    }
}
