use std::time::Instant;

use ratatui::crossterm::event::KeyEvent;
use ratatui::layout::Rect;
use tracing::{debug, error, info, trace, warn};

use crate::actions::{ActionEffect, ActionMenu, ROW_ACTIONS, RowAction};
use crate::columns::ColumnResolver;
use crate::dataset::{Dataset, TextSource};
use crate::domain::{AppConfig, JTError, Message};
use crate::filter::{ViewState, visible_rows};
use crate::inputter::{InputResult, Inputter};
use crate::projection::{TableLayout, TableProjection, project};
use crate::store::{AppliedStore, KeyValueStore, Preferences};
use crate::ui::{CMDLINE_HEIGHT, TABLE_BORDER_HEIGHT, TABLE_HEADER_HEIGHT, menu_area};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    SEARCH,
    MENU,
    POPUP,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: u16,
    pub height: u16,
    pub table_height: u16,
}

impl UILayout {
    pub fn from_values(width: u16, height: u16) -> Self {
        let table_height = height
            .saturating_sub(CMDLINE_HEIGHT)
            .saturating_sub(TABLE_HEADER_HEIGHT)
            .saturating_sub(TABLE_BORDER_HEIGHT);
        let layout = UILayout {
            width,
            height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }

    pub fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// Application state: dataset, persisted annotations, view state and the
/// projection the UI draws.
pub struct Model {
    config: AppConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: Box<dyn TextSource>,
    resolver: ColumnResolver,
    dataset: Dataset,
    layout: TableLayout,
    applied: AppliedStore,
    prefs: Preferences,
    view: ViewState,
    visible: Vec<usize>,
    projection: TableProjection,
    selected_row: usize,
    menu: Option<ActionMenu>,
    input: Inputter,
    last_input: InputResult,
    uilayout: UILayout,
    status_message: String,
}

impl Model {
    /// Load the persisted state, then fetch and parse the dataset, then build
    /// the first projection. Nothing is drawn before all three are done.
    pub fn init<S>(
        config: &AppConfig,
        resolver: ColumnResolver,
        store: S,
        source: Box<dyn TextSource>,
        ui_width: u16,
        ui_height: u16,
    ) -> Result<Self, JTError>
    where
        S: KeyValueStore + Clone + 'static,
    {
        let mut applied = AppliedStore::new(Box::new(store.clone()));
        applied.load_all();
        let prefs = Preferences::load(Box::new(store));

        let dataset = Dataset::load(&*source);
        let layout = TableLayout::resolve(&dataset, &resolver);

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source,
            resolver,
            dataset,
            layout,
            applied,
            view: ViewState {
                query: String::new(),
                hide_applied: prefs.hide_applied(),
            },
            prefs,
            visible: Vec::new(),
            projection: TableProjection::default(),
            selected_row: 0,
            menu: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            uilayout: UILayout::from_values(ui_width, ui_height),
            status_message: String::new(),
        };
        model.refresh();
        model.set_status_message(format!(
            "Loaded {} jobs, {} applied",
            model.dataset.len(),
            model.applied.entries().values().filter(|&&a| a).count()
        ));
        Ok(model)
    }

    // Re-derive the visible rows from the full dataset and project them.
    fn refresh(&mut self) {
        let start_time = Instant::now();
        let applied = &self.applied;
        let visible = visible_rows(
            self.dataset.rows(),
            self.dataset.roles(),
            &self.view,
            |link| applied.get(link),
        );
        self.projection = project(
            &self.dataset,
            &self.layout,
            &visible,
            |link| applied.get(link),
            self.config.max_column_width,
        );
        self.visible = visible;
        self.selected_row = std::cmp::min(self.selected_row, self.visible.len().saturating_sub(1));
        trace!(
            "Refresh: query {:?}, hide {}, {}/{} rows in {}us",
            self.view.query,
            self.view.hide_applied,
            self.visible.len(),
            self.dataset.len(),
            start_time.elapsed().as_micros()
        );
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    pub fn projection(&self) -> &TableProjection {
        &self.projection
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn menu(&self) -> Option<&ActionMenu> {
        self.menu.as_ref()
    }

    pub fn selected_row(&self) -> Option<usize> {
        if self.visible.is_empty() {
            None
        } else {
            Some(self.selected_row)
        }
    }

    pub fn dataset_name(&self) -> &str {
        self.dataset.name()
    }

    pub fn cmdinput(&self) -> &InputResult {
        &self.last_input
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn uilayout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn is_applied(&self, link: &str) -> bool {
        self.applied.get(link)
    }

    /// Whether key events go to the query line instead of being mapped.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::SEARCH
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), JTError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        if let Message::Resize(width, height) = msg {
            self.ui_resize(width, height);
            return Ok(());
        }

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection_up(1),
                Message::MoveDown => self.move_selection_down(1),
                Message::MovePageUp => self.move_selection_up(self.page_size()),
                Message::MovePageDown => self.move_selection_down(self.page_size()),
                Message::MoveBeginning => self.selected_row = 0,
                Message::MoveEnd => self.selected_row = self.visible.len().saturating_sub(1),
                Message::Search => self.enter_search_mode(),
                Message::ToggleHideApplied => self.toggle_hide_applied(),
                Message::OpenMenu | Message::Enter => self.open_menu(),
                Message::OpenLink => self.run_on_selected("open-link"),
                Message::Reload => self.reload(),
                Message::Help => self.show_help(),
                Message::Exit => self.clear_query(),
                _ => (),
            },
            Modus::SEARCH => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
            Modus::MENU => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.menu_move(true),
                Message::MoveDown => self.menu_move(false),
                Message::Enter => self.invoke_menu_item(),
                Message::OpenMenu => self.open_menu(),
                Message::Exit => self.close_menu(),
                Message::Click(x, y) => self.click_in_menu(x, y),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                _ => (),
            },
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: u16, height: u16) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
    }

    fn page_size(&self) -> usize {
        std::cmp::max(1, self.uilayout.table_height as usize)
    }

    fn move_selection_up(&mut self, size: usize) {
        self.selected_row = self.selected_row.saturating_sub(size);
    }

    fn move_selection_down(&mut self, size: usize) {
        let last = self.visible.len().saturating_sub(1);
        self.selected_row = std::cmp::min(self.selected_row + size, last);
    }

    fn enter_search_mode(&mut self) {
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        self.input.set(&self.view.query);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.input != self.view.query {
            self.view.query = self.last_input.input.clone();
            self.selected_row = 0;
            self.refresh();
        }
        if self.last_input.finished {
            trace!("Search finished with {:?}", self.view.query);
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::SEARCH;
            self.set_status_message(format!(
                "{} of {} jobs match",
                self.visible.len(),
                self.dataset.len()
            ));
        }
    }

    fn clear_query(&mut self) {
        if !self.view.query.is_empty() {
            self.view.query.clear();
            self.input.clear();
            self.last_input = self.input.get();
            self.refresh();
        }
    }

    fn toggle_hide_applied(&mut self) {
        let hide = !self.view.hide_applied;
        // The view only follows once the flag is saved.
        if let Err(e) = self.prefs.set_hide_applied(hide) {
            warn!("Persisting hide applied failed: {e:?}");
            self.set_status_message("Could not save the hide applied setting");
            return;
        }
        self.view.hide_applied = hide;
        self.refresh();
        self.set_status_message(if hide {
            "Hiding applied jobs"
        } else {
            "Showing applied jobs"
        });
    }

    fn open_menu(&mut self) {
        // A new menu always replaces the previous one.
        self.menu = None;
        if let Some(&data_idx) = self.visible.get(self.selected_row) {
            trace!("Open action menu for row {data_idx}");
            self.menu = Some(ActionMenu::new(data_idx));
            if self.modus != Modus::MENU {
                self.previous_modus = self.modus;
            }
            self.modus = Modus::MENU;
        }
    }

    fn close_menu(&mut self) {
        trace!("Close action menu");
        self.menu = None;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::MENU;
    }

    fn menu_move(&mut self, up: bool) {
        if let Some(menu) = self.menu.as_mut() {
            if up { menu.up() } else { menu.down() }
        }
    }

    /// Area the action menu occupies on screen.
    pub fn menu_area(&self) -> Option<Rect> {
        self.menu.map(|_| menu_area(self.uilayout.area()))
    }

    fn click_in_menu(&mut self, x: u16, y: u16) {
        let Some(area) = self.menu_area() else {
            return;
        };
        let inside = x >= area.x && x < area.right() && y >= area.y && y < area.bottom();
        if !inside {
            self.close_menu();
            return;
        }
        // First and last line are the border.
        let item = (y - area.y).checked_sub(1).map(usize::from);
        if let (Some(item), Some(menu)) = (item, self.menu.as_mut())
            && item < ROW_ACTIONS.len()
        {
            menu.selected = item;
            self.invoke_menu_item();
        }
    }

    fn invoke_menu_item(&mut self) {
        if let Some(menu) = self.menu.take() {
            self.close_menu();
            self.run_action(menu.action(), menu.data_idx);
        }
    }

    fn run_on_selected(&mut self, action_id: &str) {
        match (RowAction::by_id(action_id), self.visible.get(self.selected_row)) {
            (Some(action), Some(&data_idx)) => self.run_action(action, data_idx),
            _ => trace!("Nothing selected for {action_id}"),
        }
    }

    // Execute the effect of `action` and re-render.
    fn run_action(&mut self, action: &RowAction, data_idx: usize) {
        let Some(row) = self.dataset.rows().get(data_idx) else {
            error!("Action {} on unknown row {data_idx}!", action.id);
            return;
        };
        let applied = &self.applied;
        let effect = action.apply(row, self.dataset.roles(), |link| applied.get(link));
        debug!("Action {} on row {data_idx}: {:?}", action.id, effect);

        match effect {
            None => self.set_status_message("This job has no link"),
            Some(ActionEffect::SetApplied { link, applied }) => {
                match self.applied.set(&link, applied) {
                    Ok(()) => self.set_status_message(if applied {
                        "Marked as applied"
                    } else {
                        "Marked as not applied"
                    }),
                    Err(e) => {
                        error!("Saving applied status for {link} failed: {e:?}");
                        self.set_status_message("Could not save applied status");
                    }
                }
            }
            Some(ActionEffect::OpenInBrowser(url)) => self.open_link(url),
            Some(ActionEffect::CopyToClipboard(text)) => {
                let message = if copy_to_clipboard(&text) {
                    format!("Copied {text}")
                } else {
                    format!("Could not copy {text}")
                };
                self.set_status_message(message);
            }
        }
        self.refresh();
    }

    fn open_link(&mut self, url: String) {
        let message = match open::that(&url) {
            Ok(()) => format!("Opened {url}"),
            Err(e) => {
                warn!("Opening {url} failed: {e:?}");
                if copy_to_clipboard(&url) {
                    format!("Could not open browser, copied {url}")
                } else {
                    format!("Could not open {url}")
                }
            }
        };
        self.set_status_message(message);
    }

    fn reload(&mut self) {
        info!("Reloading dataset ...");
        self.dataset = Dataset::load(&*self.source);
        self.layout = TableLayout::resolve(&self.dataset, &self.resolver);
        self.menu = None;
        self.refresh();
        self.set_status_message(format!("Reloaded {} jobs", self.dataset.len()));
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }
}

fn copy_to_clipboard(text: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut c| c.set_text(text.to_string())) {
        Ok(()) => {
            trace!("Copied {text} to clipboard.");
            true
        }
        Err(e) => {
            trace!("Error copying to clipboard: {:?}", e);
            false
        }
    }
}
