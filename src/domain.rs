use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

pub const APP_NAME: &str = "jobtable";

// Error type shared by the loader, the stores and the terminal front end.
#[derive(Debug)]
pub enum JTError {
    IoError(Error),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
}

impl From<Error> for JTError {
    fn from(err: Error) -> Self {
        JTError::IoError(err)
    }
}

impl From<serde_json::Error> for JTError {
    fn from(err: serde_json::Error) -> Self {
        JTError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct AppConfig {
    pub csv_path: PathBuf,
    #[setters(strip_option)]
    pub columns_path: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub log_file: PathBuf,
    pub event_poll_time: u64,
    pub max_column_width: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            csv_path: PathBuf::from("jobs.csv"),
            columns_path: None,
            state_dir: PathBuf::from(".").join(APP_NAME),
            log_file: PathBuf::from(".").join(APP_NAME).join("jobtable.log"),
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    ToggleHideApplied,
    OpenMenu,
    OpenLink,
    Reload,
    Help,
    Enter,
    Exit,
    Click(u16, u16),
    Resize(u16, u16),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
jobtable - browse job listings

  /            search company and title
  h            hide / show applied jobs
  j k ↑ ↓      move selection
  PgUp PgDn    move by page
  Home End     first / last row
  m  Enter     row actions
  o            open job link
  r            reload the CSV file
  ?            this help
  Esc          close popup / menu
  q            quit
";
