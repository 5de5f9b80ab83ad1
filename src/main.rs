use std::fs::{self, File};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::DefaultTerminal;
use ratatui::crossterm::execute;
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use jobtable::columns::ColumnResolver;
use jobtable::controller::Controller;
use jobtable::dataset::FileSource;
use jobtable::domain::{APP_NAME, AppConfig, JTError};
use jobtable::model::{Model, Status};
use jobtable::store::StateStore;
use jobtable::ui::TableUI;

/// A tui based viewer for job listing CSV files.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file with one job per line
    #[arg(default_value = "jobs.csv")]
    csv: String,

    /// JSON file with column overrides, keyed by normalized header name
    #[arg(long)]
    columns: Option<String>,

    /// Directory holding the applied states and view preferences
    #[arg(long)]
    state_dir: Option<String>,

    /// Log file, defaults to jobtable.log in the state directory
    #[arg(long)]
    log_file: Option<String>,

    /// Terminal event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Upper bound for automatically sized columns
    #[arg(long, default_value_t = 40)]
    max_column_width: u16,
}

fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}

fn build_config(args: Args) -> AppConfig {
    let state_dir = match args.state_dir.as_deref() {
        Some(dir) => expand(dir),
        None => dirs::data_local_dir()
            .map(|path| path.join(APP_NAME))
            .unwrap_or_else(|| AppConfig::default().state_dir),
    };
    let log_file = args
        .log_file
        .as_deref()
        .map(expand)
        .unwrap_or_else(|| state_dir.join(format!("{APP_NAME}.log")));

    let mut config = AppConfig::default()
        .csv_path(expand(&args.csv))
        .state_dir(state_dir)
        .log_file(log_file)
        .event_poll_time(args.poll_ms)
        .max_column_width(args.max_column_width);
    if let Some(columns) = args.columns.as_deref() {
        config = config.columns_path(expand(columns));
    }
    config
}

fn create_log_file(log_file: &Path) -> Result<File, JTError> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(log_file)?)
}

// Logs go to a file, the terminal belongs to the UI. Without a usable log
// file the viewer runs without logging.
fn start_logging(log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let file_layer = match create_log_file(log_file) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter),
        ),
        Err(e) => {
            eprintln!("Logging disabled, cannot write {:?}: {:?}", log_file, e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), JTError> {
    let config = build_config(Args::parse());
    start_logging(&config.log_file);
    info!("Starting {APP_NAME} with {:?}", config);

    let mut resolver = ColumnResolver::builtin();
    if let Some(path) = config.columns_path.as_deref() {
        match ColumnResolver::load_overrides(path) {
            Ok(overrides) => resolver = resolver.with_overrides(overrides),
            Err(e) => warn!("Ignoring column overrides {:?}: {e:?}", path),
        }
    }
    let store = StateStore::open(&config.state_dir);
    let source = FileSource::new(config.csv_path.clone());

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &config, resolver, store, source);
    // The app may fail half way, the terminal is restored either way.
    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

fn run_app(
    terminal: &mut DefaultTerminal,
    config: &AppConfig,
    resolver: ColumnResolver,
    store: StateStore,
    source: FileSource,
) -> Result<(), JTError> {
    execute!(stdout(), EnableMouseCapture)?;
    let size = terminal.size()?;

    let mut model = Model::init(
        config,
        resolver,
        store,
        Box::new(source),
        size.width,
        size.height,
    )?;
    let ui = TableUI::new();
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye!");
    Ok(())
}
