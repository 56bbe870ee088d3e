mod app;
mod commands;
mod config;
mod db;
mod error;
mod photo;
mod placeholder;
mod records;
mod resolver;
mod scheduler;
mod store;
mod ui;
mod view;

use app::{App, InputMode};
use clap::Parser;
use commands::CommandTable;
use config::Config;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures_util::StreamExt;
use records::RecordStore;
use resolver::Resolver;
use resolver::providers::{INaturalist, Wikipedia};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use store::SeenStore;
use tokio::sync::mpsc::UnboundedReceiver;
use view::ViewController;

/// Browse a bird species catalog and keep track of the ones you have seen
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the JSON species catalog
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Path to the local database (seen markers, photos, image cache)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write debug logs
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize file logging. The TUI owns the terminal, so nothing goes to stderr.
fn init_logging(log_dir: &Path, verbose: bool) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "birdnerd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default = if verbose { "info,birdnerd=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    guard
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let project_dirs = config::project_dirs()?;
    let _log_guard = init_logging(&project_dirs.cache_dir().join("logs"), cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    // Command-line paths are relative to the working directory, not the data dir.
    if let Some(catalog) = cli.catalog {
        config.catalog = Some(std::path::absolute(catalog)?);
    }
    if let Some(db) = cli.db {
        config.database = Some(std::path::absolute(db)?);
    }

    // Resolution tasks and the store are single-threaded; everything runs on
    // this LocalSet.
    let local = tokio::task::LocalSet::new();
    let result = local.run_until(run(config)).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "exiting with error");
    }
    result
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let catalog_path = config.catalog_path()?;
    let records = records::load_catalog(&catalog_path).await.inspect_err(|e| {
        tracing::error!(error = %e, "catalog could not be loaded");
    })?;
    tracing::info!(path = %catalog_path.display(), count = records.len(), "catalog loaded");

    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let database = Rc::new(db::Database::open(&db_path, config.max_photo_bytes).await?);
    let seen = database.all_seen().await?;
    tracing::info!(path = %db_path.display(), seen = seen.len(), "database opened");

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.clone())
        .build()?;
    let resolver = Resolver::new(
        Rc::clone(&database),
        INaturalist::new(client.clone(), &config.inaturalist_url),
        Wikipedia::new(client, &config.wikipedia_url),
    );

    let grid = ViewController::new(RecordStore::new(records).with_seen(seen), config.page_step);
    let (mut app, rx) = App::new(grid, database, resolver, config.look_ahead_rows, config.photo());
    let commands = App::command_table()?;

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    app.set_terminal_height(size.height);

    let result = run_app(&mut terminal, &mut app, &commands, rx).await;

    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
    commands: &CommandTable<App>,
    mut rx: UnboundedReceiver<app::AppMessage>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        terminal.draw(|frame| ui::render(app, commands, frame))?;

        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    handle_key(app, commands, key);
                }
                Some(Ok(Event::Resize(_, height))) => app.set_terminal_height(height),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            Some(message) = rx.recv() => app.handle_message(message),
            _ = tick.tick() => app.expire_toast(Instant::now()),
        }
    }
}

fn handle_key(app: &mut App, commands: &CommandTable<App>, key: KeyEvent) {
    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // If help is showing, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    match app.input_mode {
        InputMode::EditingQuery => handle_query_input(app, key),
        InputMode::PhotoPath => handle_path_input(app, key),
        InputMode::Normal => {
            commands.dispatch(app, key);
        }
    }
}

fn handle_query_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Backspace => app.pop_query_char(),
        KeyCode::Char(c) => app.push_query_char(c),
        _ => {}
    }
}

fn handle_path_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_photo_path(),
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Backspace => {
            app.path_input.pop();
        }
        KeyCode::Char(c) => app.path_input.push(c),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    #[tokio::test]
    async fn test_unreadable_catalog_is_returned_to_main() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            catalog: Some(dir.path().join("absent.json")),
            database: Some(dir.path().join("birdnerd.db")),
            ..Config::default()
        };

        let err = tokio::task::LocalSet::new().run_until(run(config)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CatalogError>(), Some(CatalogError::Read { .. })));
        // Nothing past the catalog was touched.
        assert!(!dir.path().join("birdnerd.db").exists());
    }
}
