mod app;
mod handler;
mod notify;
mod tui;
mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use lumiere_core::{Config, FileStore, HttpBackend, PanelBoard, ViewController};
use tracing_subscriber::EnvFilter;

use app::App;
use handler::handle_event;
use notify::TerminalNotifier;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "lumiere")]
#[command(about = "Terminal client for the Lumiere assistant")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides config and LUMIERE_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
    /// Name to act as when none has been chosen yet
    #[arg(long)]
    actor: Option<String>,
    /// Path of the local preferences file
    #[arg(long)]
    store: Option<PathBuf>,
    /// Write the effective settings (including the flags above) to the config file
    #[arg(long)]
    save_config: bool,
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging() {
    let filter = EnvFilter::try_from_env("LUMIERE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = Config::config_dir().ok().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("lumiere.log"))
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut config = Config::load()?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if cli.actor.is_some() {
        config.actor = cli.actor;
    }
    if cli.save_config {
        config.save()?;
        tracing::info!(base_url = %config.base_url, "config saved");
    }

    let backend = Arc::new(HttpBackend::new(&config.base_url).with_ask_timeout(config.ask_timeout()));
    let store = match cli.store {
        Some(path) => FileStore::open(&path),
        None => FileStore::open_default()?,
    };
    tracing::info!(base_url = %config.base_url, "starting");

    let mut events = EventHandler::new();
    let notifier = Arc::new(TerminalNotifier::default());
    let controller = ViewController::new(
        backend,
        Box::new(store),
        PanelBoard::new(),
        notifier.clone(),
        config.actor.as_deref(),
    );
    notifier.set_speech(controller.state().tts_enabled);

    let mut app = App::new(&config, controller, notifier, events.poll_sender());
    app.start().await;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    tracing::info!("stopped");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handle_event(app, event).await?;
        app.poll_query_task().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["lumiere", "--base-url", "http://lumiere.local", "--save-config"]).unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://lumiere.local"));
        assert!(cli.save_config);

        let cli = Cli::try_parse_from(["lumiere"]).unwrap();
        assert!(!cli.save_config);
        assert!(cli.store.is_none());
    }
}
