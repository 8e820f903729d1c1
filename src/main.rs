//! livescroll-news: an infinite-scroll news reader for the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────────────┐ watch<ListState> ┌──────────┐  draw()  ┌──────────┐
//! │ ListStateMachine │ ───────────────► │  app.rs  │ ───────► │  ui.rs   │
//! └──────────────────┘                  │ (state)  │          │ (render) │
//!          ▲ Action                     └──────────┘          └──────────┘
//!          │                              ▲      ▲
//! ┌──────────┐ handle_key_event()         │      │ ThumbMsg (channel)
//! │ input.rs │ ───────────────────────────┘ ┌───────────┐
//! └──────────┘                              │ loader.rs │ ──► ImageCache
//!                                           └───────────┘
//! ```
//!
//! * **`app`**: owns UI state (latest snapshot, selection, search text,
//!   thumbnail status).
//! * **`ui`**: pure rendering: reads `App` state and draws widgets.
//! * **`input`**: maps key events to `App` mutations and [`Action`]s.
//! * **`loader`**: runs thumbnail requests in the background.
//! * **`main`**: wires everything together: parse args, load config, set
//!   up the terminal, and run the event loop.

mod app;
mod input;
mod loader;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use livescroll_news::config;
use livescroll_news::source::HttpNewsSource;
use livescroll_news::{BrowserRouter, DetailRouter, ImageCache, ListStateMachine};

use app::App;
use input::Action;

#[derive(Parser)]
#[command(name = "livescroll-news", about = "Infinite-scroll news reader for the terminal")]
struct Cli {
    /// Feed endpoint; pages are fetched from `{base_url}/{page}/{page_size}`
    #[arg(long)]
    base_url: Option<String>,

    /// Number of items requested per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Config file (defaults to $XDG_CONFIG_HOME/livescroll-news/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output file path (enables logging when specified)
    #[arg(long)]
    log: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// RAII terminal guard with idiomatic cleanup even on panic
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before printing a panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// The terminal is in raw mode, so logs only go to a file.
fn init_logging(path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
    Ok(())
}

/// Run a list operation without blocking the UI loop.
fn spawn_list_action(machine: &Arc<ListStateMachine>, action: Action) {
    let machine = Arc::clone(machine);
    tokio::spawn(async move {
        match action {
            Action::FetchNext => machine.fetch_next().await,
            Action::Reload => machine.reload().await,
            _ => {}
        }
    });
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;

    // -- configuration -------------------------------------------------------
    let mut cfg = config::load_config(cli.config.as_deref())?;
    cfg.merge_cli(cli.base_url, cli.page_size);
    let config = cfg.resolve();

    // -- core components -----------------------------------------------------
    let source = HttpNewsSource::new(&config.feed.base_url, config.feed.timeout)?;
    let cache = ImageCache::new(
        Arc::new(source.byte_source()),
        config.images.capacity,
        config.images.max_pixel_size,
    );
    let machine = Arc::new(ListStateMachine::new(
        Arc::new(source),
        config.feed.list_options(),
    ));
    let router = BrowserRouter;

    let mut states = machine.subscribe();
    let (thumb_tx, mut thumb_rx) = mpsc::unbounded_channel::<loader::ThumbMsg>();

    // -- terminal setup (RAII: Drop restores on exit or panic) --------------
    install_panic_hook();
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new();

    info!("starting against {}", config.feed.base_url);
    spawn_list_action(&machine, Action::FetchNext);

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps (100 ms tick).  Each iteration:
    //   1. Take the latest list state and any finished thumbnails.
    //   2. Render the UI.
    //   3. Request / withdraw thumbnails for the rows now on screen.
    //   4. Handle pending keyboard input.
    let mut ticker = tokio::time::interval(Duration::from_millis(100));

    loop {
        // 1. Process state changes
        if states.has_changed().unwrap_or(false) {
            let state = states.borrow_and_update().clone();
            app.apply_state(state);
        }
        while let Ok(msg) = thumb_rx.try_recv() {
            app.thumb_loaded(msg.key, msg.result);
        }

        // 2. Render
        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        // 3. Thumbnails
        let plan = app.sync_thumbnails();
        for (key, token) in plan.cancel {
            cache.cancel(&key, &token);
        }
        for (key, token) in plan.start {
            loader::spawn(&cache, key, token, thumb_tx.clone());
        }

        // 4. Handle input
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            match input::handle_key_event(&mut app, key) {
                Action::None => {}
                Action::Search(query) => machine.search(&query),
                Action::OpenSelected => {
                    let item = app.selected_entry().and_then(|entry| machine.item(entry.id));
                    if let Some(item) = item {
                        if let Err(e) = router.open_details(&item) {
                            warn!("{e:#}");
                            app.status = format!("Error: {e:#}");
                        }
                    }
                }
                action => spawn_list_action(&machine, action),
            }
        }

        if app.quit {
            break;
        }
        ticker.tick().await;
    }

    // `guard` is dropped here, restoring the terminal.
    Ok(())
}
