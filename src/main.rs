use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, File};
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod app;
mod app_event;
mod bulk_log;
mod cache;
mod config;
mod error;
mod filter;
mod models;
mod provider;
mod ssh_service;
mod ui;

use app::{App, AppOptions};
use config::ConfigManager;
use ssh_service::{CommandRunner, SshRunner};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Browse groups of SSH hosts, connect to one, or run a command on many.
#[derive(Parser, Debug)]
#[command(name = "sshgrid", version, about)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Remove every cached inventory and exit
    #[arg(long)]
    clear_cache: bool,

    /// Always fetch from providers, ignoring the cache
    #[arg(long)]
    no_cache: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let log_file = init_logging(args.verbose)?;
    debug!("Logging to {:?}", log_file);

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };
    let config = manager
        .load_config()
        .with_context(|| format!("Failed to load config from {:?}", manager.config_path()))?;

    if args.clear_cache {
        let dir = config.cache_settings().dir;
        let removed = cache::clear_all(&dir)?;
        println!("Cache cleared successfully ({} entries removed from {})", removed, dir.display());
        return Ok(());
    }

    let cache = (config.cache_enabled() && !args.no_cache).then(|| config.cache_settings());
    let providers = provider::build_providers(&config.provider_configs(), cache.as_ref(), ask_use_stale)
        .context("Failed to set up providers")?;

    let options = AppOptions {
        exclusions: config.exclusions(),
        bulk_log_dir: config.bulk_log_dir(),
        palette: config.palette(),
    };
    let runner: Arc<dyn CommandRunner> = Arc::new(SshRunner::default());

    let mut session_error: Option<String> = None;
    loop {
        let mut app = App::new(providers.clone(), Arc::clone(&runner), options.clone());
        match session_error.take() {
            Some(err) => app = app.with_error(err),
            None => app.reload(),
        }

        let app = run_session(app).await?;
        let Some(host) = app.choice.as_ref() else {
            break;
        };

        let user = app.custom_username.as_deref();
        match user {
            Some(user) => println!("Connecting to {} ({}) as {}...", host.name, host.hostname, user),
            None => println!("Connecting to {} ({})...", host.name, host.hostname),
        }
        if let Err(err) = ssh_service::connect(host, user) {
            error!("Session with {} ended with an error: {:#}", host.name, err);
            session_error = Some(format!("{err:#}"));
        }
    }

    info!("Exiting");
    Ok(())
}

fn init_logging(verbose: bool) -> Result<PathBuf> {
    let log_dir = config::data_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let log_file = log_dir.join(format!("sshgrid_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
    let file = File::create(&log_file)
        .with_context(|| format!("Failed to create log file {:?}", log_file))?;

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sshgrid=info"));
    if verbose {
        filter = filter.add_directive("sshgrid=debug".parse()?);
    }

    fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(log_file)
}

/// Asked on stdin before the terminal switches to the browser.
fn ask_use_stale(name: &str, age: Duration) -> bool {
    println!("Cache for {} expired {} ago.", name, format_age(age));
    print!("Use expired cache? [y/N]: ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn format_age(age: Duration) -> String {
    let minutes = (age.as_secs() + 30) / 60;
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h{m}m"),
    }
}

/// Run one browser session on the alternate screen and hand the finished
/// state back.
async fn run_session(mut app: App) -> Result<App> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    restore_terminal(&mut terminal)?;
    res?;
    Ok(app)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    app.set_terminal_width(terminal.size()?.width);

    loop {
        app.process_events();
        terminal.draw(|f| ui::draw::<B>(f, app))?;

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Resize(width, _) => app.set_terminal_width(width),
                _ => {}
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
