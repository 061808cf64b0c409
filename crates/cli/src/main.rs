mod app;
mod watch;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use gamedeck_core::{
    config::{self, AppConfig},
    EventBus, PlayStats,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gamedeck")]
#[command(about = "Scan game libraries and launch games")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan all sources and list the platforms found
    Scan {
        /// Also list the games of every platform
        #[arg(long)]
        games: bool,
    },
    /// Launch a game by platform short name and game title or index
    Launch { platform: String, game: String },
    /// Rescan whenever a game directory or library file changes
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };
    let stats = PlayStats::load(&config.stats_path)?.unwrap_or_default();

    let mut app = app::App::new(config, EventBus::new(), stats);
    match cli.command.unwrap_or(Commands::Scan { games: false }) {
        Commands::Scan { games } => app.scan(games).await,
        Commands::Launch { platform, game } => app.launch(&platform, &game).await,
        Commands::Watch => app.watch().await,
    }
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("gamedeck.log"))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
