use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod replay;

/// Replay a recorded room visit through the moodroom client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Replay script (JSON)
    #[arg(short, long)]
    pub script: PathBuf,

    /// Client configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host; selects the token and media endpoints
    #[arg(long)]
    pub host: Option<String>,

    /// Room name (overrides the script)
    #[arg(short, long)]
    pub room: Option<String>,

    /// Participant name (overrides the script)
    #[arg(short, long)]
    pub participant: Option<String>,

    /// Write each tile's final overlay as PNG into this directory
    #[arg(long)]
    pub overlay_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG=debug shows every detection cycle
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .init();

    info!("Moodroom replay v{}", env!("CARGO_PKG_VERSION"));

    match app::run(args).await {
        Ok(()) => {
            info!("Moodroom replay exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}
