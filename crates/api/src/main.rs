//! Microsleep Monitor - Main Entry Point

use std::path::PathBuf;

use api::{init_logging, run, AppConfig};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Webcam microsleep detection")]
struct Args {
    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Override the API bind address
    #[clap(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    init_logging(&config.logging)?;

    info!("=== Microsleep Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Alarm after {}s of closed eyes (confidence >= {})",
        config.tracker.alarm_duration_seconds, config.tracker.confidence_threshold
    );

    run(config).await?;

    Ok(())
}
