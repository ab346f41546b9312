//! checkpoint-strip CLI
//!
//! Reads configuration from the environment (and `.env`), renders one image
//! per checkpoint through ComfyUI, and writes the labeled comparison strip.

use std::path::PathBuf;

use anyhow::{Context, Result};
use checkpoint_strip::{FontLabeler, StripConfig, SweepRun, TokioClock};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Render every finetune checkpoint through ComfyUI and build a comparison strip
#[derive(Parser, Debug)]
#[command(name = "checkpoint-strip")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Fail compositing if any checkpoint has no output image
    #[arg(long)]
    strict: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Message to log for the default `.env` lookup; a missing file is not worth one.
fn env_file_warning(result: dotenv::Result<PathBuf>) -> Option<String> {
    match result {
        Ok(_) => None,
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(e.to_string()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_warning = match &cli.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Cannot load env file {}", path.display()))?;
            None
        }
        None => env_file_warning(dotenv::dotenv()),
    };

    init_logging(&cli.log_level)?;
    if let Some(reason) = env_warning {
        warn!("Ignoring .env file: {}", reason);
    }

    let mut config = StripConfig::from_env().context("Invalid configuration")?;
    config.strict |= cli.strict;

    let labeler = FontLabeler::from_file(&config.font_path, config.label_font_size)
        .context("Cannot load label font")?;

    let run = SweepRun::new(&config, TokioClock, labeler);
    info!(run = %run.run_stamp(), endpoint = %config.api_endpoint, "Starting checkpoint sweep");

    let report = run.execute().await?;

    info!(
        checkpoints = report.checkpoints.len(),
        queued = report.queued.len(),
        failed = report.failed.len(),
        strip = ?report.strip,
        "Sweep finished"
    );
    Ok(())
}
