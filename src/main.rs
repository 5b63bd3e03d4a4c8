//! CLI entry point for the download-target tool.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use download_target::{
    DownloadSnapshot, LocalDelegate, TargetDeterminer, default_download_dir, load_config,
};
use tokio::sync::oneshot;
use tracing::{debug, info};

mod cli;

use cli::Args;

/// Exit status when the determination was interrupted.
const EXIT_INTERRUPTED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = load_config(args.config.as_deref()).context("Failed to load config")?;
    let prefs = Arc::new(config.to_prefs(&default_download_dir()));
    info!(download_dir = %prefs.download_dir().display(), "preferences loaded");

    let raw = tokio::fs::read_to_string(&args.snapshot)
        .await
        .with_context(|| format!("Failed to read snapshot '{}'", args.snapshot.display()))?;
    let snapshot: DownloadSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot '{}'", args.snapshot.display()))?;

    let delegate = Arc::new(
        LocalDelegate::new(args.prompt_response.into())
            .with_dangerous_hosts(config.dangerous_hosts()),
    );

    let (tx, rx) = oneshot::channel();
    let _cancel = TargetDeterminer::start(
        Arc::new(snapshot),
        args.initial_path,
        args.conflict_action.into(),
        prefs,
        delegate,
        move |result| {
            let _ = tx.send(result);
        },
    );
    let result = rx
        .await
        .context("Target determination ended without a result")?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    }
}
