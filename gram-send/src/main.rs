//! gram-send - Background daemon for scheduled media posting
//!
//! Picks a random file from the media directory, stages it at a public URL,
//! publishes it, cleans up and idles for a few hours. Repeats until signalled.

use clap::Parser;
use libgramcast::config::Config;
use libgramcast::cycle::{CycleReport, CycleRunner};
use libgramcast::error::TokenError;
use libgramcast::graph;
use libgramcast::logging::{LogFormat, LoggingConfig};
use libgramcast::token::TokenStore;
use libgramcast::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "gram-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled media posting")]
#[command(long_about = "\
gram-send - Background daemon for scheduled media posting

DESCRIPTION:
    gram-send runs the posting cycle in a loop. Each cycle picks a random
    file from the media directory, uploads it to the staging server over
    SFTP, checks that its public URL answers, and publishes it through the
    graph API: images as a feed post followed by a story, videos as reels.
    The staged copy and the local file are removed afterwards and the daemon
    idles for a random 150-300 minutes (configurable).

    Oversized files are skipped and the next file is tried right away.

USAGE:
    # Run in foreground (logs to stderr)
    gram-send

    # Run a single cycle and exit
    gram-send --once

    # First start with a freshly issued token
    gram-send --bootstrap-token EAAG...

    # Enable verbose logging
    gram-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current step, then
                      cleans up any staged file)

CONFIGURATION:
    Configuration file: ~/.config/gramcast/config.toml (or $GRAMCAST_CONFIG)
    Token state:        ~/.local/share/gramcast/token.json

    [schedule]
    cycle_delay = { min_minutes = 150, max_minutes = 300 }
    settle_delay = { min_minutes = 1, max_minutes = 3 }
    poll_interval_secs = 60

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error (including a missing or expiring token)
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    #[arg(help = "Configuration file (default: $GRAMCAST_CONFIG or ~/.config/gramcast/config.toml)")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Log output format
    #[arg(long, value_name = "FORMAT")]
    #[arg(help = "Log format: text, json or pretty (default: $GRAMCAST_LOG_FORMAT or text)")]
    log_format: Option<LogFormat>,

    /// Run a single cycle and exit
    #[arg(long)]
    #[arg(help = "Run one cycle and exit without idling")]
    once: bool,

    /// Token to validate and save when no token state exists yet
    #[arg(long, env = "GRAMCAST_BOOTSTRAP_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    #[arg(help = "Access token to adopt if no token file exists yet")]
    bootstrap_token: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    info!("gram-send daemon starting");
    info!(
        media_dir = %config.media_directory().display(),
        min_delay = config.schedule.cycle_delay.min_minutes,
        max_delay = config.schedule.cycle_delay.max_minutes,
        max_image_mb = config.media.max_image_mb,
        max_video_mb = config.media.max_video_mb,
        "Configuration loaded"
    );

    let http = graph::http_client(config.graph.timeout_secs)?;
    let tokens = TokenStore::open(&config, http.clone(), cli.bootstrap_token.clone()).await?;

    if tokens.valid_token().await.is_none() {
        error!(
            "No valid access token at {}. Generate a short-lived token in the \
             Graph API explorer and run gram-setup to exchange it.",
            tokens.path().display()
        );
        return Err(TokenError::Missing.into());
    }
    if let Some(expires_at) = tokens.expires_at().await {
        info!(%expires_at, "Valid token available");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let runner = CycleRunner::from_config(&config, Arc::new(tokens), http);

    match runner.run(&shutdown, cli.once).await {
        Some(report) => log_report(&report),
        None => info!("gram-send daemon stopped"),
    }

    Ok(())
}

fn log_report(report: &CycleReport) {
    match report {
        CycleReport::NoFile => info!("No file to post"),
        CycleReport::Rejected { file_name, reason } => {
            info!(file = %file_name, "Skipped: {}", reason)
        }
        CycleReport::StagingFailed { file_name, error } => {
            info!(file = %file_name, "Staging failed: {}", error)
        }
        CycleReport::Unreachable { remote_name, .. } => {
            info!(remote = %remote_name, "Staged file was not reachable")
        }
        CycleReport::Posted(post) => match &post.post {
            Ok(id) => info!(file = %post.file_name, %id, "Posted"),
            Err(e) => info!(file = %post.file_name, "Post failed: {}", e),
        },
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::sync::atomic::Ordering;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
