use anyhow::Result;
use clap::Parser;
use libgramcast::config::Config;
use libgramcast::error::GramcastError;
use libgramcast::graph;
use libgramcast::logging::{LogFormat, LoggingConfig};
use libgramcast::token::TokenStore;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gram-setup")]
#[command(version)]
#[command(about = "Exchange a short-lived access token for a long-lived one", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Short-lived token (prompted for when omitted)
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(LogFormat::Text, "warn".to_string(), cli.verbose).init();
    info!("Starting Gramcast token setup");

    if let Err(e) = run_setup(&cli).await {
        error!("Setup failed: {}", e);
        eprintln!("\n❌ Setup failed: {}", e);
        let code = e
            .downcast_ref::<GramcastError>()
            .map(GramcastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run_setup(cli: &Cli) -> Result<()> {
    println!("\n🔑 Gramcast Token Setup\n");

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    if let Err(e) = config.validate_graph_credentials() {
        println!("The [graph] section still needs real app credentials.");
        println!("Fill in account_id, app_id and app_secret (or set GRAMCAST_APP_SECRET)");
        println!("in your configuration file, then run gram-setup again.\n");
        return Err(e.into());
    }

    let short_lived = match &cli.token {
        Some(token) => token.trim().to_string(),
        None => {
            display_instructions();
            prompt_token()?
        }
    };

    if short_lived.is_empty() {
        return Err(GramcastError::InvalidInput("No token provided".to_string()).into());
    }

    let http = graph::http_client(config.graph.timeout_secs)?;
    let store = TokenStore::new(&config, http);

    println!("Exchanging token...");
    let expires_at = store.exchange_for_long_lived(&short_lived).await?;

    println!("✓ Long-lived token saved to {}", store.path().display());
    println!(
        "✓ Valid until {}",
        expires_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
    );
    println!("\nYou can start posting with: gram-send\n");

    Ok(())
}

fn display_instructions() {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Get a short-lived token");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    println!("  1. Go to https://developers.facebook.com/tools/explorer/");
    println!("  2. Select your app");
    println!("  3. Request a User Access Token with these permissions:");
    println!("     - instagram_basic");
    println!("     - instagram_content_publish");
    println!("     - pages_show_list");
    println!("     - pages_read_engagement");
    println!("  4. Copy the token and paste it below\n");
}

/// Read the token hidden when attached to a terminal, as a plain line otherwise
fn prompt_token() -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        let token = rpassword::prompt_password("Short-lived token: ")?;
        return Ok(token.trim().to_string());
    }

    print!("Short-lived token: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    println!();
    Ok(input.trim().to_string())
}
