//! adledger CLI - campaign sync, record merging and conflict checks.
//!
//! # Usage
//!
//! ```bash
//! # Sync two accounts with insights for January
//! adledger sync -a act_123 -a 456 --insights --since 2024-01-01 --until 2024-01-31 -o sync.json
//!
//! # Merge a file-imported bundle with an API bundle
//! adledger merge --file-bundle file.json --api-bundle api.json --policy api_priority -o merged.json
//!
//! # Check orders against ad spend
//! adledger conflicts --orders-a network_a.json --orders-b network_b.json --ad-spend spend.json
//! ```
//!
//! # Commands
//!
//! - `sync` - Fetch campaigns (and insights) for ad accounts
//! - `merge` - Reconcile two record bundles
//! - `conflicts` - Detect cross-platform date and ROI conflicts
//!
//! Logging follows `RUST_LOG` (default `adledger=info`); set
//! `ADLEDGER_LOG_JSON` for JSON output.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "adledger")]
#[command(author, version, about = "Ad platform campaign sync and reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync campaigns from the ad platform
    Sync(commands::sync::SyncArgs),
    /// Merge a file-imported bundle with an API bundle
    Merge(commands::merge::MergeArgs),
    /// Detect cross-platform conflicts between orders and ad spend
    Conflicts(commands::conflicts::ConflictsArgs),
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "adledger=info".into());

    let json = std::env::var("ADLEDGER_LOG_JSON").is_ok();
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sync(args) => commands::sync::run(args).await?,
        Commands::Merge(args) => commands::merge::run(args).await?,
        Commands::Conflicts(args) => commands::conflicts::run(args).await?,
    }
    Ok(())
}
