//! `adledger conflicts` - compare order files against ad spend.

use std::path::PathBuf;

use adledger_core::{AdSpendRecord, OrderRecord};
use adledger_merge::detect_cross_platform_conflicts;
use clap::Args;
use tracing::{info, warn};

use super::{read_json, write_json};

#[derive(Debug, Args)]
pub struct ConflictsArgs {
    /// Orders from the first network (JSON array)
    #[arg(long)]
    pub orders_a: PathBuf,

    /// Orders from the second network (JSON array)
    #[arg(long)]
    pub orders_b: Option<PathBuf>,

    /// Ad spend rows (JSON array)
    #[arg(long)]
    pub ad_spend: PathBuf,

    /// Write the analysis here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the analysis and write it.
///
/// # Errors
///
/// Returns an error if an input cannot be read or the output cannot be written.
pub async fn run(args: ConflictsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let orders_a: Vec<OrderRecord> = read_json(&args.orders_a).await?;
    let orders_b: Vec<OrderRecord> = match &args.orders_b {
        Some(path) => read_json(path).await?,
        None => Vec::new(),
    };
    let ad_spend: Vec<AdSpendRecord> = read_json(&args.ad_spend).await?;

    let analysis = detect_cross_platform_conflicts(&orders_a, &orders_b, &ad_spend);

    if analysis.is_clean() {
        info!("No cross-platform conflicts found");
    } else {
        for conflict in &analysis.conflicts {
            warn!(severity = ?conflict.severity, kind = ?conflict.kind, "{}", conflict.description);
        }
    }
    for warning in &analysis.warnings {
        warn!("{warning}");
    }

    write_json(args.output.as_deref(), &analysis).await?;
    Ok(())
}
