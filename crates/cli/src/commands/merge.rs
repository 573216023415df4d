//! `adledger merge` - reconcile a file-imported bundle with an API bundle.
//!
//! Bundles are JSON objects with optional `orders`, `ad_spend`, `campaigns`
//! and `platform_campaigns` arrays. The report goes to stdout; merged records
//! go to `--output` (or stdout after the report).

use std::path::PathBuf;

use adledger_merge::{ConflictPolicy, DataMerger, MergeConfig, RecordBundle, strip_provenance};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use super::{read_json, write_json, write_stdout};

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Bundle of records imported from files (the original side)
    #[arg(long)]
    pub file_bundle: PathBuf,

    /// Bundle of records fetched from the API (the incoming side)
    #[arg(long)]
    pub api_bundle: PathBuf,

    /// Conflict policy: `file_priority`, `api_priority`, `latest_priority` or `manual`
    #[arg(long, default_value_t = ConflictPolicy::LatestPriority)]
    pub policy: ConflictPolicy,

    /// Drop provenance fields from the merged records
    #[arg(long)]
    pub strip_provenance: bool,

    /// Write merged records here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Merged records without provenance fields.
#[derive(Serialize)]
struct CleanBundle<O, S, C> {
    orders: Vec<O>,
    ad_spend: Vec<S>,
    campaigns: Vec<C>,
    platform_campaigns: Vec<C>,
}

/// Merge two bundles, print the report and write the merged records.
///
/// # Errors
///
/// Returns an error if a bundle cannot be read or the output cannot be written.
pub async fn run(args: MergeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file_bundle: RecordBundle = read_json(&args.file_bundle).await?;
    let api_bundle: RecordBundle = read_json(&args.api_bundle).await?;

    info!(policy = %args.policy, "Merging bundles");
    let merger = DataMerger::with_config(MergeConfig::new(args.policy));
    let outcome = merger.merge_all(file_bundle, api_bundle);

    for warning in outcome.warnings() {
        warn!("{warning}");
    }
    if args.policy == ConflictPolicy::Manual {
        let held = outcome.overall_statistics.conflicts_pending();
        if held > 0 {
            warn!(held, "Conflicts held for manual review");
        }
    }

    write_stdout(&outcome.report().to_string())?;

    let merged = outcome.merged_data();
    if args.strip_provenance {
        let clean = CleanBundle {
            orders: strip_provenance(merged.orders),
            ad_spend: strip_provenance(merged.ad_spend),
            campaigns: strip_provenance(merged.campaigns),
            platform_campaigns: strip_provenance(merged.platform_campaigns),
        };
        write_json(args.output.as_deref(), &clean).await?;
    } else {
        write_json(args.output.as_deref(), &merged).await?;
    }

    Ok(())
}
