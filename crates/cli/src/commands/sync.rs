//! `adledger sync` - fetch campaigns for ad accounts.
//!
//! # Environment Variables
//!
//! - `META_ACCESS_TOKEN` - Graph API access token (required)
//! - `SYNC_*`, `CACHE_*` - see `adledger_sync::config`
//!
//! Ctrl-C cancels the sync: accounts already in flight finish, no new batch
//! starts, and the partial result is still written.

use std::path::PathBuf;
use std::sync::Arc;

use adledger_core::{AccountId, CampaignStatus, DateRange, SyncProgress};
use adledger_sync::{
    GraphApiConfig, GraphClient, RecordCache, SyncOptions, SyncOrchestrator, SyncSettings,
};
use chrono::NaiveDate;
use clap::Args;
use tracing::{info, warn};

use super::write_json;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Ad account id, with or without the `act_` prefix (repeatable)
    #[arg(short, long = "account", required = true)]
    pub accounts: Vec<String>,

    /// Fetch insights for each campaign
    #[arg(long)]
    pub insights: bool,

    /// First day of the insights window (YYYY-MM-DD)
    #[arg(long, requires = "until")]
    pub since: Option<NaiveDate>,

    /// Last day of the insights window (YYYY-MM-DD)
    #[arg(long, requires = "since")]
    pub until: Option<NaiveDate>,

    /// Only keep campaigns with this status (repeatable)
    #[arg(long)]
    pub status: Vec<CampaignStatus>,

    /// Ignore cached campaign lists
    #[arg(long)]
    pub force_refresh: bool,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SyncArgs {
    fn date_range(&self) -> Result<Option<DateRange>, String> {
        match (self.since, self.until) {
            (Some(since), Some(until)) if since > until => {
                Err(format!("--since {since} is after --until {until}"))
            }
            (Some(since), Some(until)) => Ok(Some(DateRange::new(since, until))),
            _ => Ok(None),
        }
    }
}

/// Run a sync and write the result.
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, a precondition
/// fails, or the result cannot be written.
pub async fn run(args: SyncArgs) -> Result<(), Box<dyn std::error::Error>> {
    let date_range = args.date_range()?;

    let config = GraphApiConfig::from_env()?;
    let settings = SyncSettings::from_env()?;
    let client = Arc::new(GraphClient::new(&config)?);
    let cache = RecordCache::from_settings(&settings);
    let orchestrator = Arc::new(SyncOrchestrator::new(client, cache, settings));

    let options = SyncOptions {
        account_ids: args.accounts.iter().map(AccountId::new).collect(),
        date_range,
        include_insights: args.insights,
        campaign_status: args.status.clone(),
        force_refresh: args.force_refresh,
        observer: Some(Arc::new(log_progress)),
    };

    let interrupt = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing accounts in flight");
                orchestrator.cancel_sync();
            }
        })
    };

    let result = orchestrator.sync_all_data(options).await;
    interrupt.abort();
    let result = result?;

    for error in &result.errors {
        warn!("{error}");
    }
    info!(
        sync_id = %result.sync_id,
        accounts = result.accounts.len(),
        campaigns = result.campaigns.len(),
        total_spend = %result.total_spend,
        total_impressions = result.total_impressions,
        total_clicks = result.total_clicks,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "Sync finished"
    );

    write_json(args.output.as_deref(), &result).await?;
    Ok(())
}

fn log_progress(progress: &SyncProgress) {
    info!(
        phase = ?progress.phase,
        accounts = progress.accounts_processed,
        of = progress.total_accounts,
        campaigns = progress.campaigns_processed,
        account = progress.current_account_name.as_deref().unwrap_or("-"),
        eta_secs = progress.estimated_remaining_secs,
        "{}% complete",
        progress.percent_complete()
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(since: Option<&str>, until: Option<&str>) -> SyncArgs {
        SyncArgs {
            accounts: vec!["act_1".to_string()],
            insights: true,
            since: since.map(|d| d.parse().unwrap()),
            until: until.map(|d| d.parse().unwrap()),
            status: Vec::new(),
            force_refresh: false,
            output: None,
        }
    }

    #[test]
    fn test_date_range_from_args() {
        let range = args(Some("2024-01-01"), Some("2024-01-31"))
            .date_range()
            .unwrap()
            .unwrap();
        assert_eq!(range.since.to_string(), "2024-01-01");
        assert!(args(None, None).date_range().unwrap().is_none());
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(args(Some("2024-02-01"), Some("2024-01-01")).date_range().is_err());
    }
}
