//! Multi-account sync.
//!
//! [`SyncOrchestrator::sync_all_data`] lists the token's accounts, keeps the
//! requested ones, then fetches campaigns (and optionally insights) in
//! fixed-size concurrent batches. A batch fully settles before the next one
//! starts. One account failing never affects its siblings: its error is
//! recorded and it contributes no campaigns.
//!
//! Cancellation is advisory. [`SyncOrchestrator::cancel_sync`] stops new
//! batches from starting; requests already in flight run to completion.
//! Concurrent syncs on one orchestrator each register their own handle, and
//! cancellation reaches every live sync.

use std::collections::HashMap;
use std::sync::Arc;

use adledger_core::{
    AccountId, AdAccount, Campaign, CampaignStatus, DateRange, SyncPhase, SyncProgress,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::RecordCache;
use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::fetcher::{CampaignFilters, PaginatedFetcher};
use crate::insights::BatchInsightsFetcher;
use crate::progress::ProgressObserver;
use crate::remote::RemoteClient;

/// What to sync.
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Accounts to sync, with or without the `act_` prefix.
    pub account_ids: Vec<AccountId>,
    /// Insights reporting window. Defaults to the last 30 days.
    pub date_range: Option<DateRange>,
    pub include_insights: bool,
    /// Statuses to keep. Empty keeps every campaign.
    pub campaign_status: Vec<CampaignStatus>,
    /// Bypass and refresh cached campaign lists.
    pub force_refresh: bool,
    pub observer: Option<Arc<dyn ProgressObserver>>,
}

impl SyncOptions {
    /// Options for the given accounts with everything else defaulted.
    #[must_use]
    pub fn for_accounts<I, A>(account_ids: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AccountId>,
    {
        Self {
            account_ids: account_ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("account_ids", &self.account_ids)
            .field("date_range", &self.date_range)
            .field("include_insights", &self.include_insights)
            .field("campaign_status", &self.campaign_status)
            .field("force_refresh", &self.force_refresh)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Outcome of one sync. Returned even when some accounts failed.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub sync_id: Uuid,
    /// Accounts that were both requested and visible to the token.
    pub accounts: Vec<AdAccount>,
    pub campaigns: Vec<Campaign>,
    pub total_spend: Decimal,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub sync_timestamp: DateTime<Utc>,
    /// One entry per failed account (or failed account listing).
    pub errors: Vec<String>,
    /// Recovered degradations that did not fail an account.
    pub warnings: Vec<String>,
    /// Whether cancellation stopped batches from starting.
    pub cancelled: bool,
}

impl SyncResult {
    /// Whether every requested unit of work succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

/// Cancellation handles of the syncs in flight, by sync id.
type LiveSyncs = Mutex<HashMap<Uuid, CancellationToken>>;

/// Unregisters a sync's handle when it ends, however it ends.
struct ActiveGuard<'a> {
    live: &'a LiveSyncs,
    id: Uuid,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.live.lock().remove(&self.id);
    }
}

/// Progress owned by one sync call, forwarded to its observer.
struct Reporter {
    progress: Mutex<SyncProgress>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl Reporter {
    fn new(start: DateTime<Utc>, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            progress: Mutex::new(SyncProgress::new(start)),
            observer,
        }
    }

    /// Apply a change, then hand a snapshot to the observer.
    fn update(&self, change: impl FnOnce(&mut SyncProgress)) {
        let snapshot = {
            let mut progress = self.progress.lock();
            change(&mut progress);
            progress.clone()
        };
        if let Some(observer) = &self.observer {
            observer.on_progress(&snapshot);
        }
    }
}

/// Result of one account's unit of work.
struct AccountOutcome {
    campaigns: Vec<Campaign>,
    warnings: Vec<String>,
    error: Option<String>,
}

/// Coordinates campaign sync across many ad accounts.
///
/// Constructed once by the host and shared by reference.
pub struct SyncOrchestrator {
    client: Arc<dyn RemoteClient>,
    cache: RecordCache,
    settings: SyncSettings,
    fetcher: PaginatedFetcher,
    insights: BatchInsightsFetcher,
    active: LiveSyncs,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClient>, cache: RecordCache, settings: SyncSettings) -> Self {
        let fetcher = PaginatedFetcher::new(client.clone(), cache.clone(), &settings);
        let insights = BatchInsightsFetcher::new(client.clone(), &settings);
        Self {
            client,
            cache,
            settings,
            fetcher,
            insights,
            active: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &RecordCache {
        &self.cache
    }

    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Sync campaigns for the requested accounts.
    ///
    /// # Errors
    ///
    /// Only precondition failures are returned as errors, before any request
    /// is made: `NoValidAccounts` for an empty account list (or one with no
    /// account visible to the token) and `NotAuthenticated` when the client
    /// holds no credentials. Everything else is recorded in the result.
    #[instrument(skip(self, options), fields(accounts = options.account_ids.len()))]
    pub async fn sync_all_data(&self, options: SyncOptions) -> Result<SyncResult, SyncError> {
        if options.account_ids.is_empty() {
            return Err(SyncError::NoValidAccounts);
        }
        if !self.client.is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }

        let sync_id = Uuid::new_v4();
        let token = CancellationToken::new();
        self.active.lock().insert(sync_id, token.clone());
        let _guard = ActiveGuard {
            live: &self.active,
            id: sync_id,
        };

        let reporter = Reporter::new(Utc::now(), options.observer.clone());
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        info!(%sync_id, "Starting sync");
        reporter.update(|_| {});

        let listed = match self.fetcher.fetch_accounts().await {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                outcome.items
            }
            Err(e) => {
                warn!(%sync_id, error = %e, "Failed to list ad accounts");
                let message = format!("Failed to list ad accounts: {e}");
                reporter.update(|progress| progress.errors.push(message.clone()));
                errors.push(message);
                return Ok(finish(sync_id, &reporter, Vec::new(), Vec::new(), errors, warnings, false));
            }
        };

        let accounts = select_accounts(&options.account_ids, listed);
        if accounts.is_empty() {
            warn!(%sync_id, "None of the requested accounts is visible to the token");
            return Err(SyncError::NoValidAccounts);
        }

        info!(%sync_id, accounts = accounts.len(), "Fetching campaigns");
        reporter.update(|progress| {
            progress.phase = SyncPhase::Campaigns;
            progress.total_accounts = accounts.len();
        });

        let mut campaigns = Vec::new();
        let mut cancelled = false;
        let batch_size = self.settings.max_concurrent_accounts.max(1);

        for (index, batch) in accounts.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                warn!(%sync_id, batch = index + 1, "Sync cancelled, skipping remaining accounts");
                warnings.push(format!(
                    "Sync cancelled before batch {}; remaining accounts skipped",
                    index + 1
                ));
                cancelled = true;
                break;
            }

            debug!(batch = index + 1, size = batch.len(), "Starting account batch");
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|account| self.process_account(account, &options, &reporter)),
            )
            .await;

            for outcome in outcomes {
                campaigns.extend(outcome.campaigns);
                warnings.extend(outcome.warnings);
                errors.extend(outcome.error);
            }
        }

        Ok(finish(sync_id, &reporter, accounts, campaigns, errors, warnings, cancelled))
    }

    /// Signal every live sync to stop starting new batches.
    ///
    /// Returns `false` if no sync is running.
    pub fn cancel_sync(&self) -> bool {
        let live = self.active.lock();
        for (sync_id, token) in live.iter() {
            info!(%sync_id, "Cancelling sync");
            token.cancel();
        }
        !live.is_empty()
    }

    /// Whether any sync is in flight and has not been cancelled.
    #[must_use]
    pub fn is_sync_running(&self) -> bool {
        self.active.lock().values().any(|token| !token.is_cancelled())
    }

    /// Cancel every live sync and drop all cached data.
    pub async fn reset(&self) {
        let drained: Vec<CancellationToken> =
            self.active.lock().drain().map(|(_, token)| token).collect();
        for token in drained {
            token.cancel();
        }
        self.cache.clear().await;
    }

    /// One account's campaigns (and insights), with progress around it.
    async fn process_account(
        &self,
        account: &AdAccount,
        options: &SyncOptions,
        reporter: &Reporter,
    ) -> AccountOutcome {
        reporter.update(|progress| {
            progress.current_account_name = Some(account.label().to_string());
        });

        let outcome = match self.fetch_account(account, options, reporter).await {
            Ok((campaigns, warnings)) => AccountOutcome {
                campaigns,
                warnings,
                error: None,
            },
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Account sync failed");
                AccountOutcome {
                    campaigns: Vec::new(),
                    warnings: Vec::new(),
                    error: Some(format!("{}: {e}", account.label())),
                }
            }
        };

        reporter.update(|progress| {
            if let Some(error) = &outcome.error {
                progress.errors.push(error.clone());
            }
            progress.finish_account(outcome.campaigns.len(), Utc::now());
        });

        outcome
    }

    async fn fetch_account(
        &self,
        account: &AdAccount,
        options: &SyncOptions,
        reporter: &Reporter,
    ) -> Result<(Vec<Campaign>, Vec<String>), SyncError> {
        let filters = CampaignFilters {
            statuses: options.campaign_status.clone(),
            force_refresh: options.force_refresh,
        };
        let fetched = self.fetcher.fetch_all(&account.id, &filters).await?;
        let mut warnings = fetched.warnings;

        if !options.include_insights || fetched.items.is_empty() {
            return Ok((fetched.items, warnings));
        }

        reporter.update(|progress| progress.phase = progress.phase.max(SyncPhase::Insights));
        let enriched = self
            .insights
            .fetch_insights(fetched.items, options.date_range.as_ref())
            .await;
        warnings.extend(enriched.warnings);

        Ok((enriched.campaigns, warnings))
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .field("running", &self.is_sync_running())
            .finish_non_exhaustive()
    }
}

/// Requested accounts that the token can see, in request order, deduplicated.
fn select_accounts(requested: &[AccountId], listed: Vec<AdAccount>) -> Vec<AdAccount> {
    let mut selected: Vec<AdAccount> = Vec::new();
    for id in requested {
        if selected.iter().any(|account| account.id.same_account(id)) {
            continue;
        }
        if let Some(account) = listed.iter().find(|account| account.id.same_account(id)) {
            selected.push(account.clone());
        }
    }
    selected
}

/// Sum spend, impressions and clicks over every campaign's insights.
/// Totals saturate rather than overflow.
fn totals(campaigns: &[Campaign]) -> (Decimal, u64, u64) {
    campaigns
        .iter()
        .filter_map(|campaign| campaign.insights.as_ref())
        .fold((Decimal::ZERO, 0_u64, 0_u64), |(spend, impressions, clicks), insights| {
            (
                spend.saturating_add(insights.spend.to_decimal()),
                impressions.saturating_add(insights.impressions.to_count()),
                clicks.saturating_add(insights.clicks.to_count()),
            )
        })
}

fn finish(
    sync_id: Uuid,
    reporter: &Reporter,
    accounts: Vec<AdAccount>,
    campaigns: Vec<Campaign>,
    errors: Vec<String>,
    warnings: Vec<String>,
    cancelled: bool,
) -> SyncResult {
    let (total_spend, total_impressions, total_clicks) = totals(&campaigns);

    reporter.update(|progress| {
        progress.phase = SyncPhase::Complete;
        progress.current_account_name = None;
        progress.estimated_remaining_secs = Some(0);
    });

    info!(
        %sync_id,
        campaigns = campaigns.len(),
        errors = errors.len(),
        %total_spend,
        "Sync complete"
    );

    SyncResult {
        sync_id,
        accounts,
        campaigns,
        total_spend,
        total_impressions,
        total_clicks,
        sync_timestamp: Utc::now(),
        errors,
        warnings,
        cancelled,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use adledger_core::{Insights, MetricValue};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::progress::ProgressLog;
    use crate::remote::{BatchRequest, BatchResponse, RemoteError};

    /// Counts calls and answers every GET with an empty page.
    struct CountingClient {
        authenticated: bool,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl RemoteClient for CountingClient {
        async fn get(&self, _path: &str, _params: &[(String, String)]) -> Result<Value, RemoteError> {
            *self.calls.lock() += 1;
            Ok(json!({"data": []}))
        }

        async fn batch(&self, _requests: &[BatchRequest]) -> Result<Vec<BatchResponse>, RemoteError> {
            *self.calls.lock() += 1;
            Ok(Vec::new())
        }

        fn is_authenticated(&self) -> bool {
            self.authenticated
        }
    }

    fn orchestrator(authenticated: bool) -> (SyncOrchestrator, Arc<CountingClient>) {
        let client = Arc::new(CountingClient {
            authenticated,
            calls: Mutex::new(0),
        });
        let cache = RecordCache::new(100, Duration::from_secs(60));
        (
            SyncOrchestrator::new(client.clone(), cache, SyncSettings::default()),
            client,
        )
    }

    fn account(id: &str) -> AdAccount {
        serde_json::from_value(json!({"id": id, "name": format!("Account {id}")})).unwrap()
    }

    #[tokio::test]
    async fn test_empty_account_ids_rejected_before_network() {
        let (orchestrator, client) = orchestrator(true);

        let err = orchestrator
            .sync_all_data(SyncOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No valid accounts found");
        assert_eq!(*client.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_rejected_before_network() {
        let (orchestrator, client) = orchestrator(false);

        let err = orchestrator
            .sync_all_data(SyncOptions::for_accounts(["act_1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotAuthenticated));
        assert_eq!(*client.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_no_visible_accounts_is_fatal() {
        let (orchestrator, _) = orchestrator(true);

        let err = orchestrator
            .sync_all_data(SyncOptions::for_accounts(["act_1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NoValidAccounts));
        assert!(!orchestrator.is_sync_running());
    }

    #[tokio::test]
    async fn test_cancel_without_sync() {
        let (orchestrator, _) = orchestrator(true);
        assert!(!orchestrator.cancel_sync());
        assert!(!orchestrator.is_sync_running());
    }

    #[tokio::test]
    async fn test_live_handle_reflects_cancellation() {
        let (orchestrator, _) = orchestrator(true);
        orchestrator.active.lock().insert(Uuid::new_v4(), CancellationToken::new());

        assert!(orchestrator.is_sync_running());
        assert!(orchestrator.cancel_sync());
        assert!(!orchestrator.is_sync_running());

        orchestrator.reset().await;
        assert!(orchestrator.active.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_reaches_every_live_sync() {
        let (orchestrator, _) = orchestrator(true);
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        orchestrator.active.lock().insert(Uuid::new_v4(), first.clone());
        orchestrator.active.lock().insert(Uuid::new_v4(), second.clone());

        assert!(orchestrator.cancel_sync());

        assert!(first.is_cancelled(), "Earlier sync is not orphaned");
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_guard_unregisters_only_its_own_sync() {
        let live: LiveSyncs = Mutex::new(HashMap::new());
        let (mine, other) = (Uuid::new_v4(), Uuid::new_v4());
        live.lock().insert(mine, CancellationToken::new());
        live.lock().insert(other, CancellationToken::new());

        drop(ActiveGuard { live: &live, id: mine });

        assert!(!live.lock().contains_key(&mine));
        assert!(live.lock().contains_key(&other));
    }

    #[test]
    fn test_select_accounts_normalizes_and_dedupes() {
        let listed = vec![account("act_1"), account("act_2"), account("act_3")];
        let requested = vec![
            AccountId::new("3"),
            AccountId::new("act_1"),
            AccountId::new("act_3"),
            AccountId::new("9"),
        ];

        let selected = select_accounts(&requested, listed);
        let ids: Vec<&str> = selected.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["act_3", "act_1"]);
    }

    #[test]
    fn test_totals_treat_unparsable_as_zero() {
        let with_insights = |spend: Value, impressions: Value| Campaign {
            id: "1".into(),
            name: String::new(),
            status: CampaignStatus::Active,
            objective: None,
            created_at: None,
            updated_at: None,
            account_id: AccountId::new("act_1"),
            daily_budget: None,
            insights: Some(Insights {
                spend: MetricValue::new(spend),
                impressions: MetricValue::new(impressions),
                clicks: MetricValue::from(3_u64),
                ..Insights::default()
            }),
        };

        let mut bare = with_insights(json!(0), json!(0));
        bare.insights = None;
        let campaigns = vec![
            with_insights(json!("10.25"), json!("100")),
            with_insights(json!("n/a"), json!(null)),
            with_insights(json!(4.75), json!(50)),
            bare,
        ];

        let (spend, impressions, clicks) = totals(&campaigns);
        assert_eq!(spend, Decimal::from_str("15.00").unwrap());
        assert_eq!(impressions, 150);
        assert_eq!(clicks, 9);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let huge = |spend: &str| Campaign {
            id: "1".into(),
            name: String::new(),
            status: CampaignStatus::Active,
            objective: None,
            created_at: None,
            updated_at: None,
            account_id: AccountId::new("act_1"),
            daily_budget: None,
            insights: Some(Insights {
                spend: MetricValue::new(json!(spend)),
                impressions: MetricValue::from(u64::MAX),
                clicks: MetricValue::from(u64::MAX),
                ..Insights::default()
            }),
        };
        let campaigns = vec![
            huge("70000000000000000000000000000"),
            huge("70000000000000000000000000000"),
        ];

        let (spend, impressions, clicks) = totals(&campaigns);
        assert_eq!(spend, Decimal::MAX);
        assert_eq!(impressions, u64::MAX);
        assert_eq!(clicks, u64::MAX);
    }

    #[test]
    fn test_finish_emits_complete() {
        let log = Arc::new(ProgressLog::new());
        let observer: Arc<dyn ProgressObserver> = log.clone();
        let reporter = Reporter::new(Utc::now(), Some(observer));

        let result = finish(Uuid::new_v4(), &reporter, Vec::new(), Vec::new(), Vec::new(), Vec::new(), false);

        assert!(result.is_complete());
        assert_eq!(log.last().unwrap().phase, SyncPhase::Complete);
    }
}
