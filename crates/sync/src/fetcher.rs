//! Cursor-paginated retrieval.
//!
//! [`PaginatedFetcher`] follows `after` cursors until the server stops
//! sending one, returns an empty page, or the page cap is reached. The cap
//! is a soft stop against a server that never stops paginating: whatever
//! accumulated is returned.
//!
//! Campaigns are always requested for every status and filtered on the
//! client, so the cached list is a superset of any status filter and cache
//! hits can be re-filtered without another request.

use std::sync::Arc;

use adledger_core::{AccountId, AdAccount, Campaign, CampaignStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, CacheValue, RecordCache};
use crate::config::SyncSettings;
use crate::envelope::Envelope;
use crate::error::SyncError;
use crate::remote::{RemoteClient, RemoteError};

const CAMPAIGN_FIELDS: &str =
    "id,name,status,objective,created_time,updated_time,account_id,daily_budget";
const ACCOUNT_FIELDS: &str = "id,name,currency,timezone_name,account_status";

/// Client-side filters for a campaign fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilters {
    /// Statuses to keep. Empty keeps every campaign.
    pub statuses: Vec<CampaignStatus>,
    /// Skip the cache and drop any cached entries for the account first.
    pub force_refresh: bool,
}

/// Result of a fetch: the items plus any recovered degradations.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub items: Vec<T>,
    pub warnings: Vec<String>,
    /// Requests issued (zero on a cache hit).
    pub pages: usize,
    pub from_cache: bool,
    /// Whether the page cap cut pagination short.
    pub truncated: bool,
}

impl<T> FetchOutcome<T> {
    fn cached(items: Vec<T>) -> Self {
        Self {
            items,
            warnings: Vec::new(),
            pages: 0,
            from_cache: true,
            truncated: false,
        }
    }
}

/// Raw pages collected by one pagination walk.
#[derive(Debug, Default)]
struct PageWalk {
    pages: Vec<Vec<Value>>,
    warnings: Vec<String>,
    requests: usize,
    truncated: bool,
    /// The walk ended on an unrecognized envelope.
    malformed: bool,
}

/// Fetches complete result sets by following pagination cursors.
#[derive(Clone)]
pub struct PaginatedFetcher {
    client: Arc<dyn RemoteClient>,
    cache: RecordCache,
    page_size: usize,
    max_pages: usize,
}

impl PaginatedFetcher {
    /// Create a fetcher over a client and a shared cache.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClient>, cache: RecordCache, settings: &SyncSettings) -> Self {
        Self {
            client,
            cache,
            page_size: settings.page_size,
            max_pages: settings.max_pages,
        }
    }

    /// Fetch every campaign of one account, filtered by status.
    ///
    /// Consults the cache first; cache hits are re-filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Fetch` if any page request fails. No retry is
    /// attempted and pages fetched before the failure are discarded.
    #[instrument(skip(self, filters), fields(account_id = %account_id))]
    pub async fn fetch_all(
        &self,
        account_id: &AccountId,
        filters: &CampaignFilters,
    ) -> Result<FetchOutcome<Campaign>, SyncError> {
        let key = CacheKey::Campaigns {
            account: account_id.clone(),
        };

        if filters.force_refresh {
            self.invalidate_account(account_id).await;
        } else if let Some(cached) = self.cache.get_campaigns(&key).await {
            debug!(cached = cached.len(), "Campaign cache hit");
            return Ok(FetchOutcome::cached(filter_by_status(cached, &filters.statuses)));
        }

        let statuses: Vec<&str> = CampaignStatus::ALL.iter().map(|s| s.as_str()).collect();
        let params = vec![
            ("fields".to_string(), CAMPAIGN_FIELDS.to_string()),
            (
                "effective_status".to_string(),
                serde_json::to_string(&statuses).unwrap_or_default(),
            ),
        ];

        let path = format!("{}/campaigns", account_id.graph_node());
        let walk = self
            .walk(&path, params)
            .await
            .map_err(|source| SyncError::Fetch {
                account_id: account_id.clone(),
                resource: "campaigns",
                source,
            })?;

        let mut warnings = walk.warnings;
        let mut campaigns = Vec::new();
        for (index, page) in walk.pages.into_iter().enumerate() {
            let mut parsed: Vec<Campaign> = parse_items(page, "campaign", &mut warnings);
            for campaign in &mut parsed {
                if campaign.account_id.as_str().is_empty() {
                    campaign.account_id = account_id.clone();
                }
            }

            let page_key = CacheKey::CampaignPage {
                account: account_id.clone(),
                page: index + 1,
            };
            self.cache
                .set(&page_key, CacheValue::Campaigns(parsed.clone()), None)
                .await;
            campaigns.extend(parsed);
        }

        // Only a complete walk may stand in for the account's full list
        if !walk.truncated && !walk.malformed {
            self.cache
                .set(&key, CacheValue::Campaigns(campaigns.clone()), None)
                .await;
        }

        debug!(
            fetched = campaigns.len(),
            pages = walk.requests,
            "Fetched campaigns"
        );

        Ok(FetchOutcome {
            items: filter_by_status(campaigns, &filters.statuses),
            warnings,
            pages: walk.requests,
            from_cache: false,
            truncated: walk.truncated,
        })
    }

    /// Fetch every ad account visible to the token.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if any page request fails.
    #[instrument(skip(self))]
    pub async fn fetch_accounts(&self) -> Result<FetchOutcome<AdAccount>, RemoteError> {
        if let Some(cached) = self.cache.get_accounts().await {
            debug!(cached = cached.len(), "Account cache hit");
            return Ok(FetchOutcome::cached(cached));
        }

        let params = vec![("fields".to_string(), ACCOUNT_FIELDS.to_string())];
        let walk = self.walk("me/adaccounts", params).await?;

        let mut warnings = walk.warnings;
        let accounts: Vec<AdAccount> = walk
            .pages
            .into_iter()
            .flat_map(|page| parse_items::<AdAccount>(page, "account", &mut warnings))
            .collect();

        if !walk.truncated && !walk.malformed {
            self.cache
                .set(&CacheKey::Accounts, CacheValue::Accounts(accounts.clone()), None)
                .await;
        }

        Ok(FetchOutcome {
            items: accounts,
            warnings,
            pages: walk.requests,
            from_cache: false,
            truncated: walk.truncated,
        })
    }

    /// Drop an account's cached campaign list and pages.
    pub async fn invalidate_account(&self, account_id: &AccountId) {
        self.cache
            .invalidate(&CacheKey::Campaigns {
                account: account_id.clone(),
            })
            .await;
        self.cache
            .invalidate_pattern(&format!("campaigns:{}:page:*", account_id.graph_node()))
            .await;
    }

    /// Follow `after` cursors from the first page of `path`.
    async fn walk(
        &self,
        path: &str,
        base_params: Vec<(String, String)>,
    ) -> Result<PageWalk, RemoteError> {
        let mut walk = PageWalk::default();
        let mut after: Option<String> = None;

        loop {
            let mut params = base_params.clone();
            params.push(("limit".to_string(), self.page_size.to_string()));
            if let Some(cursor) = &after {
                params.push(("after".to_string(), cursor.clone()));
            }

            debug!(path, page = walk.requests + 1, cursor = ?after, "Fetching page");
            let body = self.client.get(path, &params).await?;
            walk.requests += 1;

            let envelope = Envelope::parse(body);
            let shape = envelope.shape();
            let Some(page) = envelope.into_page() else {
                let message = format!(
                    "Unrecognized response shape from {path} (page {}); treated as empty",
                    walk.requests
                );
                warn!(path, page = walk.requests, shape, "Unrecognized response envelope");
                walk.warnings.push(message);
                walk.malformed = true;
                break;
            };

            if page.items.is_empty() {
                break;
            }
            walk.pages.push(page.items);

            match page.after {
                Some(cursor) => after = Some(cursor),
                None => break,
            }

            if walk.requests >= self.max_pages {
                warn!(
                    path,
                    max_pages = self.max_pages,
                    "Page cap reached with cursor remaining, stopping"
                );
                walk.warnings.push(format!(
                    "Stopped paginating {path} after {} pages (page cap)",
                    self.max_pages
                ));
                walk.truncated = true;
                break;
            }
        }

        Ok(walk)
    }
}

impl std::fmt::Debug for PaginatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedFetcher")
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

/// Deserialize page items, skipping (and reporting) any that do not parse.
fn parse_items<T: DeserializeOwned>(
    items: Vec<Value>,
    what: &str,
    warnings: &mut Vec<String>,
) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<no id>")
                .to_string();
            match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping unparsable {what}");
                    warnings.push(format!("Skipped unparsable {what} {id}: {e}"));
                    None
                }
            }
        })
        .collect()
}

fn filter_by_status(campaigns: Vec<Campaign>, statuses: &[CampaignStatus]) -> Vec<Campaign> {
    campaigns
        .into_iter()
        .filter(|campaign| campaign.matches_status(statuses))
        .collect()
}
