//! Integration tests for adledger.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p adledger-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `sync_orchestrator` - multi-account sync against [`FakeRemoteClient`]
//! - `paginated_fetcher` - cursor pagination, envelope shapes, page cap
//! - `merge_scenarios` - merge policies across record families
//! - `conflict_analysis` - cross-platform date and ROI checks
//!
//! Nothing here touches the network: [`FakeRemoteClient`] serves scripted
//! accounts, campaigns and insights and records every call it receives.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adledger_core::AccountId;
use adledger_sync::{
    BatchRequest, BatchResponse, RecordCache, RemoteClient, RemoteError, SyncOrchestrator,
    SyncSettings,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Envelope the fake wraps list responses in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `{"data": {"data": [...], "paging": ...}}`
    Nested,
    /// `{"data": [...], "paging": ...}`
    Flat,
    /// `[...]`, never paginated
    Bare,
    /// Something no normalizer recognizes
    Garbage,
}

/// One call received by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get {
        path: String,
        params: Vec<(String, String)>,
    },
    Batch {
        size: usize,
    },
}

/// Start or finish of one campaign page request, by normalized account id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignEvent {
    Started(String),
    Finished(String),
}

/// Scripted stand-in for the ad platform.
#[derive(Debug)]
pub struct FakeRemoteClient {
    authenticated: bool,
    accounts: Vec<Value>,
    campaigns: HashMap<String, Vec<Value>>,
    failing_accounts: HashSet<String>,
    fail_account_listing: bool,
    insights: HashMap<String, Value>,
    failing_insights: HashSet<String>,
    fail_batches: bool,
    page_size: usize,
    shape: Shape,
    perpetual_cursor: bool,
    calls: Mutex<Vec<Call>>,
    campaign_events: Mutex<Vec<CampaignEvent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeRemoteClient {
    fn default() -> Self {
        Self {
            authenticated: true,
            accounts: Vec::new(),
            campaigns: HashMap::new(),
            failing_accounts: HashSet::new(),
            fail_account_listing: false,
            insights: HashMap::new(),
            failing_insights: HashSet::new(),
            fail_batches: false,
            page_size: 100,
            shape: Shape::Flat,
            perpetual_cursor: false,
            calls: Mutex::new(Vec::new()),
            campaign_events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeRemoteClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// List an account (id as the platform returns it, `act_` prefixed).
    #[must_use]
    pub fn with_account(mut self, id: &str, name: &str) -> Self {
        self.accounts.push(account_json(id, name));
        self
    }

    /// Serve these campaigns for an account.
    #[must_use]
    pub fn with_campaigns(mut self, account: &str, campaigns: Vec<Value>) -> Self {
        self.campaigns
            .entry(key(account))
            .or_default()
            .extend(campaigns);
        self
    }

    /// Fail every campaign request for an account.
    #[must_use]
    pub fn failing_account(mut self, account: &str) -> Self {
        self.failing_accounts.insert(key(account));
        self
    }

    #[must_use]
    pub const fn failing_account_listing(mut self) -> Self {
        self.fail_account_listing = true;
        self
    }

    /// Serve this insights row for a campaign.
    #[must_use]
    pub fn with_insights(mut self, campaign_id: &str, row: Value) -> Self {
        self.insights.insert(campaign_id.to_string(), row);
        self
    }

    /// Answer a campaign's insights sub-request with an error.
    #[must_use]
    pub fn failing_insights(mut self, campaign_id: &str) -> Self {
        self.failing_insights.insert(campaign_id.to_string());
        self
    }

    /// Reject every batched call.
    #[must_use]
    pub const fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Always send a next cursor, forever.
    #[must_use]
    pub const fn with_perpetual_cursor(mut self) -> Self {
        self.perpetual_cursor = true;
        self
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls of any kind.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// GET paths requested, in order.
    #[must_use]
    pub fn get_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Get { path, .. } => Some(path.clone()),
                Call::Batch { .. } => None,
            })
            .collect()
    }

    /// Number of campaign page requests.
    #[must_use]
    pub fn campaign_requests(&self) -> usize {
        self.get_paths()
            .iter()
            .filter(|path| path.ends_with("/campaigns"))
            .count()
    }

    /// Sizes of the batched calls, in order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Batch { size } => Some(*size),
                Call::Get { .. } => None,
            })
            .collect()
    }

    /// Most campaign requests that were ever in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Campaign request starts and finishes, in the order they happened.
    #[must_use]
    pub fn campaign_events(&self) -> Vec<CampaignEvent> {
        self.campaign_events.lock().clone()
    }

    fn wrap(&self, items: Vec<Value>, after: Option<String>) -> Value {
        let paging = after.map_or(Value::Null, |cursor| json!({"cursors": {"after": cursor}}));
        match self.shape {
            Shape::Nested => json!({"data": {"data": items, "paging": paging}}),
            Shape::Flat => json!({"data": items, "paging": paging}),
            Shape::Bare => Value::Array(items),
            Shape::Garbage => json!({"results": items}),
        }
    }

    fn campaign_page(&self, account: &str, params: &[(String, String)]) -> Value {
        let offset = params
            .iter()
            .find(|(name, _)| name == "after")
            .and_then(|(_, cursor)| cursor.strip_prefix("cursor-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        if self.perpetual_cursor {
            let item = campaign_json(&format!("p{offset}"), "Perpetual", "ACTIVE");
            return self.wrap(vec![item], Some(format!("cursor-{}", offset + 1)));
        }

        let all = self.campaigns.get(&key(account)).cloned().unwrap_or_default();
        let end = (offset + self.page_size).min(all.len());
        let items = all.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
        let after = (end < all.len()).then(|| format!("cursor-{end}"));
        self.wrap(items, after)
    }

    fn insights_response(&self, request: &BatchRequest) -> BatchResponse {
        let campaign_id = request
            .relative_url
            .split('/')
            .next()
            .unwrap_or_default();

        if self.failing_insights.contains(campaign_id) {
            return BatchResponse {
                code: 500,
                body: Some(r#"{"error":{"message":"Service temporarily unavailable"}}"#.to_string()),
            };
        }

        let rows: Vec<Value> = self.insights.get(campaign_id).cloned().into_iter().collect();
        BatchResponse {
            code: 200,
            body: Some(json!({"data": rows}).to_string()),
        }
    }
}

#[async_trait]
impl RemoteClient for FakeRemoteClient {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, RemoteError> {
        self.calls.lock().push(Call::Get {
            path: path.to_string(),
            params: params.to_vec(),
        });

        if path == "me/adaccounts" {
            if self.fail_account_listing {
                return Err(RemoteError::Api {
                    status: 500,
                    message: "An unexpected error has occurred".to_string(),
                });
            }
            return Ok(self.wrap(self.accounts.clone(), None));
        }

        let Some(account) = path.strip_suffix("/campaigns") else {
            return Err(RemoteError::NotFound(path.to_string()));
        };

        let account_key = key(account);
        self.campaign_events
            .lock()
            .push(CampaignEvent::Started(account_key.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.campaign_events
            .lock()
            .push(CampaignEvent::Finished(account_key));

        if self.failing_accounts.contains(&key(account)) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("Campaign fetch exploded for {account}"),
            });
        }

        Ok(self.campaign_page(account, params))
    }

    async fn batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchResponse>, RemoteError> {
        self.calls.lock().push(Call::Batch {
            size: requests.len(),
        });

        if self.fail_batches {
            return Err(RemoteError::RateLimited(60));
        }

        Ok(requests
            .iter()
            .map(|request| self.insights_response(request))
            .collect())
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

fn key(account: &str) -> String {
    AccountId::new(account).normalized().to_string()
}

/// An account as the platform lists it.
#[must_use]
pub fn account_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "currency": "USD",
        "timezone_name": "America/Los_Angeles",
        "account_status": 1
    })
}

/// A campaign as the platform returns it.
#[must_use]
pub fn campaign_json(id: &str, name: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "status": status,
        "objective": "OUTCOME_SALES",
        "created_time": "2024-01-01T00:00:00+0000",
        "updated_time": "2024-01-15T00:00:00+0000"
    })
}

/// An insights row with string-encoded metrics, as the platform sends them.
#[must_use]
pub fn insights_json(spend: &str, impressions: &str, clicks: &str) -> Value {
    json!({
        "spend": spend,
        "impressions": impressions,
        "clicks": clicks,
        "reach": "900",
        "date_start": "2024-01-01",
        "date_stop": "2024-01-31"
    })
}

/// Settings with no inter-batch delay and a small page cap.
#[must_use]
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        max_pages: 5,
        batch_delay: Duration::ZERO,
        ..SyncSettings::default()
    }
}

/// An orchestrator over the fake with a fresh cache.
#[must_use]
pub fn orchestrator(client: &Arc<FakeRemoteClient>, settings: SyncSettings) -> SyncOrchestrator {
    let cache = RecordCache::from_settings(&settings);
    SyncOrchestrator::new(Arc::clone(client) as Arc<dyn RemoteClient>, cache, settings)
}
