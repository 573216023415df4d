//! In-memory record cache shared by concurrent account workers.
//!
//! Backed by `moka`, which handles concurrent reads and writes without
//! external locking. Entries expire after a per-entry TTL (default from
//! [`SyncSettings::cache_ttl`](crate::SyncSettings)) and the cache is bounded
//! by entry count.
//!
//! Keys are account-scoped, so concurrent workers never race on one key.

use std::fmt;
use std::time::{Duration, Instant};

use adledger_core::{AccountId, AdAccount, Campaign};
use moka::Expiry;
use moka::future::Cache;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SyncSettings;

/// Cache key for accounts and campaigns.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// The full account list visible to the token.
    Accounts,
    /// Every campaign of one account (all statuses).
    Campaigns { account: AccountId },
    /// One fetched page of an account's campaigns.
    CampaignPage { account: AccountId, page: usize },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accounts => write!(f, "accounts"),
            Self::Campaigns { account } => write!(f, "campaigns:{}", account.graph_node()),
            Self::CampaignPage { account, page } => {
                write!(f, "campaigns:{}:page:{page}", account.graph_node())
            }
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Accounts(Vec<AdAccount>),
    Campaigns(Vec<Campaign>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Capacity- and TTL-bounded cache for fetched records.
///
/// Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct RecordCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl RecordCache {
    /// Create a cache holding at most `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache, default_ttl }
    }

    /// Create a cache sized by the sync settings.
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.cache_max_capacity, settings.cache_ttl)
    }

    /// Look up a value.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.get(&key.to_string()).await.map(|entry| entry.value)
    }

    /// Look up a cached campaign list.
    pub async fn get_campaigns(&self, key: &CacheKey) -> Option<Vec<Campaign>> {
        match self.get(key).await? {
            CacheValue::Campaigns(campaigns) => Some(campaigns),
            CacheValue::Accounts(_) => None,
        }
    }

    /// Look up the cached account list.
    pub async fn get_accounts(&self) -> Option<Vec<AdAccount>> {
        match self.get(&CacheKey::Accounts).await? {
            CacheValue::Accounts(accounts) => Some(accounts),
            CacheValue::Campaigns(_) => None,
        }
    }

    /// Store a value, optionally overriding the default TTL.
    pub async fn set(&self, key: &CacheKey, value: CacheValue, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        self.cache.insert(key.to_string(), entry).await;
    }

    /// Whether a live entry exists for the key.
    #[must_use]
    pub fn has(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key.to_string().as_str())
    }

    /// Remove one entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key.to_string().as_str()).await;
    }

    /// Remove every entry whose key matches a `*` wildcard pattern.
    ///
    /// `campaigns:act_42*` drops an account's campaign list and all of its
    /// pages. Returns the number of entries removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let regex = match wildcard_regex(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(pattern, error = %e, "Invalid cache invalidation pattern");
                return 0;
            }
        };

        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| regex.is_match(key))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &keys {
            self.cache.invalidate(key.as_str()).await;
        }

        debug!(pattern, removed = keys.len(), "Invalidated cache entries");
        keys.len()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Approximate number of live entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCache")
            .field("entries", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}
