//! Progress of a single in-flight sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync phase, in the order a sync moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Accounts,
    Campaigns,
    Insights,
    Complete,
}

/// Snapshot of a sync's progress.
///
/// Owned by exactly one sync call; observers receive copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub accounts_processed: usize,
    pub total_accounts: usize,
    pub campaigns_processed: usize,
    pub total_campaigns: usize,
    pub current_account_name: Option<String>,
    pub errors: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub estimated_remaining_secs: Option<u64>,
}

impl SyncProgress {
    /// Fresh progress for a sync starting at `start_time`.
    #[must_use]
    pub const fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            phase: SyncPhase::Accounts,
            accounts_processed: 0,
            total_accounts: 0,
            campaigns_processed: 0,
            total_campaigns: 0,
            current_account_name: None,
            errors: Vec::new(),
            start_time,
            estimated_remaining_secs: None,
        }
    }

    /// Record one finished account and the campaigns it produced.
    ///
    /// Campaign totals only become known as accounts finish, so both the
    /// processed and total campaign counters advance together.
    pub fn finish_account(&mut self, campaigns: usize, now: DateTime<Utc>) {
        self.accounts_processed = (self.accounts_processed + 1).min(self.total_accounts);
        self.total_campaigns += campaigns;
        self.campaigns_processed += campaigns;
        self.estimated_remaining_secs = self.estimate_remaining(now);
    }

    /// Linear estimate of the seconds left, from the mean time per account.
    #[must_use]
    pub fn estimate_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        if self.accounts_processed == 0 {
            return None;
        }
        let elapsed_ms = u64::try_from((now - self.start_time).num_milliseconds()).ok()?;
        let remaining = self.total_accounts.saturating_sub(self.accounts_processed);
        let per_account = elapsed_ms / self.accounts_processed as u64;
        Some(per_account * remaining as u64 / 1000)
    }

    /// Completion as a percentage of accounts processed.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        if self.phase == SyncPhase::Complete {
            return 100;
        }
        if self.total_accounts == 0 {
            return 0;
        }
        let pct = self.accounts_processed * 100 / self.total_accounts;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}
