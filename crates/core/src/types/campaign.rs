//! Campaigns and their insight snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AccountId, CampaignId, MetricValue};

/// Campaign delivery status.
///
/// Maps to the platform's configured campaign status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Paused,
    Deleted,
    Archived,
}

impl CampaignStatus {
    /// Every status, in the platform's documented order.
    pub const ALL: [Self; 4] = [Self::Active, Self::Paused, Self::Deleted, Self::Archived];

    /// The platform's wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Deleted => "DELETED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "PAUSED" => Ok(Self::Paused),
            "DELETED" => Ok(Self::Deleted),
            "ARCHIVED" => Ok(Self::Archived),
            _ => Err(format!("invalid campaign status: {s}")),
        }
    }
}

/// Secondary metrics for a campaign over a reporting period.
///
/// Replaced wholesale on refresh, never patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    pub impressions: MetricValue,
    pub clicks: MetricValue,
    pub spend: MetricValue,
    pub reach: MetricValue,
    pub frequency: MetricValue,
    pub cpm: MetricValue,
    pub cpc: MetricValue,
    pub ctr: MetricValue,
    #[serde(alias = "date_start")]
    pub period_start: Option<String>,
    #[serde(alias = "date_stop")]
    pub period_end: Option<String>,
}

/// An advertising campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    #[serde(default)]
    pub name: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default, alias = "created_time")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_time")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub account_id: AccountId,
    #[serde(default)]
    pub daily_budget: Option<MetricValue>,
    #[serde(default)]
    pub insights: Option<Insights>,
}

impl Campaign {
    /// Whether this campaign passes an optional status filter.
    ///
    /// An empty filter admits every campaign.
    #[must_use]
    pub fn matches_status(&self, statuses: &[CampaignStatus]) -> bool {
        statuses.is_empty() || statuses.contains(&self.status)
    }
}

/// Inclusive reporting window for insight queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// Create a new date range.
    #[must_use]
    pub const fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self { since, until }
    }

    /// The range as the platform's `time_range` parameter value.
    #[must_use]
    pub fn to_time_range_param(&self) -> String {
        format!(
            "{{\"since\":\"{}\",\"until\":\"{}\"}}",
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }
}
