//! Record families and how each one is keyed and reconciled.
//!
//! All four families share the merge skeleton in [`crate::merger`]; a family
//! only decides its identity key and, optionally, how a newer record is folded
//! into an older one and whether the configured policy is overridden.

use std::fmt;
use std::hash::Hash;

use adledger_core::{AdSpendRecord, CampaignPerformance, OrderRecord, Provenanced, SourceOrigin};
use serde::Serialize;

use crate::policy::ConflictPolicy;
use crate::result::Resolution;

/// What to do with an incoming record whose key matched an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T> {
    /// Keep the existing record as is.
    Keep,
    /// Replace the existing record.
    Replace {
        record: Provenanced<T>,
        resolution: Resolution,
        /// Name of the rule that decided, recorded on the record.
        rule: &'static str,
    },
    /// Keep the existing record and hold the incoming one for review.
    Hold,
}

/// A family of records merged by identity key.
pub trait MergeFamily {
    type Record: Clone + Serialize;
    type Key: Clone + Eq + Hash + fmt::Display;

    /// Family name used in warnings and reports.
    const NAME: &'static str;

    /// The record's identity key, or `None` if it lacks one.
    fn identity_key(record: &Self::Record) -> Option<Self::Key>;

    /// Settle a match before the configured policy is consulted.
    fn override_decision(
        _existing: &Provenanced<Self::Record>,
        _incoming: &Provenanced<Self::Record>,
    ) -> Option<Decision<Self::Record>> {
        None
    }

    /// The record surviving `latest_priority` when `newer` is strictly newer.
    fn resolve_newer(
        _older: &Provenanced<Self::Record>,
        newer: &Provenanced<Self::Record>,
    ) -> Decision<Self::Record> {
        let mut record = newer.clone();
        record.conflict_resolution_applied = Some(ConflictPolicy::LatestPriority.to_string());
        Decision::Replace {
            record,
            resolution: Resolution::TookIncoming,
            rule: ConflictPolicy::LatestPriority.as_str(),
        }
    }
}

/// Platform orders, keyed by order number.
#[derive(Debug, Clone, Copy)]
pub struct Orders;

impl MergeFamily for Orders {
    type Record = OrderRecord;
    type Key = String;

    const NAME: &'static str = "orders";

    fn identity_key(record: &OrderRecord) -> Option<String> {
        non_blank(record.order_number.as_deref())
    }
}

/// Composite identity of an ad-spend row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdSpendKey {
    pub campaign: String,
    pub ad_set: String,
    pub ad: String,
    pub date: String,
}

impl fmt::Display for AdSpendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}@{}", self.campaign, self.ad_set, self.ad, self.date)
    }
}

/// Daily ad spend, keyed by (campaign, ad set, ad, date).
///
/// Spend reported by the live platform always beats spend from a file,
/// whatever policy is configured.
#[derive(Debug, Clone, Copy)]
pub struct AdSpend;

const REMOTE_API_PREFERRED: &str = "remote_api_preferred";

impl MergeFamily for AdSpend {
    type Record = AdSpendRecord;
    type Key = AdSpendKey;

    const NAME: &'static str = "ad_spend";

    /// Campaign and date are required; rows reported at campaign level
    /// have no ad set or ad and key on empty names there.
    fn identity_key(record: &AdSpendRecord) -> Option<AdSpendKey> {
        Some(AdSpendKey {
            campaign: non_blank(record.campaign_name.as_deref())?,
            ad_set: non_blank(record.ad_set_name.as_deref()).unwrap_or_default(),
            ad: non_blank(record.ad_name.as_deref()).unwrap_or_default(),
            date: non_blank(record.date.as_deref())?,
        })
    }

    fn override_decision(
        existing: &Provenanced<AdSpendRecord>,
        incoming: &Provenanced<AdSpendRecord>,
    ) -> Option<Decision<AdSpendRecord>> {
        let existing_remote = existing.is_from(SourceOrigin::RemoteApi);
        let incoming_remote = incoming.is_from(SourceOrigin::RemoteApi);

        match (existing_remote, incoming_remote) {
            (true, false) => Some(Decision::Keep),
            (false, true) => {
                let mut record = incoming.clone();
                record.conflict_resolution_applied = Some(REMOTE_API_PREFERRED.to_string());
                Some(Decision::Replace {
                    record,
                    resolution: Resolution::TookIncoming,
                    rule: REMOTE_API_PREFERRED,
                })
            }
            // Same origin on both sides: the configured policy decides
            _ => None,
        }
    }
}

/// Campaign performance rows, keyed by sub-identifier.
#[derive(Debug, Clone, Copy)]
pub struct Campaigns;

impl MergeFamily for Campaigns {
    type Record = CampaignPerformance;
    type Key = String;

    const NAME: &'static str = "campaigns";

    fn identity_key(record: &CampaignPerformance) -> Option<String> {
        non_blank(record.sub_id.as_deref())
    }

    fn resolve_newer(
        older: &Provenanced<CampaignPerformance>,
        newer: &Provenanced<CampaignPerformance>,
    ) -> Decision<CampaignPerformance> {
        combine_campaigns(older, newer)
    }
}

/// Identity of a campaign on the cross-platform dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    pub sub_id: String,
    pub platform: Option<String>,
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.platform {
            Some(platform) => write!(f, "{}@{platform}", self.sub_id),
            None => write!(f, "{}@-", self.sub_id),
        }
    }
}

/// Campaign performance rows keyed by (sub-identifier, platform).
#[derive(Debug, Clone, Copy)]
pub struct PlatformCampaigns;

impl MergeFamily for PlatformCampaigns {
    type Record = CampaignPerformance;
    type Key = PlatformKey;

    const NAME: &'static str = "platform_campaigns";

    fn identity_key(record: &CampaignPerformance) -> Option<PlatformKey> {
        Some(PlatformKey {
            sub_id: non_blank(record.sub_id.as_deref())?,
            platform: non_blank(record.platform.as_deref()).map(|p| p.to_ascii_lowercase()),
        })
    }

    fn resolve_newer(
        older: &Provenanced<CampaignPerformance>,
        newer: &Provenanced<CampaignPerformance>,
    ) -> Decision<CampaignPerformance> {
        combine_campaigns(older, newer)
    }
}

/// Fold the newer row's metrics into the older row.
///
/// Identity stays with whichever row had it first; the result is tagged
/// `merged` and stamped with the newer row's timestamp.
fn combine_campaigns(
    older: &Provenanced<CampaignPerformance>,
    newer: &Provenanced<CampaignPerformance>,
) -> Decision<CampaignPerformance> {
    let mut record = older.record.clone();
    record.take_metrics_from(&newer.record);
    if record.id.is_none() {
        record.id.clone_from(&newer.record.id);
    }
    if record.sub_id.is_none() {
        record.sub_id.clone_from(&newer.record.sub_id);
    }
    if record.platform.is_none() {
        record.platform.clone_from(&newer.record.platform);
    }

    Decision::Replace {
        record: Provenanced {
            record,
            source_origin: Some(SourceOrigin::Merged),
            source_timestamp: newer.source_timestamp,
            source_record_id: older
                .source_record_id
                .clone()
                .or_else(|| newer.source_record_id.clone()),
            conflict_resolution_applied: Some(ConflictPolicy::LatestPriority.to_string()),
        },
        resolution: Resolution::Combined,
        rule: ConflictPolicy::LatestPriority.as_str(),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
