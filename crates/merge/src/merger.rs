//! The merge engine.
//!
//! Every family goes through the same steps:
//!
//! 1. Tag original records `file_import` and incoming records `remote_api`
//!    (records that already carry an origin keep it), stamping untimed
//!    records with the ingestion time.
//! 2. Index the original records by identity key; the output starts as the
//!    original records in their original order. A repeated original key
//!    keeps its first row and drops the rest with a warning.
//! 3. Append incoming records with a new key. For a key already present,
//!    settle the pair by the family override or the configured policy and
//!    splice any replacement in at the existing record's position.
//!
//! Records without an identity key are excluded with a warning; a merge
//! never fails.

use std::collections::HashMap;

use adledger_core::{
    AdSpendRecord, CampaignPerformance, OrderRecord, Provenanced, SourceOrigin,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::family::{AdSpend, Campaigns, Decision, MergeFamily, Orders, PlatformCampaigns};
use crate::policy::{ConflictPolicy, MergeConfig};
use crate::report::{MergeReport, generate_report};
use crate::result::{ConflictInfo, MergeResult, MergeStatistics, Resolution, UnresolvedConflict};

/// All four record families from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordBundle {
    pub orders: Vec<Provenanced<OrderRecord>>,
    #[serde(alias = "adSpend")]
    pub ad_spend: Vec<Provenanced<AdSpendRecord>>,
    pub campaigns: Vec<Provenanced<CampaignPerformance>>,
    #[serde(alias = "platformCampaigns")]
    pub platform_campaigns: Vec<Provenanced<CampaignPerformance>>,
}

/// Per-family results of [`DataMerger::merge_all`] plus overall counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeAllOutcome {
    pub orders: MergeResult<OrderRecord>,
    pub ad_spend: MergeResult<AdSpendRecord>,
    pub campaigns: MergeResult<CampaignPerformance>,
    pub platform_campaigns: MergeResult<CampaignPerformance>,
    pub overall_statistics: MergeStatistics,
}

impl MergeAllOutcome {
    /// Each family's name and statistics, in a fixed order.
    #[must_use]
    pub fn family_statistics(&self) -> Vec<(&'static str, MergeStatistics)> {
        vec![
            (Orders::NAME, self.orders.statistics),
            (AdSpend::NAME, self.ad_spend.statistics),
            (Campaigns::NAME, self.campaigns.statistics),
            (PlatformCampaigns::NAME, self.platform_campaigns.statistics),
        ]
    }

    /// The merged records of every family.
    #[must_use]
    pub fn merged_data(&self) -> RecordBundle {
        RecordBundle {
            orders: self.orders.merged_data.clone(),
            ad_spend: self.ad_spend.merged_data.clone(),
            campaigns: self.campaigns.merged_data.clone(),
            platform_campaigns: self.platform_campaigns.merged_data.clone(),
        }
    }

    /// Every family's warnings, prefixed with the family name.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let prefixed = |family: &str, warnings: &[String]| {
            warnings
                .iter()
                .map(|w| format!("{family}: {w}"))
                .collect::<Vec<_>>()
        };
        [
            prefixed(Orders::NAME, &self.orders.warnings),
            prefixed(AdSpend::NAME, &self.ad_spend.warnings),
            prefixed(Campaigns::NAME, &self.campaigns.warnings),
            prefixed(PlatformCampaigns::NAME, &self.platform_campaigns.warnings),
        ]
        .concat()
    }

    #[must_use]
    pub fn report(&self) -> MergeReport {
        generate_report(&self.family_statistics())
    }
}

/// Reconciles original and incoming records under one conflict policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataMerger {
    config: MergeConfig,
}

impl DataMerger {
    #[must_use]
    pub const fn new(policy: ConflictPolicy) -> Self {
        Self {
            config: MergeConfig::new(policy),
        }
    }

    #[must_use]
    pub const fn with_config(config: MergeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn policy(&self) -> ConflictPolicy {
        self.config.policy
    }

    pub fn merge_orders(
        &self,
        original: Vec<Provenanced<OrderRecord>>,
        incoming: Vec<Provenanced<OrderRecord>>,
    ) -> MergeResult<OrderRecord> {
        self.merge::<Orders>(original, incoming)
    }

    /// Merge ad spend. Platform-sourced spend wins over file spend regardless
    /// of policy.
    pub fn merge_ad_spend(
        &self,
        original: Vec<Provenanced<AdSpendRecord>>,
        incoming: Vec<Provenanced<AdSpendRecord>>,
    ) -> MergeResult<AdSpendRecord> {
        self.merge::<AdSpend>(original, incoming)
    }

    pub fn merge_campaigns(
        &self,
        original: Vec<Provenanced<CampaignPerformance>>,
        incoming: Vec<Provenanced<CampaignPerformance>>,
    ) -> MergeResult<CampaignPerformance> {
        self.merge::<Campaigns>(original, incoming)
    }

    pub fn merge_platform_campaigns(
        &self,
        original: Vec<Provenanced<CampaignPerformance>>,
        incoming: Vec<Provenanced<CampaignPerformance>>,
    ) -> MergeResult<CampaignPerformance> {
        self.merge::<PlatformCampaigns>(original, incoming)
    }

    /// Merge every family of a file bundle with an API bundle.
    ///
    /// Families are merged independently; the overall statistics are the
    /// sum of the per-family ones.
    #[instrument(skip_all, fields(policy = %self.config.policy))]
    pub fn merge_all(&self, file_bundle: RecordBundle, api_bundle: RecordBundle) -> MergeAllOutcome {
        let orders = self.merge_orders(file_bundle.orders, api_bundle.orders);
        let ad_spend = self.merge_ad_spend(file_bundle.ad_spend, api_bundle.ad_spend);
        let campaigns = self.merge_campaigns(file_bundle.campaigns, api_bundle.campaigns);
        let platform_campaigns = self
            .merge_platform_campaigns(file_bundle.platform_campaigns, api_bundle.platform_campaigns);

        let mut overall_statistics = MergeStatistics::default();
        for statistics in [
            &orders.statistics,
            &ad_spend.statistics,
            &campaigns.statistics,
            &platform_campaigns.statistics,
        ] {
            overall_statistics.absorb(statistics);
        }

        info!(
            merged = overall_statistics.total_merged,
            duplicates = overall_statistics.duplicates_found,
            conflicts = overall_statistics.conflicts_found,
            "Merged all families"
        );

        MergeAllOutcome {
            orders,
            ad_spend,
            campaigns,
            platform_campaigns,
            overall_statistics,
        }
    }

    /// Merge one family.
    #[instrument(skip_all, fields(family = F::NAME, original = original.len(), incoming = incoming.len()))]
    pub fn merge<F: MergeFamily>(
        &self,
        original: Vec<Provenanced<F::Record>>,
        incoming: Vec<Provenanced<F::Record>>,
    ) -> MergeResult<F::Record> {
        let now = Utc::now();
        let mut statistics = MergeStatistics {
            total_original: original.len(),
            total_new: incoming.len(),
            ..MergeStatistics::default()
        };
        let mut warnings = Vec::new();
        let mut conflicts = Vec::new();
        let mut unresolved = Vec::new();

        let mut merged: Vec<Provenanced<F::Record>> = Vec::with_capacity(original.len());
        let mut index: HashMap<F::Key, usize> = HashMap::new();

        for (position, mut record) in original.into_iter().enumerate() {
            record.tag_if_untagged(SourceOrigin::FileImport, now);
            let Some(key) = F::identity_key(&record.record) else {
                warn!(family = F::NAME, position, "Original record has no identity key, excluded");
                warnings.push(format!(
                    "Original record {position} has no identity key and was excluded"
                ));
                continue;
            };
            if index.contains_key(&key) {
                warn!(family = F::NAME, %key, position, "Duplicate key within original records, repeat dropped");
                warnings.push(format!(
                    "Original record {position} repeats key {key} and was dropped"
                ));
                statistics.duplicates_found += 1;
                statistics.duplicates_resolved += 1;
                continue;
            }
            index.insert(key, merged.len());
            merged.push(record);
        }

        for (position, mut record) in incoming.into_iter().enumerate() {
            record.tag_if_untagged(SourceOrigin::RemoteApi, now);
            let Some(key) = F::identity_key(&record.record) else {
                warn!(family = F::NAME, position, "Incoming record has no identity key, excluded");
                warnings.push(format!(
                    "Incoming record {position} has no identity key and was excluded"
                ));
                continue;
            };

            let Some(&slot) = index.get(&key) else {
                index.insert(key, merged.len());
                merged.push(record);
                continue;
            };

            statistics.duplicates_found += 1;
            let existing = &merged[slot];

            match self.decide::<F>(existing, &record) {
                Decision::Keep => {
                    statistics.duplicates_resolved += 1;
                }
                Decision::Replace {
                    record: resolved,
                    resolution,
                    rule,
                } => {
                    debug!(family = F::NAME, %key, rule, "Replaced record");
                    conflicts.push(ConflictInfo {
                        id: key.to_string(),
                        field: "record".to_string(),
                        original_value: snapshot(&existing.record),
                        new_value: snapshot(&record.record),
                        resolution,
                        resolved_value: Some(snapshot(&resolved.record)),
                    });
                    merged[slot] = resolved;
                    statistics.duplicates_resolved += 1;
                    statistics.conflicts_found += 1;
                    statistics.conflicts_resolved += 1;
                }
                Decision::Hold => {
                    debug!(family = F::NAME, %key, "Held record for manual review");
                    conflicts.push(ConflictInfo {
                        id: key.to_string(),
                        field: "record".to_string(),
                        original_value: snapshot(&existing.record),
                        new_value: snapshot(&record.record),
                        resolution: Resolution::HeldForReview,
                        resolved_value: None,
                    });
                    unresolved.push(UnresolvedConflict {
                        key: key.to_string(),
                        original: existing.clone(),
                        incoming: record,
                    });
                    statistics.conflicts_found += 1;
                }
            }
        }

        statistics.total_merged = merged.len();

        MergeResult {
            merged_data: merged,
            statistics,
            conflicts,
            warnings,
            unresolved,
        }
    }

    fn decide<F: MergeFamily>(
        &self,
        existing: &Provenanced<F::Record>,
        incoming: &Provenanced<F::Record>,
    ) -> Decision<F::Record> {
        if let Some(decision) = F::override_decision(existing, incoming) {
            return decision;
        }

        match self.config.policy {
            ConflictPolicy::FilePriority => Decision::Keep,
            ConflictPolicy::ApiPriority => {
                let mut record = incoming.clone();
                record.conflict_resolution_applied = Some(ConflictPolicy::ApiPriority.to_string());
                Decision::Replace {
                    record,
                    resolution: Resolution::TookIncoming,
                    rule: ConflictPolicy::ApiPriority.as_str(),
                }
            }
            // Ties keep the original
            ConflictPolicy::LatestPriority => {
                if incoming.source_timestamp > existing.source_timestamp {
                    F::resolve_newer(existing, incoming)
                } else {
                    Decision::Keep
                }
            }
            ConflictPolicy::Manual => Decision::Hold,
        }
    }
}

fn snapshot<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}
