//! Merge outcomes.

use adledger_core::{Provenanced, strip_all};
use serde::Serialize;
use serde_json::Value;

/// Counters describing one merge.
///
/// `duplicates_resolved` counts every identity match that was settled,
/// whether or not the surviving record changed. `conflicts_found` and
/// `conflicts_resolved` only count matches where it did (or, under the
/// manual policy, where a record was held for review).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStatistics {
    pub total_original: usize,
    pub total_new: usize,
    pub total_merged: usize,
    pub duplicates_found: usize,
    pub duplicates_resolved: usize,
    pub conflicts_found: usize,
    pub conflicts_resolved: usize,
}

impl MergeStatistics {
    /// Add another merge's counters to these.
    pub const fn absorb(&mut self, other: &Self) {
        self.total_original += other.total_original;
        self.total_new += other.total_new;
        self.total_merged += other.total_merged;
        self.duplicates_found += other.duplicates_found;
        self.duplicates_resolved += other.duplicates_resolved;
        self.conflicts_found += other.conflicts_found;
        self.conflicts_resolved += other.conflicts_resolved;
    }

    /// Conflicts left for someone to settle.
    #[must_use]
    pub const fn conflicts_pending(&self) -> usize {
        self.conflicts_found.saturating_sub(self.conflicts_resolved)
    }
}

/// How a conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The incoming record replaced the original.
    TookIncoming,
    /// Metrics from the newer record were folded into the original.
    Combined,
    /// Nothing changed; the incoming record awaits review.
    HeldForReview,
}

/// One conflict between an original and an incoming record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictInfo {
    /// Identity key of the conflicting records.
    pub id: String,
    /// Field in conflict. Whole-record conflicts use `record`.
    pub field: String,
    pub original_value: Value,
    pub new_value: Value,
    pub resolution: Resolution,
    /// The surviving value, absent while a conflict awaits review.
    pub resolved_value: Option<Value>,
}

/// An incoming record held back under the manual policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedConflict<T> {
    pub key: String,
    pub original: Provenanced<T>,
    pub incoming: Provenanced<T>,
}

/// Result of merging one record family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult<T> {
    /// Original records in order, then unmatched incoming records in order.
    pub merged_data: Vec<Provenanced<T>>,
    pub statistics: MergeStatistics,
    pub conflicts: Vec<ConflictInfo>,
    pub warnings: Vec<String>,
    pub unresolved: Vec<UnresolvedConflict<T>>,
}

impl<T> MergeResult<T> {
    /// The merged records without provenance fields.
    #[must_use]
    pub fn into_clean(self) -> Vec<T> {
        strip_all(self.merged_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_sums_every_counter() {
        let mut total = MergeStatistics::default();
        let one = MergeStatistics {
            total_original: 2,
            total_new: 3,
            total_merged: 4,
            duplicates_found: 1,
            duplicates_resolved: 1,
            conflicts_found: 1,
            conflicts_resolved: 0,
        };

        total.absorb(&one);
        total.absorb(&one);

        assert_eq!(total.total_original, 4);
        assert_eq!(total.total_merged, 8);
        assert_eq!(total.duplicates_resolved, 2);
        assert_eq!(total.conflicts_pending(), 2);
    }
}
