//! Provenance tagging for reconciled records.
//!
//! Every order, ad-spend and campaign record that enters a merge carries a
//! tag saying which source produced it and when. The merge engine uses the
//! tag to arbitrate conflicts; `Merged` is only ever assigned by the merge
//! engine itself.

use std::borrow::Borrow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which source produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    /// Imported from a user-supplied file.
    FileImport,
    /// Fetched from the live ad platform.
    RemoteApi,
    /// Produced by reconciling two records.
    Merged,
}

impl std::fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileImport => write!(f, "file_import"),
            Self::RemoteApi => write!(f, "remote_api"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// A record together with its provenance fields.
///
/// The provenance fields serialize alongside the record's own fields, so a
/// tagged order looks like the plain order plus `source_origin`,
/// `source_timestamp` and friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenanced<T> {
    #[serde(flatten)]
    pub record: T,
    #[serde(default, alias = "sourceOrigin", skip_serializing_if = "Option::is_none")]
    pub source_origin: Option<SourceOrigin>,
    #[serde(
        default,
        alias = "sourceTimestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "sourceRecordId",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_record_id: Option<String>,
    #[serde(
        default,
        alias = "conflictResolutionApplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub conflict_resolution_applied: Option<String>,
}

impl<T> Provenanced<T> {
    /// Wrap a record without any provenance.
    #[must_use]
    pub const fn untagged(record: T) -> Self {
        Self {
            record,
            source_origin: None,
            source_timestamp: None,
            source_record_id: None,
            conflict_resolution_applied: None,
        }
    }

    /// Wrap a record with an origin and timestamp.
    #[must_use]
    pub const fn tagged(record: T, origin: SourceOrigin, timestamp: DateTime<Utc>) -> Self {
        Self {
            record,
            source_origin: Some(origin),
            source_timestamp: Some(timestamp),
            source_record_id: None,
            conflict_resolution_applied: None,
        }
    }

    /// Whether the record already carries an origin.
    #[must_use]
    pub const fn is_tagged(&self) -> bool {
        self.source_origin.is_some()
    }

    /// Tag the record unless it is already tagged.
    ///
    /// A missing timestamp is filled in even on an already tagged record, so
    /// every record leaving ingestion can be ordered by time.
    pub fn tag_if_untagged(&mut self, origin: SourceOrigin, timestamp: DateTime<Utc>) {
        if self.source_origin.is_none() {
            self.source_origin = Some(origin);
        }
        if self.source_timestamp.is_none() {
            self.source_timestamp = Some(timestamp);
        }
    }

    /// Set the source-side identifier of the record.
    #[must_use]
    pub fn with_source_record_id(mut self, id: impl Into<String>) -> Self {
        self.source_record_id = Some(id.into());
        self
    }

    /// Whether this record came from the given source.
    #[must_use]
    pub fn is_from(&self, origin: SourceOrigin) -> bool {
        self.source_origin == Some(origin)
    }

    /// Drop the provenance fields, returning the clean record.
    #[must_use]
    pub fn strip(self) -> T {
        self.record
    }
}

impl<T> Borrow<T> for Provenanced<T> {
    fn borrow(&self) -> &T {
        &self.record
    }
}

/// Drop the provenance fields from every record.
///
/// For consumers that need clean records without merge bookkeeping.
#[must_use]
pub fn strip_all<T>(records: Vec<Provenanced<T>>) -> Vec<T> {
    records.into_iter().map(Provenanced::strip).collect()
}
