//! adledger Merge - reconciliation of records from files and the ad platform.
//!
//! # Architecture
//!
//! - [`merger`] - [`DataMerger`], the identity-keyed merge shared by every family
//! - [`family`] - the four record families and how each is keyed
//! - [`policy`] - [`ConflictPolicy`] and [`MergeConfig`]
//! - [`result`] - statistics, conflict records and [`MergeResult`]
//! - [`report`] - [`MergeReport`], a summary of a multi-family merge
//! - [`analyzer`] - cross-platform date and ROI checks
//!
//! Everything here is synchronous and works on in-memory collections.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analyzer;
pub mod family;
pub mod merger;
pub mod policy;
pub mod report;
pub mod result;

pub use analyzer::{
    ConflictAnalysis, ConflictKind, CrossPlatformConflict, DateSpan, Severity,
    detect_cross_platform_conflicts,
};
pub use family::{AdSpend, Campaigns, MergeFamily, Orders, PlatformCampaigns};
pub use merger::{DataMerger, MergeAllOutcome, RecordBundle};
pub use policy::{ConflictPolicy, MergeConfig, ParsePolicyError};
pub use report::{DetailStatus, FamilyDetail, MergeReport, generate_report};
pub use result::{ConflictInfo, MergeResult, MergeStatistics, Resolution, UnresolvedConflict};

pub use adledger_core::{Provenanced, SourceOrigin, strip_all as strip_provenance};
