//! Core types for adledger.
//!
//! This module provides type-safe wrappers for the ad platform's domain
//! concepts and for records reconciled across sources.

pub mod account;
pub mod campaign;
pub mod id;
pub mod metric;
pub mod progress;
pub mod provenance;
pub mod records;

pub use account::AdAccount;
pub use campaign::{Campaign, CampaignStatus, DateRange, Insights};
pub use id::*;
pub use metric::MetricValue;
pub use progress::{SyncPhase, SyncProgress};
pub use provenance::{Provenanced, SourceOrigin, strip_all};
pub use records::{AdSpendRecord, CampaignPerformance, FieldLookup, OrderRecord};
