//! adledger Sync - campaign synchronization across ad accounts.
//!
//! Fetches campaigns (and optionally their insights) for many ad accounts
//! under bounded concurrency, tolerating per-account failures.
//!
//! # Architecture
//!
//! - [`remote`] - `RemoteClient` seam plus the reqwest-backed [`GraphClient`]
//! - [`cache`] - moka-backed [`RecordCache`] shared by concurrent account workers
//! - [`envelope`] - normalizes the response envelope shapes the platform returns
//! - [`fetcher`] - cursor-paginated retrieval ([`PaginatedFetcher`])
//! - [`insights`] - batched per-campaign insight retrieval ([`BatchInsightsFetcher`])
//! - [`orchestrator`] - [`SyncOrchestrator`], the multi-account sync entry point
//!
//! Nothing here retries. Transport-level retry and rate limiting belong to
//! the `RemoteClient` implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod insights;
pub mod orchestrator;
pub mod progress;
pub mod remote;

pub use cache::{CacheKey, CacheValue, RecordCache};
pub use config::{ConfigError, GraphApiConfig, SyncSettings, validate_access_token};
pub use error::SyncError;
pub use fetcher::{CampaignFilters, FetchOutcome, PaginatedFetcher};
pub use insights::{BatchInsightsFetcher, InsightsOutcome};
pub use orchestrator::{SyncOptions, SyncOrchestrator, SyncResult};
pub use progress::{ProgressLog, ProgressObserver};
pub use remote::{BatchRequest, BatchResponse, GraphClient, RemoteClient, RemoteError};
