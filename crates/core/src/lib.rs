//! adledger Core - Shared types library.
//!
//! This crate provides the domain types used across all adledger components:
//! - `sync` - Multi-account campaign synchronization against the ad platform
//! - `merge` - Reconciliation of file-imported and API-synced records
//! - `cli` - Command-line host for running syncs and merges
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no network access,
//! no caches. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Accounts, campaigns, insights, provenance-tagged records and
//!   sync progress

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
