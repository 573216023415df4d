//! Sync error taxonomy.
//!
//! Only the precondition variants ever escape [`SyncOrchestrator::sync_all_data`]
//! as an `Err`. Everything else is caught at the per-account boundary and
//! recorded in the sync result.
//!
//! [`SyncOrchestrator::sync_all_data`]: crate::SyncOrchestrator::sync_all_data

use adledger_core::AccountId;
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors raised by the sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote client holds no credentials.
    #[error("Not authenticated with the ad platform")]
    NotAuthenticated,

    /// No requested account is visible to the token (or none was requested).
    #[error("No valid accounts found")]
    NoValidAccounts,

    /// Fetching one account's resources failed.
    #[error("Failed to fetch {resource} for account {account_id}: {source}")]
    Fetch {
        account_id: AccountId,
        resource: &'static str,
        #[source]
        source: RemoteError,
    },

    /// A call outside any single account failed (e.g. listing accounts).
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Whether this error is a precondition failure raised before any work.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::NoValidAccounts)
    }
}
