//! Ad account snapshot.

use serde::{Deserialize, Serialize};

use super::AccountId;

/// An ad account as listed by the platform.
///
/// Read-only snapshot, refreshed on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdAccount {
    pub id: AccountId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "timezone_name")]
    pub timezone: Option<String>,
    /// Platform account status code (1 = active, 2 = disabled, ...).
    #[serde(default, alias = "account_status")]
    pub status: Option<i64>,
}

impl AdAccount {
    /// A display label for progress reporting and error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}
