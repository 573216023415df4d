//! Conflict policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How to settle two records that share an identity key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the original (file-imported) record.
    FilePriority,
    /// Keep the incoming (API) record.
    ApiPriority,
    /// Keep whichever record has the later source timestamp.
    #[default]
    LatestPriority,
    /// Keep the original and hold the incoming record for review.
    Manual,
}

impl ConflictPolicy {
    pub const ALL: [Self; 4] = [
        Self::FilePriority,
        Self::ApiPriority,
        Self::LatestPriority,
        Self::Manual,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FilePriority => "file_priority",
            Self::ApiPriority => "api_priority",
            Self::LatestPriority => "latest_priority",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a policy name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown conflict policy: {0} (expected file_priority, api_priority, latest_priority or manual)")]
pub struct ParsePolicyError(pub String);

impl FromStr for ConflictPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| ParsePolicyError(s.to_string()))
    }
}

/// Merge engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub policy: ConflictPolicy,
}

impl MergeConfig {
    #[must_use]
    pub const fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }
}
