//! Remote ad platform access.
//!
//! The sync pipeline only talks to the platform through [`RemoteClient`], so
//! hosts can swap the reqwest-backed [`GraphClient`] for a fake in tests or a
//! rate-limited wrapper in production.
//!
//! # Contract
//!
//! - `get` returns the decoded JSON body of one GET request
//! - `batch` submits independent sub-requests in one call and returns one
//!   [`BatchResponse`] per request, in request order
//! - Rejected calls are opaque to callers: interpreting platform error codes
//!   and retrying belong to the implementation

mod graph;

pub use graph::GraphClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when talking to the ad platform.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the platform.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unauthorized (missing, expired or revoked token).
    #[error("Unauthorized: invalid or expired access token")]
    Unauthorized,
}

/// One sub-request of a batched call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub method: String,
    pub relative_url: String,
}

impl BatchRequest {
    /// A GET sub-request for a path relative to the API version root.
    #[must_use]
    pub fn get(relative_url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            relative_url: relative_url.into(),
        }
    }
}

/// The result of one sub-request of a batched call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// HTTP status code of the sub-request.
    pub code: u16,
    /// Raw response body (JSON text), absent for some failures.
    #[serde(default)]
    pub body: Option<String>,
}

impl BatchResponse {
    /// Whether the sub-request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }
}

/// Access to the remote ad platform.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Issue a GET request for `path` (relative to the API version root).
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, RemoteError>;

    /// Submit independent sub-requests as one call.
    async fn batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchResponse>, RemoteError>;

    /// Whether the client currently holds credentials.
    fn is_authenticated(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Api {
            status: 400,
            message: "bad field".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 400 - bad field");
        assert_eq!(
            RemoteError::RateLimited(60).to_string(),
            "Rate limited, retry after 60 seconds"
        );
    }

    #[test]
    fn test_batch_response_success_range() {
        let ok = BatchResponse {
            code: 200,
            body: None,
        };
        let bad = BatchResponse {
            code: 400,
            body: Some("{}".to_string()),
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }

    #[test]
    fn test_batch_request_serializes_for_platform() {
        let request = BatchRequest::get("6001/insights?fields=spend");
        let json = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["relative_url"], "6001/insights?fields=spend");
    }
}
