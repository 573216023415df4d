//! Graph API client for the ad platform.
//!
//! - Base URL: `https://graph.facebook.com/<version>`
//! - Authentication: access token via `Authorization: Bearer <token>`
//! - Batching: POST to the version root with a form-encoded `batch` array

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use super::{BatchRequest, BatchResponse, RemoteClient, RemoteError};
use crate::config::GraphApiConfig;

/// Platform error code for an invalid or expired access token.
const INVALID_TOKEN_CODE: i64 = 190;

/// Graph API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct GraphClient {
    inner: Arc<GraphClientInner>,
}

struct GraphClientInner {
    client: reqwest::Client,
    base_url: String,
    authenticated: bool,
}

/// Error envelope returned by the Graph API.
#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

impl GraphClient {
    /// Create a new Graph API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &GraphApiConfig) -> Result<Self, RemoteError> {
        let token = config.access_token.expose_secret();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RemoteError::Parse(format!("Invalid access token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            inner: Arc::new(GraphClientInner {
                client,
                base_url: format!("{}/{}", config.graph_url, config.api_version),
                authenticated: !token.trim().is_empty(),
            }),
        })
    }

    /// Turn a non-success response into a `RemoteError`.
    async fn parse_error(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return RemoteError::RateLimited(retry_after);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let detail = serde_json::from_str::<GraphErrorBody>(&body).ok();

        if status == 401
            || status == 403
            || detail
                .as_ref()
                .is_some_and(|d| d.error.code == Some(INVALID_TOKEN_CODE))
        {
            return RemoteError::Unauthorized;
        }

        if status == 404 {
            return RemoteError::NotFound(
                detail.map_or_else(|| "Resource not found".to_string(), |d| d.error.message),
            );
        }

        RemoteError::Api {
            status,
            message: detail.map_or(body, |d| d.error.message),
        }
    }
}

#[async_trait]
impl RemoteClient for GraphClient {
    #[instrument(skip(self, params), fields(path = %path))]
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, RemoteError> {
        let url = format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'));
        let response = self.inner.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(format!("Failed to parse response: {e}")))
    }

    #[instrument(skip(self, requests), fields(requests = requests.len()))]
    async fn batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchResponse>, RemoteError> {
        let batch = serde_json::to_string(requests)
            .map_err(|e| RemoteError::Parse(format!("Failed to encode batch: {e}")))?;

        let response = self
            .inner
            .client
            .post(format!("{}/", self.inner.base_url))
            .form(&[("batch", batch.as_str()), ("include_headers", "false")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        // The platform answers null for sub-requests it timed out on
        let raw: Vec<Option<BatchResponse>> = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(format!("Failed to parse batch response: {e}")))?;

        Ok(raw
            .into_iter()
            .map(|entry| entry.unwrap_or(BatchResponse { code: 0, body: None }))
            .collect())
    }

    fn is_authenticated(&self) -> bool {
        self.inner.authenticated
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.inner.base_url)
            .field("authenticated", &self.inner.authenticated)
            .finish_non_exhaustive()
    }
}
