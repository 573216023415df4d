//! Batched per-campaign insight retrieval.
//!
//! Campaigns are split into batches of at most [`MAX_BATCH_SIZE`]; each batch
//! goes out as one batched call with one `GET <id>/insights` sub-request per
//! campaign. Sub-responses map back to campaigns by position.

use std::sync::Arc;
use std::time::Duration;

use adledger_core::{Campaign, CampaignId, DateRange, Insights};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::form_urlencoded;

use crate::config::{MAX_BATCH_SIZE, SyncSettings};
use crate::envelope::Envelope;
use crate::remote::{BatchRequest, BatchResponse, RemoteClient};

const INSIGHT_FIELDS: &str = "impressions,clicks,spend,reach,frequency,cpm,cpc,ctr,date_start,date_stop";
const DEFAULT_DATE_PRESET: &str = "last_30d";

/// Campaigns after insight retrieval, plus what degraded along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightsOutcome {
    pub campaigns: Vec<Campaign>,
    pub warnings: Vec<String>,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Attaches insights to campaigns using batched calls.
#[derive(Clone)]
pub struct BatchInsightsFetcher {
    client: Arc<dyn RemoteClient>,
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchInsightsFetcher {
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClient>, settings: &SyncSettings) -> Self {
        Self {
            client,
            batch_size: settings.insights_batch_size.clamp(1, MAX_BATCH_SIZE),
            batch_delay: settings.batch_delay,
        }
    }

    /// Fetch insights for every campaign.
    ///
    /// Never fails: a bad sub-response clears that campaign's insights, and a
    /// failed batch call leaves its campaigns as they were.
    #[instrument(skip(self, campaigns, date_range), fields(campaigns = campaigns.len()))]
    pub async fn fetch_insights(
        &self,
        mut campaigns: Vec<Campaign>,
        date_range: Option<&DateRange>,
    ) -> InsightsOutcome {
        let batch_count = campaigns.len().div_ceil(self.batch_size);
        let mut warnings = Vec::new();
        let mut failed_batches = 0;

        for (index, chunk) in campaigns.chunks_mut(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }

            let requests: Vec<BatchRequest> = chunk
                .iter()
                .map(|campaign| BatchRequest::get(insights_url(&campaign.id, date_range)))
                .collect();

            debug!(batch = index + 1, of = batch_count, size = requests.len(), "Submitting insights batch");

            match self.client.batch(&requests).await {
                Ok(responses) => {
                    if responses.len() != chunk.len() {
                        warn!(
                            expected = chunk.len(),
                            received = responses.len(),
                            "Batch response count mismatch"
                        );
                    }
                    for (position, campaign) in chunk.iter_mut().enumerate() {
                        campaign.insights = match responses.get(position) {
                            Some(response) => parse_sub_response(&campaign.id, response, &mut warnings),
                            None => None,
                        };
                    }
                }
                Err(e) => {
                    failed_batches += 1;
                    warn!(batch = index + 1, error = %e, "Insights batch failed, keeping campaigns unmodified");
                    warnings.push(format!("Insights batch {} of {batch_count} failed: {e}", index + 1));
                }
            }
        }

        InsightsOutcome {
            campaigns,
            warnings,
            batches: batch_count,
            failed_batches,
        }
    }
}

impl std::fmt::Debug for BatchInsightsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchInsightsFetcher")
            .field("batch_size", &self.batch_size)
            .field("batch_delay", &self.batch_delay)
            .finish_non_exhaustive()
    }
}

/// Relative URL of one campaign's insights sub-request.
fn insights_url(campaign_id: &CampaignId, date_range: Option<&DateRange>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("fields", INSIGHT_FIELDS);
    match date_range {
        Some(range) => query.append_pair("time_range", &range.to_time_range_param()),
        None => query.append_pair("date_preset", DEFAULT_DATE_PRESET),
    };
    format!("{campaign_id}/insights?{}", query.finish())
}

/// Insights from one sub-response, or `None` if it failed or was empty.
fn parse_sub_response(
    campaign_id: &CampaignId,
    response: &BatchResponse,
    warnings: &mut Vec<String>,
) -> Option<Insights> {
    if !response.is_success() {
        warn!(campaign_id = %campaign_id, code = response.code, "Insights sub-request failed");
        warnings.push(format!(
            "Insights for campaign {campaign_id} failed with status {}",
            response.code
        ));
        return None;
    }

    let body: Value = match response.body.as_deref().map(serde_json::from_str) {
        Some(Ok(body)) => body,
        Some(Err(e)) => {
            warn!(campaign_id = %campaign_id, error = %e, "Unparsable insights body");
            warnings.push(format!("Unparsable insights for campaign {campaign_id}: {e}"));
            return None;
        }
        None => return None,
    };

    // No rows means no delivery in the period
    let first = Envelope::parse(body).into_page()?.items.into_iter().next()?;
    match serde_json::from_value(first) {
        Ok(insights) => Some(insights),
        Err(e) => {
            warn!(campaign_id = %campaign_id, error = %e, "Unparsable insights row");
            warnings.push(format!("Unparsable insights for campaign {campaign_id}: {e}"));
            None
        }
    }
}
