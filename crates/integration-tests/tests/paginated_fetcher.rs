//! Integration tests for cursor-paginated retrieval.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use adledger_core::{AccountId, CampaignStatus};
use adledger_integration_tests::{Call, FakeRemoteClient, Shape, campaign_json, test_settings};
use adledger_sync::{
    CacheKey, CampaignFilters, PaginatedFetcher, RecordCache, RemoteClient, SyncError,
    SyncSettings,
};
use serde_json::Value;

fn campaigns(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|n| {
            let status = if n % 2 == 0 { "PAUSED" } else { "ACTIVE" };
            campaign_json(&n.to_string(), &format!("Campaign {n}"), status)
        })
        .collect()
}

fn fetcher(client: &Arc<FakeRemoteClient>, settings: &SyncSettings) -> (PaginatedFetcher, RecordCache) {
    let cache = RecordCache::from_settings(settings);
    let remote: Arc<dyn RemoteClient> = client.clone();
    (PaginatedFetcher::new(remote, cache.clone(), settings), cache)
}

fn account() -> AccountId {
    AccountId::new("42")
}

// =============================================================================
// Page Walking
// =============================================================================

#[tokio::test]
async fn test_follows_cursors_until_exhausted() {
    let client = Arc::new(
        FakeRemoteClient::new()
            .with_campaigns("act_42", campaigns(7))
            .with_page_size(3),
    );
    let (fetcher, _) = fetcher(&client, &test_settings());

    let outcome = fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 7);
    assert_eq!(outcome.pages, 3, "7 items at 3 per page is 3 pages");
    assert!(!outcome.truncated);
    assert!(!outcome.from_cache);
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        outcome.items.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        ["1", "2", "3", "4", "5", "6", "7"],
        "Order is preserved across pages"
    );
}

#[tokio::test]
async fn test_requests_all_statuses_and_cursor_params() {
    let client = Arc::new(
        FakeRemoteClient::new()
            .with_campaigns("act_42", campaigns(3))
            .with_page_size(2),
    );
    let (fetcher, _) = fetcher(&client, &test_settings());

    fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    let calls = client.calls();
    let Call::Get { path, params } = &calls[0] else {
        panic!("Expected a GET, got {:?}", calls[0]);
    };
    assert_eq!(path, "act_42/campaigns", "Bare ids gain the act_ prefix");
    let status_param = params
        .iter()
        .find(|(name, _)| name == "effective_status")
        .map(|(_, value)| value.as_str())
        .unwrap();
    for status in CampaignStatus::ALL {
        assert!(status_param.contains(status.as_str()));
    }
    assert!(params.iter().all(|(name, _)| name != "after"), "First page has no cursor");

    let Call::Get { params, .. } = &calls[1] else {
        panic!("Expected a GET, got {:?}", calls[1]);
    };
    assert!(params.contains(&("after".to_string(), "cursor-2".to_string())));
}

#[tokio::test]
async fn test_perpetual_cursor_stops_at_page_cap() {
    let client = Arc::new(FakeRemoteClient::new().with_perpetual_cursor());
    let settings = SyncSettings {
        max_pages: 4,
        ..test_settings()
    };
    let (fetcher, cache) = fetcher(&client, &settings);

    let outcome = fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    assert_eq!(client.campaign_requests(), 4, "Exactly max_pages requests");
    assert_eq!(outcome.items.len(), 4, "Whatever accumulated is returned");
    assert!(outcome.truncated);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(
        !cache.has(&CacheKey::Campaigns { account: account() }),
        "A truncated list must not be cached as complete"
    );
}

#[tokio::test]
async fn test_empty_account_makes_one_request() {
    let client = Arc::new(FakeRemoteClient::new());
    let (fetcher, _) = fetcher(&client, &test_settings());

    let outcome = fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    assert!(outcome.items.is_empty());
    assert_eq!(client.campaign_requests(), 1);
}

#[tokio::test]
async fn test_failure_is_attributed_to_account() {
    let client = Arc::new(
        FakeRemoteClient::new()
            .with_campaigns("act_42", campaigns(2))
            .failing_account("42"),
    );
    let (fetcher, _) = fetcher(&client, &test_settings());

    let err = fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap_err();

    match err {
        SyncError::Fetch {
            account_id,
            resource,
            ..
        } => {
            assert_eq!(account_id, account());
            assert_eq!(resource, "campaigns");
        }
        other => panic!("Expected a fetch error, got {other:?}"),
    }
}

// =============================================================================
// Envelope Shapes
// =============================================================================

#[tokio::test]
async fn test_every_known_envelope_yields_the_same_campaigns() {
    for shape in [Shape::Nested, Shape::Flat, Shape::Bare] {
        let client = Arc::new(
            FakeRemoteClient::new()
                .with_campaigns("act_42", campaigns(3))
                .with_shape(shape),
        );
        let (fetcher, _) = fetcher(&client, &test_settings());

        let outcome = fetcher
            .fetch_all(&account(), &CampaignFilters::default())
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 3, "{shape:?} envelope");
        assert!(outcome.warnings.is_empty(), "{shape:?} envelope");
    }
}

#[tokio::test]
async fn test_unknown_envelope_is_empty_with_warning() {
    let client = Arc::new(
        FakeRemoteClient::new()
            .with_campaigns("act_42", campaigns(3))
            .with_shape(Shape::Garbage),
    );
    let (fetcher, cache) = fetcher(&client, &test_settings());

    let outcome = fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(!cache.has(&CacheKey::Campaigns { account: account() }));
}

#[tokio::test]
async fn test_unparsable_campaign_skipped_with_warning() {
    let client = Arc::new(FakeRemoteClient::new().with_campaigns(
        "act_42",
        vec![
            campaign_json("1", "Good", "ACTIVE"),
            serde_json::json!({"id": "2", "name": "No status"}),
        ],
    ));
    let (fetcher, _) = fetcher(&client, &test_settings());

    let outcome = fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains('2'));
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn test_pages_and_full_list_cached() {
    let client = Arc::new(
        FakeRemoteClient::new()
            .with_campaigns("act_42", campaigns(5))
            .with_page_size(2),
    );
    let (fetcher, cache) = fetcher(&client, &test_settings());

    fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();

    assert!(cache.has(&CacheKey::Campaigns { account: account() }));
    for page in 1..=3 {
        assert!(
            cache.has(&CacheKey::CampaignPage {
                account: account(),
                page
            }),
            "Page {page} should be cached"
        );
    }

    let again = fetcher
        .fetch_all(
            &account(),
            &CampaignFilters {
                statuses: vec![CampaignStatus::Paused],
                force_refresh: false,
            },
        )
        .await
        .unwrap();
    assert!(again.from_cache);
    assert_eq!(again.pages, 0);
    assert_eq!(again.items.len(), 2, "Cached list re-filtered by status");
}

#[tokio::test]
async fn test_invalidate_account_drops_list_and_pages() {
    let client = Arc::new(
        FakeRemoteClient::new()
            .with_campaigns("act_42", campaigns(4))
            .with_campaigns("act_7", campaigns(1))
            .with_page_size(2),
    );
    let (fetcher, cache) = fetcher(&client, &test_settings());
    let other = AccountId::new("act_7");

    fetcher
        .fetch_all(&account(), &CampaignFilters::default())
        .await
        .unwrap();
    fetcher
        .fetch_all(&other, &CampaignFilters::default())
        .await
        .unwrap();
    fetcher.invalidate_account(&account()).await;

    assert!(!cache.has(&CacheKey::Campaigns { account: account() }));
    assert!(!cache.has(&CacheKey::CampaignPage {
        account: account(),
        page: 1
    }));
    assert!(
        cache.has(&CacheKey::Campaigns { account: other }),
        "Other accounts are untouched"
    );
}
