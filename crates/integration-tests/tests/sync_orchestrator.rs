//! Integration tests for multi-account sync.
//!
//! Every test drives a real `SyncOrchestrator` against the scripted
//! `FakeRemoteClient`; nothing touches the network.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use adledger_core::{AccountId, CampaignStatus, DateRange, SyncPhase, SyncProgress};
use adledger_integration_tests::{
    CampaignEvent, FakeRemoteClient, campaign_json, insights_json, orchestrator, test_settings,
};
use adledger_sync::{ProgressLog, ProgressObserver, SyncError, SyncOptions, SyncSettings};
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn two_accounts() -> FakeRemoteClient {
    FakeRemoteClient::new()
        .with_account("act_1", "Alpha Store")
        .with_account("act_2", "Beta Store")
        .with_campaigns(
            "act_1",
            vec![
                campaign_json("11", "Alpha Spring", "ACTIVE"),
                campaign_json("12", "Alpha Winter", "PAUSED"),
            ],
        )
        .with_campaigns("act_2", vec![campaign_json("21", "Beta Launch", "ACTIVE")])
}

// =============================================================================
// Preconditions
// =============================================================================

#[tokio::test]
async fn test_empty_account_list_rejected_before_any_request() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    let err = sync
        .sync_all_data(SyncOptions::for_accounts(Vec::<AccountId>::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NoValidAccounts));
    assert_eq!(err.to_string(), "No valid accounts found");
    assert_eq!(client.call_count(), 0, "No request may precede the check");
}

#[tokio::test]
async fn test_unauthenticated_client_rejected_before_any_request() {
    let client = Arc::new(two_accounts().unauthenticated());
    let sync = orchestrator(&client, test_settings());

    let err = sync
        .sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NotAuthenticated));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_requested_accounts_not_visible_is_fatal() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    let err = sync
        .sync_all_data(SyncOptions::for_accounts(["act_999"]))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NoValidAccounts));
    assert_eq!(client.campaign_requests(), 0, "No campaign fetch for unknown accounts");
    assert!(!sync.is_sync_running());
}

// =============================================================================
// Partial Failure
// =============================================================================

#[tokio::test]
async fn test_one_failing_account_does_not_affect_the_other() {
    let client = Arc::new(two_accounts().failing_account("act_1"));
    let sync = orchestrator(&client, test_settings());

    let result = sync
        .sync_all_data(SyncOptions::for_accounts(["act_1", "act_2"]))
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1, "Exactly one error expected: {:?}", result.errors);
    assert!(
        result.errors[0].contains("Alpha Store"),
        "Error should name the failing account: {}",
        result.errors[0]
    );
    assert_eq!(result.campaigns.len(), 1);
    assert_eq!(result.campaigns[0].name, "Beta Launch");
    assert_eq!(result.accounts.len(), 2);
    assert!(!result.is_complete());
    assert!(!sync.is_sync_running(), "Slot must be released after the sync");
}

#[tokio::test]
async fn test_account_listing_failure_is_recorded_not_raised() {
    let client = Arc::new(two_accounts().failing_account_listing());
    let sync = orchestrator(&client, test_settings());

    let result = sync
        .sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to list ad accounts"));
    assert!(result.accounts.is_empty());
    assert!(result.campaigns.is_empty());
    assert_eq!(result.total_spend, Decimal::ZERO);
}

// =============================================================================
// Results
// =============================================================================

#[tokio::test]
async fn test_ids_with_and_without_prefix_select_the_same_account() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    let result = sync
        .sync_all_data(SyncOptions::for_accounts(["1", "act_1"]))
        .await
        .unwrap();

    assert_eq!(result.accounts.len(), 1, "Duplicate requests collapse");
    assert_eq!(result.campaigns.len(), 2);
    assert!(
        result
            .campaigns
            .iter()
            .all(|c| c.account_id == AccountId::new("act_1")),
        "Campaigns carry their account"
    );
    assert!(result.is_complete());
}

#[tokio::test]
async fn test_status_filter_applies_to_every_account() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    let options = SyncOptions {
        campaign_status: vec![CampaignStatus::Paused],
        ..SyncOptions::for_accounts(["act_1", "act_2"])
    };
    let result = sync.sync_all_data(options).await.unwrap();

    assert_eq!(result.campaigns.len(), 1);
    assert_eq!(result.campaigns[0].name, "Alpha Winter");
}

#[tokio::test]
async fn test_insights_totals_across_accounts() {
    let client = Arc::new(
        two_accounts()
            .with_insights("11", insights_json("10.50", "1000", "40"))
            .with_insights("12", insights_json("4.25", "500", "not-a-number"))
            .with_insights("21", insights_json("0.25", "250", "10")),
    );
    let sync = orchestrator(&client, test_settings());

    let options = SyncOptions {
        include_insights: true,
        ..SyncOptions::for_accounts(["act_1", "act_2"])
    };
    let result = sync.sync_all_data(options).await.unwrap();

    assert_eq!(result.campaigns.len(), 3);
    assert!(result.campaigns.iter().all(|c| c.insights.is_some()));
    assert_eq!(result.total_spend, Decimal::new(1500, 2));
    assert_eq!(result.total_impressions, 1750);
    assert_eq!(result.total_clicks, 50, "Unparsable clicks count as zero");
}

#[tokio::test]
async fn test_failed_insight_leaves_campaign_without_insights() {
    let client = Arc::new(
        two_accounts()
            .with_insights("11", insights_json("10.00", "100", "5"))
            .failing_insights("12"),
    );
    let sync = orchestrator(&client, test_settings());

    let options = SyncOptions {
        include_insights: true,
        date_range: Some(DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )),
        ..SyncOptions::for_accounts(["act_1"])
    };
    let result = sync.sync_all_data(options).await.unwrap();

    let winter = result.campaigns.iter().find(|c| c.id.as_str() == "12").unwrap();
    let spring = result.campaigns.iter().find(|c| c.id.as_str() == "11").unwrap();
    assert!(winter.insights.is_none());
    assert!(spring.insights.is_some());
    assert!(result.errors.is_empty(), "A failed insight is not an account error");
    assert!(result.warnings.iter().any(|w| w.contains("12")));
}

#[tokio::test]
async fn test_failed_insights_batch_keeps_campaigns() {
    let client = Arc::new(two_accounts().failing_batches());
    let sync = orchestrator(&client, test_settings());

    let options = SyncOptions {
        include_insights: true,
        ..SyncOptions::for_accounts(["act_2"])
    };
    let result = sync.sync_all_data(options).await.unwrap();

    assert_eq!(result.campaigns.len(), 1);
    assert!(result.campaigns[0].insights.is_none());
    assert!(result.errors.is_empty());
    assert!(!result.warnings.is_empty());
}

#[tokio::test]
async fn test_insights_skipped_unless_requested() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    sync.sync_all_data(SyncOptions::for_accounts(["act_1", "act_2"]))
        .await
        .unwrap();

    assert!(client.batch_sizes().is_empty());
}

// =============================================================================
// Progress
// =============================================================================

#[tokio::test]
async fn test_progress_snapshots_move_forward() {
    let client = Arc::new(two_accounts().failing_account("act_2"));
    let sync = orchestrator(&client, test_settings());
    let log = Arc::new(ProgressLog::new());
    let observer: Arc<dyn ProgressObserver> = log.clone();

    let options = SyncOptions {
        include_insights: true,
        ..SyncOptions::for_accounts(["act_1", "act_2"])
    }
    .with_observer(observer);
    sync.sync_all_data(options).await.unwrap();

    let snapshots = log.snapshots();
    assert!(snapshots.len() >= 4, "Expected several snapshots, got {}", snapshots.len());
    assert_eq!(snapshots[0].phase, SyncPhase::Accounts);

    for pair in snapshots.windows(2) {
        assert!(pair[0].phase <= pair[1].phase, "Phase went backwards");
        assert!(pair[0].accounts_processed <= pair[1].accounts_processed);
    }

    let last = log.last().unwrap();
    assert_eq!(last.phase, SyncPhase::Complete);
    assert_eq!(last.accounts_processed, 2);
    assert_eq!(last.total_accounts, 2);
    assert_eq!(last.total_campaigns, 2);
    assert_eq!(last.errors.len(), 1);
    assert_eq!(last.percent_complete(), 100);
    assert!(last.current_account_name.is_none());
}

#[tokio::test]
async fn test_progress_names_current_account() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());
    let log = Arc::new(ProgressLog::new());
    let observer: Arc<dyn ProgressObserver> = log.clone();

    sync.sync_all_data(SyncOptions::for_accounts(["act_2"]).with_observer(observer))
        .await
        .unwrap();

    assert!(
        log.snapshots()
            .iter()
            .any(|p| p.current_account_name.as_deref() == Some("Beta Store"))
    );
}

// =============================================================================
// Concurrency and Cancellation
// =============================================================================

fn many_accounts(count: usize) -> FakeRemoteClient {
    (1..=count).fold(FakeRemoteClient::new(), |client, n| {
        let id = format!("act_{n}");
        client
            .with_account(&id, &format!("Store {n}"))
            .with_campaigns(&id, vec![campaign_json(&format!("{n}00"), "Evergreen", "ACTIVE")])
    })
}

#[tokio::test]
async fn test_concurrency_is_bounded_per_batch() {
    let client = Arc::new(many_accounts(7));
    let settings = SyncSettings {
        max_concurrent_accounts: 3,
        ..test_settings()
    };
    let sync = orchestrator(&client, settings);

    let ids: Vec<String> = (1..=7).map(|n| format!("act_{n}")).collect();
    let result = sync.sync_all_data(SyncOptions::for_accounts(ids.clone())).await.unwrap();

    assert_eq!(result.campaigns.len(), 7);
    assert!(
        client.max_in_flight() <= 3,
        "At most 3 accounts in flight, saw {}",
        client.max_in_flight()
    );
    assert!(
        client.max_in_flight() > 1,
        "Accounts within a batch run concurrently, saw {}",
        client.max_in_flight()
    );

    let events = client.campaign_events();
    let position = |wanted: &CampaignEvent| events.iter().position(|e| e == wanted).unwrap();
    let batches: Vec<&[String]> = ids.chunks(3).collect();
    for pair in batches.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let settled = current
            .iter()
            .map(|id| position(&CampaignEvent::Finished(id.clone())))
            .max()
            .unwrap();
        let next_start = next
            .iter()
            .map(|id| position(&CampaignEvent::Started(id.clone())))
            .min()
            .unwrap();
        assert!(
            settled < next_start,
            "Batch {current:?} must settle before {next:?} starts: {events:?}"
        );
    }
}

#[tokio::test]
async fn test_cancel_reaches_both_concurrent_syncs() {
    let client = Arc::new(many_accounts(3));
    let settings = SyncSettings {
        max_concurrent_accounts: 1,
        ..test_settings()
    };
    let sync = Arc::new(orchestrator(&client, settings));
    let ids = ["act_1", "act_2", "act_3"];

    let handle = Arc::clone(&sync);
    let cancel_on_start = move |progress: &SyncProgress| {
        if progress.phase == SyncPhase::Campaigns && progress.accounts_processed == 0 {
            handle.cancel_sync();
        }
    };
    let first = SyncOptions::for_accounts(ids);
    let second = SyncOptions::for_accounts(ids).with_observer(Arc::new(cancel_on_start));

    let (first, second) = tokio::join!(sync.sync_all_data(first), sync.sync_all_data(second));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(first.cancelled, "The first sync is still reachable once a second starts");
    assert!(second.cancelled);
    assert_ne!(first.sync_id, second.sync_id);
    assert_eq!(first.campaigns.len(), 1, "First sync stops after its running batch");
    assert!(second.campaigns.is_empty(), "Second sync cancelled before any batch");
    assert!(!sync.is_sync_running());
    assert!(!sync.cancel_sync(), "Both handles unregistered");
}

#[tokio::test]
async fn test_cancel_stops_later_batches() {
    let client = Arc::new(many_accounts(3));
    let settings = SyncSettings {
        max_concurrent_accounts: 1,
        ..test_settings()
    };
    let sync = Arc::new(orchestrator(&client, settings));

    let handle = Arc::clone(&sync);
    let observer = move |progress: &SyncProgress| {
        if progress.accounts_processed == 1 {
            handle.cancel_sync();
        }
    };

    let options = SyncOptions::for_accounts(["act_1", "act_2", "act_3"])
        .with_observer(Arc::new(observer));
    let result = sync.sync_all_data(options).await.unwrap();

    assert!(result.cancelled);
    assert!(!result.is_complete());
    assert_eq!(result.campaigns.len(), 1, "Only the first batch ran");
    assert_eq!(client.campaign_requests(), 1);
    assert!(result.warnings.iter().any(|w| w.contains("cancelled")));
    assert!(!sync.is_sync_running());
}

#[tokio::test]
async fn test_cancel_without_sync_is_noop() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    assert!(!sync.cancel_sync());
    assert!(!sync.is_sync_running());
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn test_second_sync_served_from_cache() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    let first = sync
        .sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();
    let requests_after_first = client.call_count();

    let second = sync
        .sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();

    assert_eq!(first.campaigns, second.campaigns);
    assert_eq!(client.call_count(), requests_after_first, "No new requests on a warm cache");
    assert_ne!(first.sync_id, second.sync_id);
}

#[tokio::test]
async fn test_cached_list_refiltered_by_status() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    sync.sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();
    let options = SyncOptions {
        campaign_status: vec![CampaignStatus::Active],
        ..SyncOptions::for_accounts(["act_1"])
    };
    let filtered = sync.sync_all_data(options).await.unwrap();

    assert_eq!(client.campaign_requests(), 1);
    assert_eq!(filtered.campaigns.len(), 1);
    assert_eq!(filtered.campaigns[0].status, CampaignStatus::Active);
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    sync.sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();
    let options = SyncOptions {
        force_refresh: true,
        ..SyncOptions::for_accounts(["act_1"])
    };
    sync.sync_all_data(options).await.unwrap();

    assert_eq!(client.campaign_requests(), 2);
}

#[tokio::test]
async fn test_reset_clears_cache() {
    let client = Arc::new(two_accounts());
    let sync = orchestrator(&client, test_settings());

    sync.sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();
    sync.reset().await;
    sync.sync_all_data(SyncOptions::for_accounts(["act_1"]))
        .await
        .unwrap();

    assert_eq!(client.campaign_requests(), 2);
    assert_eq!(
        client.get_paths().iter().filter(|p| *p == "me/adaccounts").count(),
        2,
        "Account list refetched after reset"
    );
}
