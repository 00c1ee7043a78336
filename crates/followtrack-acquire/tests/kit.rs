//! Integration tests for `KitAcquirer` against a local `wiremock` server.

use std::time::Duration;

use chrono::Utc;
use followtrack_acquire::platforms::kit::window_bounds;
use followtrack_acquire::{build_client, Acquirer, Backoff, KitAcquirer, RetryPolicy};
use followtrack_core::{AccountTarget, EntityKind, KitWindow, Platform, Status};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window_target(key: &str, window: Option<KitWindow>) -> AccountTarget {
    AccountTarget {
        key: key.to_string(),
        platform: Platform::Kit,
        kind: EntityKind::Account,
        name: "Kit".to_string(),
        id: None,
        window,
    }
}

fn test_acquirer(server: &MockServer, targets: Vec<AccountTarget>, key: Option<&str>) -> KitAcquirer {
    let client = build_client(Duration::from_secs(5), "followtrack-test/0.1")
        .expect("failed to build test client");
    KitAcquirer::new(targets, client, &server.uri(), key.map(str::to_string)).with_policy(
        RetryPolicy::new(Backoff::exponential(Duration::ZERO, 3))
            .with_rate_limit_cooldown(Duration::ZERO),
    )
}

fn growth_body(subscribers: u64) -> serde_json::Value {
    json!({
        "stats": {
            "subscribers": subscribers,
            "cancellations": 3,
            "net_new_subscribers": 40,
            "new_subscribers": 43,
            "starting": "2024-03-14T00:00:00+01:00",
            "ending": "2024-03-14T23:59:59+01:00"
        }
    })
}

#[tokio::test]
async fn pulls_each_window_with_its_bounds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/account/growth_stats"))
        .and(header("x-kit-api-key", "kit-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(growth_body(5120)))
        .expect(2)
        .mount(&server)
        .await;

    let targets = vec![
        window_target("kit_daily", Some(KitWindow::Daily)),
        window_target("kit_monthly", Some(KitWindow::Monthly)),
    ];
    let results = test_acquirer(&server, targets, Some("kit-key"))
        .acquire(&CancellationToken::new())
        .await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.status(), Status::Success);
        assert_eq!(result.metric("subscribers"), Some(5120));
        assert_eq!(result.metric("cancellations"), Some(3));
        assert_eq!(result.metric("net_new_subscribers"), Some(40));
        assert_eq!(result.metric("new_subscribers"), Some(43));
    }

    let requests = server.received_requests().await.unwrap();
    let (daily_start, daily_end) = window_bounds(KitWindow::Daily, Utc::now());
    let (monthly_start, _) = window_bounds(KitWindow::Monthly, Utc::now());
    let query = |i: usize, name: &str| {
        requests[i]
            .url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    assert_eq!(query(0, "starting"), Some(daily_start));
    assert_eq!(query(0, "ending"), Some(daily_end));
    assert_eq!(query(1, "starting"), Some(monthly_start));
}

#[tokio::test]
async fn missing_counters_read_as_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/account/growth_stats"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"stats": {"subscribers": 9}})),
        )
        .mount(&server)
        .await;

    let results = test_acquirer(
        &server,
        vec![window_target("kit_weekly", Some(KitWindow::Weekly))],
        Some("kit-key"),
    )
    .acquire(&CancellationToken::new())
    .await;

    assert_eq!(results[0].metric("subscribers"), Some(9));
    assert_eq!(results[0].metric("cancellations"), Some(0));
}

#[tokio::test]
async fn rate_limit_gets_one_cooldown_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/account/growth_stats"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let results = test_acquirer(
        &server,
        vec![window_target("kit_daily", Some(KitWindow::Daily))],
        Some("kit-key"),
    )
    .acquire(&CancellationToken::new())
    .await;

    assert_eq!(results[0].status(), Status::TransientError);
    assert!(results[0].reason().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn missing_stats_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/account/growth_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": ["nope"]})))
        .expect(4)
        .mount(&server)
        .await;

    let results = test_acquirer(
        &server,
        vec![window_target("kit_daily", Some(KitWindow::Daily))],
        Some("kit-key"),
    )
    .acquire(&CancellationToken::new())
    .await;

    assert_eq!(results[0].status(), Status::NotFound);
    assert!(results[0].metrics().is_empty());
    assert!(results[0].reason().unwrap().contains("no stats for daily window"));
}

#[tokio::test]
async fn unusable_counters_are_dropped_not_zeroed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/account/growth_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stats": {
                "subscribers": 5120,
                "net_new_subscribers": -5,
                "cancellations": null,
                "new_subscribers": "12"
            }
        })))
        .mount(&server)
        .await;

    let results = test_acquirer(
        &server,
        vec![window_target("kit_daily", Some(KitWindow::Daily))],
        Some("kit-key"),
    )
    .acquire(&CancellationToken::new())
    .await;

    assert_eq!(results[0].status(), Status::Success);
    assert_eq!(results[0].metric("subscribers"), Some(5120));
    assert_eq!(results[0].metric("net_new_subscribers"), None);
    assert_eq!(results[0].metric("cancellations"), None);
    assert_eq!(results[0].metric("new_subscribers"), None);
}

#[tokio::test]
async fn missing_key_or_window_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let no_key = test_acquirer(
        &server,
        vec![window_target("kit_daily", Some(KitWindow::Daily))],
        None,
    )
    .acquire(&CancellationToken::new())
    .await;
    assert_eq!(no_key[0].status(), Status::FatalError);

    let no_window = test_acquirer(&server, vec![window_target("kit_daily", None)], Some("kit-key"))
        .acquire(&CancellationToken::new())
        .await;
    assert_eq!(no_window[0].status(), Status::FatalError);
}
