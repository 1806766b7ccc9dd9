//! End-to-end checker behaviour over stub scrapers, in-memory and file-backed
//! state, and a recording notifier.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use registry_ping_core::fakes::{RecordingNotifier, StubScraper};
use registry_ping_core::{
    CheckError, Checker, FetchError, ImageState, JsonStateStore, RunReport, ScraperRegistry,
    StateStore,
};
use registry_ping_state::fakes::MemoryStateStore;
use tokio_util::sync::CancellationToken;

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, day, hour, 0, 0).unwrap()
}

struct Harness {
    checker: Checker,
    scraper: Arc<StubScraper>,
    store: Arc<MemoryStateStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(scraper: StubScraper, store: MemoryStateStore) -> Harness {
    let scraper = Arc::new(scraper);
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::new());
    let checker = Checker::new(
        ScraperRegistry::new().register(scraper.clone()),
        store.clone(),
        notifier.clone(),
    );
    Harness {
        checker,
        scraper,
        store,
        notifier,
    }
}

fn hub() -> StubScraper {
    StubScraper::new("hub").hosts(&["", "docker.io"])
}

#[tokio::test]
async fn first_seen_notifies_and_persists() {
    let h = harness(hub().pushed("nginx:1.25", ts(2, 0)), MemoryStateStore::new());

    let report = h
        .checker
        .run(&CancellationToken::new(), &["nginx:1.25"])
        .await
        .unwrap();

    assert_eq!(
        report,
        RunReport {
            checked: 1,
            first_seen: 1,
            ..RunReport::default()
        }
    );
    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_first_seen);
    assert_eq!(events[0].old_pushed, None);
    assert_eq!(events[0].new_pushed, ts(2, 0));
    assert_eq!(h.store.get("nginx:1.25"), Some(ImageState::new(ts(2, 0))));
}

#[tokio::test]
async fn later_push_is_an_update() {
    let h = harness(
        hub().pushed("nginx:1.25", ts(2, 0)),
        MemoryStateStore::new().with_entry("nginx:1.25", ImageState::new(ts(1, 0))),
    );

    let report = h
        .checker
        .run(&CancellationToken::new(), &["nginx:1.25"])
        .await
        .unwrap();

    assert_eq!(report.updated, 1);
    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].is_first_seen);
    assert_eq!(events[0].old_pushed, Some(ts(1, 0)));
    assert_eq!(events[0].new_pushed, ts(2, 0));
    assert_eq!(h.store.get("nginx:1.25"), Some(ImageState::new(ts(2, 0))));
}

#[tokio::test]
async fn equal_timestamp_is_silent() {
    let h = harness(
        hub().pushed("nginx:1.25", ts(2, 0)),
        MemoryStateStore::new().with_entry("nginx:1.25", ImageState::new(ts(2, 0))),
    );

    let report = h
        .checker
        .run(&CancellationToken::new(), &["nginx:1.25"])
        .await
        .unwrap();

    assert_eq!(report.unchanged, 1);
    assert!(h.notifier.events().is_empty());
    assert!(h.store.saves().is_empty());
}

#[tokio::test]
async fn older_remote_timestamp_is_silent() {
    let h = harness(
        hub().pushed("nginx:1.25", ts(1, 0)),
        MemoryStateStore::new().with_entry("nginx:1.25", ImageState::new(ts(3, 0))),
    );

    h.checker
        .run(&CancellationToken::new(), &["nginx:1.25"])
        .await
        .unwrap();

    assert!(h.notifier.events().is_empty());
    assert_eq!(h.store.get("nginx:1.25"), Some(ImageState::new(ts(3, 0))));
}

#[tokio::test]
async fn failures_are_isolated_and_kept_in_order() {
    let h = harness(
        hub()
            .pushed("nginx:1.25", ts(2, 0))
            .failing("redis:7", FetchError::Transport("connection refused".into()))
            .pushed("php:8.2.30-fpm", ts(4, 17)),
        MemoryStateStore::new(),
    );

    let refs = [
        "nginx:1.25",
        "no-tag",
        "redis:7",
        "ghcr.io/org/img:latest",
        "php:8.2.30-fpm",
    ];
    let err = h
        .checker
        .run(&CancellationToken::new(), &refs)
        .await
        .unwrap_err();

    let failed: Vec<&str> = err.iter().map(|e| e.reference.as_str()).collect();
    assert_eq!(failed, vec!["no-tag", "redis:7", "ghcr.io/org/img:latest"]);
    assert!(matches!(err.failures[0].error, CheckError::InvalidReference(_)));
    assert!(matches!(err.failures[1].error, CheckError::FetchFailed(_)));
    assert!(matches!(err.failures[2].error, CheckError::NoScraperForHost(_)));

    assert_eq!(err.report.checked, 5);
    assert_eq!(err.report.first_seen, 2);
    assert_eq!(err.report.failed, 3);

    // Successes on either side of the failures are persisted.
    assert!(h.store.get("nginx:1.25").is_some());
    assert!(h.store.get("php:8.2.30-fpm").is_some());
    assert_eq!(h.notifier.events().len(), 2);

    let msg = err.to_string();
    assert!(msg.starts_with("3 of 5 image checks failed"));
    assert!(msg.contains("redis:7: fetch failed: transport error: connection refused"));
}

#[tokio::test]
async fn php_official_image_is_stored_under_short_key() {
    let pushed = Utc.with_ymd_and_hms(2026, 2, 4, 17, 56, 28).unwrap()
        + chrono::Duration::microseconds(838_962);
    let h = harness(
        hub().pushed("php:8.2.30-fpm", pushed),
        MemoryStateStore::new(),
    );

    h.checker
        .run(&CancellationToken::new(), &["php:8.2.30-fpm"])
        .await
        .unwrap();

    assert_eq!(h.store.get("php:8.2.30-fpm"), Some(ImageState::new(pushed)));
    let events = h.notifier.events();
    assert_eq!(events[0].image.namespace(), "library");
    assert_eq!(events[0].image.name(), "php");
}

#[tokio::test]
async fn unclaimed_host_fails_without_touching_state() {
    let h = harness(hub(), MemoryStateStore::new());

    let err = h
        .checker
        .run(&CancellationToken::new(), &["ghcr.io/org/img:latest"])
        .await
        .unwrap_err();

    assert_eq!(err.len(), 1);
    assert!(matches!(
        err.failures[0].error,
        CheckError::NoScraperForHost(ref e) if e.host == "ghcr.io"
    ));
    assert_eq!(h.scraper.calls(), 0);
    assert!(h.store.saves().is_empty());
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn notify_failure_skips_persist() {
    let h = harness(hub().pushed("nginx:1.25", ts(2, 0)), MemoryStateStore::new());
    h.notifier.fail_for("nginx:1.25");

    let err = h
        .checker
        .run(&CancellationToken::new(), &["nginx:1.25"])
        .await
        .unwrap_err();

    assert!(matches!(err.failures[0].error, CheckError::NotifyFailed(_)));
    assert_eq!(h.store.get("nginx:1.25"), None);
}

#[tokio::test]
async fn state_failures_are_per_entry() {
    let store = MemoryStateStore::new();
    store.fail_load("nginx:1.25");
    store.fail_save("redis:7");
    let h = harness(
        hub()
            .pushed("nginx:1.25", ts(2, 0))
            .pushed("redis:7", ts(2, 0))
            .pushed("php:8.2.30-fpm", ts(2, 0)),
        store,
    );

    let err = h
        .checker
        .run(
            &CancellationToken::new(),
            &["nginx:1.25", "redis:7", "php:8.2.30-fpm"],
        )
        .await
        .unwrap_err();

    assert_eq!(err.len(), 2);
    assert!(err
        .iter()
        .all(|e| matches!(e.error, CheckError::StateIo(_))));
    assert!(h.store.get("php:8.2.30-fpm").is_some());
    // redis was announced before its save failed.
    assert_eq!(h.notifier.events().len(), 2);
}

#[tokio::test]
async fn empty_batch_succeeds() {
    let h = harness(hub(), MemoryStateStore::new());
    let refs: [&str; 0] = [];

    let report = h.checker.run(&CancellationToken::new(), &refs).await.unwrap();
    assert_eq!(report, RunReport::default());
}

#[tokio::test]
async fn pre_cancelled_run_fetches_nothing() {
    let h = harness(
        hub()
            .pushed("nginx:1.25", ts(2, 0))
            .pushed("redis:7", ts(2, 0)),
        MemoryStateStore::new(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .checker
        .run(&cancel, &["nginx:1.25", "redis:7"])
        .await
        .unwrap_err();

    assert_eq!(err.len(), 2);
    assert!(err.iter().all(|e| matches!(e.error, CheckError::Cancelled)));
    assert_eq!(h.scraper.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_batch_keeps_completed_entries() {
    let h = harness(
        hub()
            .pushed("nginx:1.25", ts(2, 0))
            .pushed("redis:7", ts(2, 0))
            .delayed("redis:7", Duration::from_secs(30))
            .pushed("php:8.2.30-fpm", ts(2, 0)),
        MemoryStateStore::new(),
    );
    let cancel = CancellationToken::new();
    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        deadline.cancel();
    });

    let err = h
        .checker
        .run(&cancel, &["nginx:1.25", "redis:7", "php:8.2.30-fpm"])
        .await
        .unwrap_err();

    let cancelled: Vec<&str> = err.iter().map(|e| e.reference.as_str()).collect();
    assert_eq!(cancelled, vec!["redis:7", "php:8.2.30-fpm"]);
    assert!(err.iter().all(|e| matches!(e.error, CheckError::Cancelled)));
    assert_eq!(err.report.first_seen, 1);
    assert!(h.store.get("nginx:1.25").is_some());
    assert!(h.store.get("redis:7").is_none());
    // php never reached the scraper.
    assert_eq!(h.scraper.calls(), 2);
}

#[tokio::test]
async fn json_store_survives_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("state.json");

    let ghcr = |pushed| {
        StubScraper::new("ghcr")
            .hosts(&["ghcr.io"])
            .pushed("ghcr.io/org/img:latest", pushed)
    };

    for (pushed, expect_events) in [(ts(1, 0), 1), (ts(1, 0), 0), (ts(5, 0), 1)] {
        let notifier = Arc::new(RecordingNotifier::new());
        let checker = Checker::new(
            ScraperRegistry::new().register(Arc::new(ghcr(pushed))),
            Arc::new(JsonStateStore::new(&path)),
            notifier.clone(),
        );
        checker
            .run(&CancellationToken::new(), &["ghcr.io/org/img:latest"])
            .await
            .unwrap();
        assert_eq!(notifier.events().len(), expect_events);
    }

    let stored = JsonStateStore::new(&path)
        .load("ghcr.io/org/img:latest")
        .await
        .unwrap();
    assert_eq!(stored, Some(ImageState::new(ts(5, 0))));
}
