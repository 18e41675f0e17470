mod common;

use std::time::Duration;

use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use dog_jobs::{
    ConfigStore, JobError, JobOptions, ManagerConfig, QueueError, QueueManager, QueueOptions,
    EMAIL_QUEUE, EXPORTS_QUEUE,
};

use common::{is_completed, next_matching};

/// C1. Defaults Build The Well-Known Queues
#[tokio::test]
async fn test_defaults_build_well_known_queues() {
    let manager = assert_ok!(QueueManager::with_defaults(&ManagerConfig::default()));

    let stats = manager.all_stats();
    let concurrency: Vec<(&str, usize)> = stats
        .iter()
        .map(|(name, stats)| (name.as_str(), stats.concurrency))
        .collect();

    assert_eq!(
        concurrency,
        vec![("default", 5), ("email", 3), ("exports", 2), ("notifications", 10)]
    );
    assert!(stats.values().all(|s| s.processed == 0 && !s.paused));
}

/// C2. Configuration Overrides Concurrency
#[tokio::test]
async fn test_config_overrides_concurrency() {
    let store = ConfigStore::from_vars(
        "DOGJOBS__",
        vec![("DOGJOBS__EXPORTS__CONCURRENCY", "6")],
    );
    let config = assert_ok!(ManagerConfig::from_store(&store));
    let manager = assert_ok!(QueueManager::with_defaults(&config));

    assert_eq!(assert_ok!(manager.queue(EXPORTS_QUEUE)).concurrency(), 6);
    assert_eq!(assert_ok!(manager.queue(EMAIL_QUEUE)).concurrency(), 3);
}

/// C3. Unknown Queue Lookup
#[tokio::test]
async fn test_unknown_queue_lookup() {
    let manager = QueueManager::new();

    let err = assert_err!(manager.queue("reports"));
    assert_eq!(err, QueueError::QueueNotFound("reports".to_string()));
    assert!(manager.get_queue("reports").is_none());
}

/// C4. Re-Creating A Queue Replaces The Mapping
#[tokio::test]
async fn test_recreate_replaces_queue() {
    let manager = QueueManager::new();
    let first = assert_ok!(manager.create_queue("media", QueueOptions::default().with_concurrency(1)));
    first.add("transcode", json!({}), JobOptions::default());

    let second = assert_ok!(manager.create_queue("media", QueueOptions::default().with_concurrency(4)));

    let current = assert_ok!(manager.queue("media"));
    assert_eq!(current.concurrency(), 4);
    assert_eq!(current.stats().jobs.total(), 0);
    assert_eq!(second.concurrency(), 4);
    assert_eq!(manager.queue_names(), vec!["media"]);

    // The replaced queue is still usable by whoever holds it
    assert_eq!(first.stats().jobs.total(), 1);
}

/// C5. Shutdown All Drains Every Queue
#[tokio::test(start_paused = true)]
async fn test_shutdown_all() {
    let manager = assert_ok!(QueueManager::with_defaults(&ManagerConfig::default()));
    let email = assert_ok!(manager.queue(EMAIL_QUEUE));
    email.register_fn("welcome", |_data, _ctx| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok::<_, JobError>(Value::Null)
    });
    let mut events = email.subscribe();

    let job = email.add("welcome", json!({ "to": "ada@example.com" }), JobOptions::default());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(email.in_flight(), 1);

    let reports = manager.shutdown_all(Duration::from_secs(2)).await;

    assert_eq!(reports.len(), 4);
    assert!(reports.values().all(|report| report.drained && report.in_flight == 0));
    assert!(manager.all_stats().values().all(|stats| stats.paused));

    next_matching(&mut events, is_completed).await;
    assert_eq!(email.stats().completed, 1);
    assert!(email.get_job(&job.id).unwrap().completed_at.is_some());
}

/// C6. Configured Shutdown Budget
#[tokio::test(start_paused = true)]
async fn test_shutdown_uses_configured_budget() {
    let mut store = ConfigStore::new();
    store.set("shutdown.timeout_ms", "1500");
    let config = assert_ok!(ManagerConfig::from_store(&store));
    let manager = assert_ok!(QueueManager::with_defaults(&config));
    assert_eq!(manager.shutdown_timeout(), Duration::from_millis(1500));
    assert_eq!(QueueManager::new().shutdown_timeout(), Duration::from_secs(10));

    // Arrange: one attempt that outlives the budget
    let exports = assert_ok!(manager.queue(EXPORTS_QUEUE));
    exports.register_fn("archive", |_data, _ctx| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<_, JobError>(Value::Null)
    });
    exports.add(
        "archive",
        json!({}),
        JobOptions::default().with_timeout(Duration::from_secs(7200)),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Act
    let started = tokio::time::Instant::now();
    let reports = manager.shutdown().await;

    // Assert: gave up after the configured budget
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1500));
    assert!(elapsed < Duration::from_secs(2));
    assert_eq!(reports[EXPORTS_QUEUE].in_flight, 1);
    assert!(!reports[EXPORTS_QUEUE].drained);
    assert!(reports[EMAIL_QUEUE].drained);
}
