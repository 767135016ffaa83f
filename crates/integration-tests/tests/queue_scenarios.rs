//! End-to-end queue behavior over SQLite: admission, claiming, dead-letter
//! routing, replay and expiry.

mod common;

use common::{descriptor, Harness};
use hookline_core::application::{ReschedulePolicy, TickOutcome, WorkerLoop};
use hookline_core::error::AppError;
use hookline_core::port::item_handler::mocks::ScriptedHandler;
use hookline_core::port::task_scheduler::mocks::ManualScheduler;
use hookline_core::port::{
    DeadLetterStore, Maintenance, MaintenanceConfig, QueueStore, TaskScheduler,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_admission_stops_at_max_depth() {
    let h = Harness::new(vec![descriptor("Q", 3, 2)]).await;

    h.admit("Q", json!("A")).await;
    h.admit("Q", json!("B")).await;
    h.admit("Q", json!("C")).await;

    let err = h
        .admission
        .admit_payload("Q", "test", &json!("D"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Backpressure {
            depth: 3,
            max_depth: 3,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(h.queues.depth("Q").await.unwrap(), 3);
}

#[tokio::test]
async fn test_claims_drain_in_fifo_order() {
    let h = Harness::new(vec![descriptor("Q", 3, 2)]).await;
    for payload in ["A", "B", "C"] {
        h.admit("Q", json!(payload)).await;
    }

    let payloads = |items: Vec<hookline_core::domain::QueueItem>| -> Vec<serde_json::Value> {
        items.into_iter().map(|i| i.payload).collect()
    };

    let first = h.claimer.claim("Q", 2, "w1").await.unwrap();
    assert_eq!(payloads(first), vec![json!("A"), json!("B")]);
    assert_eq!(h.queues.depth("Q").await.unwrap(), 1);

    let second = h.claimer.claim("Q", 2, "w1").await.unwrap();
    assert_eq!(payloads(second), vec![json!("C")]);

    let third = h.claimer.claim("Q", 2, "w1").await.unwrap();
    assert!(third.is_empty());
    assert_eq!(h.queues.depth("Q").await.unwrap(), 0);
}

#[tokio::test]
async fn test_failing_item_is_dead_lettered_and_batch_continues() {
    let h = Harness::new(vec![descriptor("Q", 10, 3)]).await;
    for payload in ["A", "B", "C"] {
        h.admit("Q", json!(payload)).await;
    }

    let handler = Arc::new(ScriptedHandler::new().failing_on(json!("B"), "boom"));
    let scheduler = Arc::new(ManualScheduler::new());
    let worker = WorkerLoop::new(
        "w1",
        h.registry.get("Q").unwrap().clone(),
        h.claimer.clone(),
        handler.clone(),
        h.router.clone(),
        scheduler.clone() as Arc<dyn TaskScheduler>,
        h.clock.clone(),
        ReschedulePolicy::default(),
    );

    let (outcome, delay) = worker.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Processed {
            handled: 2,
            dead_lettered: 1
        }
    );
    assert_eq!(delay, Duration::ZERO);
    assert_eq!(handler.handled_payloads(), vec![json!("A"), json!("C")]);

    let entries = h.dead_letters.list(Some("Q"), 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].original_item.payload, json!("B"));
    assert_eq!(entries[0].error_message, "boom");

    let (outcome, delay) = worker.tick().await;
    assert_eq!(outcome, TickOutcome::Empty);
    assert_eq!(delay, ReschedulePolicy::default().idle_delay);
}

#[tokio::test]
async fn test_replay_returns_item_to_its_queue() {
    let h = Harness::new(vec![descriptor("Q", 10, 5)]).await;
    h.admit("Q", json!({"n": 1})).await;

    let handler = Arc::new(ScriptedHandler::new().failing_on(json!({"n": 1}), "downstream 503"));
    let worker = WorkerLoop::new(
        "w1",
        h.registry.get("Q").unwrap().clone(),
        h.claimer.clone(),
        handler,
        h.router.clone(),
        Arc::new(ManualScheduler::new()) as Arc<dyn TaskScheduler>,
        h.clock.clone(),
        ReschedulePolicy::default(),
    );
    worker.tick().await;
    assert_eq!(h.dead_letters.count(Some("Q")).await.unwrap(), 1);

    let report = h.replayer.replay_queue("Q", 10).await.unwrap();
    assert_eq!(report.replayed.len(), 1);
    assert!(!report.stopped_on_backpressure);
    assert_eq!(h.dead_letters.count(None).await.unwrap(), 0);

    let head = h.queues.peek("Q").await.unwrap().unwrap();
    assert_eq!(head.payload, json!({"n": 1}));
}

#[tokio::test]
async fn test_replay_stops_when_target_queue_is_full() {
    let h = Harness::new(vec![descriptor("Q", 1, 5)]).await;
    h.admit("Q", json!("first")).await;
    h.dead_letter("Q", json!("x"), "e1").await;
    h.dead_letter("Q", json!("y"), "e2").await;

    let report = h.replayer.replay_queue("Q", 10).await.unwrap();
    assert!(report.replayed.is_empty());
    assert!(report.stopped_on_backpressure);
    assert_eq!(h.dead_letters.count(Some("Q")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_expired_queue_is_purged() {
    let h = Harness::new(vec![hookline_core::domain::QueueDescriptor::new(
        "short",
        10,
        5,
        Duration::from_secs(30),
        Duration::from_secs(5),
    )])
    .await;
    h.admit("short", json!(1)).await;
    h.admit("short", json!(2)).await;

    h.clock.advance(31_000);
    assert_eq!(h.queues.depth("short").await.unwrap(), 0);

    let report = h
        .maintenance
        .run_full_maintenance(&MaintenanceConfig::default())
        .await
        .unwrap();
    assert_eq!(report.expired_items, 2);
    assert_eq!(h.maintenance.get_stats().await.unwrap().stored_items, 0);
}

#[tokio::test]
async fn test_unknown_queue_is_rejected_everywhere() {
    let h = Harness::new(vec![descriptor("Q", 3, 2)]).await;

    assert!(h
        .admission
        .admit_payload("nope", "test", &json!(1))
        .await
        .is_err());
    assert!(h.claimer.claim("nope", 1, "w1").await.is_err());
    assert!(h.replayer.replay_queue("nope", 1).await.is_err());
}
