//! Integration tests for the pool gate against the in-memory ticket store.
//!
//! Covers bypass mode, the concurrency bound, FIFO admission, the timeout
//! race, retry budget exhaustion, and store failure propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dpool::{PoolConfig, PoolError, PoolGate, Ticket, TicketStore};
use dpool_testkit::InMemoryTicketStore;
use tokio::time::timeout;

const TABLE: &str = "pool-tickets";

/// Defaults tightened for tests: fast polling, everything else stock.
fn test_config() -> PoolConfig {
    PoolConfig {
        min_wait_queue_ms: 10,
        wait_variance_ms: 5,
        ..PoolConfig::new(TABLE)
    }
}

fn gate(store: &InMemoryTicketStore, config: PoolConfig) -> Arc<PoolGate<InMemoryTicketStore>> {
    Arc::new(PoolGate::new(Arc::new(store.clone()), config).unwrap())
}

#[tokio::test]
async fn bypass_runs_operation_and_cleanup_without_store() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        bypass: true,
        ..test_config()
    };
    let gate = gate(&store, config);

    let op_runs = Arc::new(AtomicUsize::new(0));
    let cleanup_runs = Arc::new(AtomicUsize::new(0));
    let op_runs_in_op = op_runs.clone();
    let op_runs_in_cleanup = op_runs.clone();
    let cleanup_runs_in_cleanup = cleanup_runs.clone();

    let result = gate
        .run(
            move || async move {
                op_runs_in_op.fetch_add(1, Ordering::SeqCst);
                42
            },
            move || async move {
                // Cleanup must run after the operation.
                assert_eq!(op_runs_in_cleanup.load(Ordering::SeqCst), 1);
                cleanup_runs_in_cleanup.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            },
        )
        .await
        .unwrap();

    assert_eq!(result, 42);
    assert_eq!(op_runs.load(Ordering::SeqCst), 1);
    assert_eq!(cleanup_runs.load(Ordering::SeqCst), 1);
    assert_eq!(store.stats().total(), 0, "bypass must not touch the store");
}

#[tokio::test]
async fn empty_pool_admits_immediately_and_retires_ticket() {
    let store = InMemoryTicketStore::new();
    let gate = gate(&store, test_config());

    let result = gate
        .run(|| async { "done" }, || async { anyhow::Ok(()) })
        .await
        .unwrap();

    assert_eq!(result, "done");
    assert!(store.tickets(TABLE, "pool1").is_empty());
    let stats = store.stats();
    assert_eq!(stats.puts, 1);
    assert_eq!(stats.deletes, 1);
    assert!(stats.queries >= 1);
}

#[tokio::test]
async fn retry_budget_exhausted_when_pool_stays_full() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        pool_size: 1,
        max_retries: 0,
        ..test_config()
    };

    // A competing worker already holds the only slot.
    let holder = Ticket::new("pool1", chrono::Duration::seconds(30));
    store.put(TABLE, &holder).await.unwrap();

    let gate = gate(&store, config);
    let op_runs = Arc::new(AtomicUsize::new(0));
    let op_runs_in_op = op_runs.clone();

    let result = gate
        .run(
            move || async move {
                op_runs_in_op.fetch_add(1, Ordering::SeqCst);
            },
            || async { anyhow::Ok(()) },
        )
        .await;

    assert!(matches!(
        result,
        Err(PoolError::RetryBudgetExhausted { retries: 1, .. })
    ));
    assert_eq!(op_runs.load(Ordering::SeqCst), 0, "operation must not run");

    // The loser's own ticket is released; the holder's remains.
    let remaining = store.tickets(TABLE, "pool1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, holder.id);
}

#[tokio::test]
async fn slow_operation_loses_the_timeout_race() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        timeout_ms: 50,
        ..test_config()
    };
    let gate = gate(&store, config);

    let op_finished = Arc::new(AtomicUsize::new(0));
    let cleanup_runs = Arc::new(AtomicUsize::new(0));
    let op_finished_in_op = op_finished.clone();
    let cleanup_runs_in_cleanup = cleanup_runs.clone();

    let result = timeout(
        Duration::from_secs(5),
        gate.run(
            move || async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                op_finished_in_op.fetch_add(1, Ordering::SeqCst);
                7
            },
            move || async move {
                cleanup_runs_in_cleanup.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            },
        ),
    )
    .await
    .unwrap();

    match result {
        Err(PoolError::Timeout { elapsed_ms, .. }) => assert!(elapsed_ms >= 40),
        other => panic!("expected Timeout, got {other:?}"),
    }
    // Cleanup already ran by the time the failure is observable, the
    // operation never finished, and the ticket is gone.
    assert_eq!(cleanup_runs.load(Ordering::SeqCst), 1);
    assert_eq!(op_finished.load(Ordering::SeqCst), 0);
    assert!(store.tickets(TABLE, "pool1").is_empty());
}

#[tokio::test]
async fn timeout_while_queued_behind_full_pool() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        pool_size: 1,
        timeout_ms: 60,
        max_retries: 1000,
        ..test_config()
    };

    let holder = Ticket::new("pool1", chrono::Duration::seconds(30));
    store.put(TABLE, &holder).await.unwrap();

    let gate = gate(&store, config);
    let op_runs = Arc::new(AtomicUsize::new(0));
    let op_runs_in_op = op_runs.clone();

    let result = timeout(
        Duration::from_secs(5),
        gate.run(
            move || async move {
                op_runs_in_op.fetch_add(1, Ordering::SeqCst);
            },
            || async { anyhow::Ok(()) },
        ),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(PoolError::Timeout { .. })));
    assert_eq!(op_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn at_most_pool_size_operations_run_concurrently() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        pool_size: 2,
        ..test_config()
    };
    let gate = gate(&store, config);

    let active = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let gate = gate.clone();
        let active = active.clone();
        let high_water = high_water.clone();
        handles.push(tokio::spawn(async move {
            gate.run(
                move || async move {
                    let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now_active, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                },
                || async { anyhow::Ok(()) },
            )
            .await
        }));
        // Stagger enqueues so ticket ids land in distinct milliseconds.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for handle in handles {
        timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    assert!(high_water.load(Ordering::SeqCst) <= 2);
    assert!(store.tickets(TABLE, "pool1").is_empty());
}

#[tokio::test]
async fn admission_is_fifo_by_creation_order() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        pool_size: 1,
        ..test_config()
    };
    let gate = gate(&store, config);

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for label in ["a", "b", "c"] {
        let gate = gate.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            gate.run(
                move || async move {
                    order.lock().unwrap().push(label);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                },
                || async { anyhow::Ok(()) },
            )
            .await
        }));
        // Enqueue strictly in label order.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for handle in handles {
        timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn queued_caller_admitted_once_holder_expires() {
    let store = InMemoryTicketStore::new();
    let config = PoolConfig {
        pool_size: 1,
        timeout_ms: 5000,
        max_retries: 1000,
        ..test_config()
    };

    // Holder that never retires its ticket; the slot only frees when its
    // logical expiry passes.
    let holder = Ticket::new("pool1", chrono::Duration::milliseconds(150));
    store.put(TABLE, &holder).await.unwrap();

    let gate = gate(&store, config);
    let admitted_at = Arc::new(Mutex::new(None));
    let admitted_at_in_op = admitted_at.clone();

    timeout(
        Duration::from_secs(5),
        gate.run(
            move || async move {
                *admitted_at_in_op.lock().unwrap() = Some(Utc::now());
            },
            || async { anyhow::Ok(()) },
        ),
    )
    .await
    .unwrap()
    .unwrap();

    let admitted_at = admitted_at.lock().unwrap().expect("operation ran");
    assert!(
        admitted_at >= holder.logical_expiry,
        "admitted at {admitted_at}, holder expires {}",
        holder.logical_expiry
    );
}

#[tokio::test]
async fn deleting_a_ticket_twice_is_not_an_error() {
    let store = InMemoryTicketStore::new();
    let ticket = Ticket::new("pool1", chrono::Duration::seconds(10));
    store.put(TABLE, &ticket).await.unwrap();

    store.delete(TABLE, "pool1", ticket.id).await.unwrap();
    store.delete(TABLE, "pool1", ticket.id).await.unwrap();
}

#[tokio::test]
async fn store_failures_propagate_unmodified() {
    let store = InMemoryTicketStore::new();
    let gate = gate(&store, test_config());
    store.poison("provisioned throughput exceeded");

    let op_runs = Arc::new(AtomicUsize::new(0));
    let op_runs_in_op = op_runs.clone();

    let result = gate
        .run(
            move || async move {
                op_runs_in_op.fetch_add(1, Ordering::SeqCst);
            },
            || async { anyhow::Ok(()) },
        )
        .await;

    match result {
        Err(PoolError::Store(err)) => {
            assert!(err.to_string().contains("provisioned throughput"))
        }
        other => panic!("expected Store failure, got {other:?}"),
    }
    assert_eq!(op_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn normal_path_cleanup_failure_propagates() {
    let store = InMemoryTicketStore::new();
    let gate = gate(&store, test_config());

    let result = gate
        .run(
            || async { 1 },
            || async { Err(anyhow::anyhow!("connection already closed")) },
        )
        .await;

    assert!(matches!(result, Err(PoolError::Cleanup(_))));
}

#[test]
fn gate_rejects_invalid_config() {
    let store = Arc::new(InMemoryTicketStore::new());
    let config = PoolConfig {
        pool_size: 0,
        ..PoolConfig::new(TABLE)
    };
    assert!(matches!(
        PoolGate::new(store, config),
        Err(PoolError::InvalidConfig(_))
    ));
}
