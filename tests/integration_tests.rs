//! Integration tests for the waiting-room service
//!
//! These tests drive the registry the way the HTTP layer does and check the
//! admission rules end to end:
//! - capacity and FIFO promotion
//! - admission windows and the sweeper
//! - statistics bookkeeping across exits, resets and deletes
//! - implicit booking queues

mod fixtures;

use chrono::Duration;
use fixtures::{create_request, TestSystem, KNOWN_PERFORMANCE, KNOWN_SCHEDULE};
use waiting_room::error::AdmissionError;
use waiting_room::queue::{SweepPolicy, TtlSweeper};
use waiting_room::types::{EntryStatus, PositionStatus, QueueFilter, QueueType, UpdateQueueRequest};

fn count_of(stats: &waiting_room::types::QueueStatistics, status: EntryStatus) -> u64 {
    stats
        .status_counts
        .iter()
        .find(|c| c.status == status)
        .map(|c| c.count)
        .unwrap_or_default()
}

fn admission_error(err: &anyhow::Error) -> &AdmissionError {
    err.downcast_ref::<AdmissionError>()
        .expect("expected an AdmissionError")
}

#[tokio::test]
async fn test_exit_promotes_next_in_line() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 2, 10).await;
    let registry = &system.registry;

    assert_eq!(
        registry.join(queue, "A").await.unwrap().status,
        PositionStatus::Enterable
    );
    assert_eq!(
        registry.join(queue, "B").await.unwrap().status,
        PositionStatus::Enterable
    );

    let c = registry.join(queue, "C").await.unwrap();
    assert_eq!(c.status, PositionStatus::Waiting);
    assert_eq!(c.my_rank, Some(1));
    assert_eq!(c.ahead_count, Some(0));

    assert!(registry.exit(queue, "A").await.unwrap());

    let c = registry.position(queue, "C").await.unwrap();
    assert_eq!(c.status, PositionStatus::Enterable);
    assert_eq!(c.my_rank, None);
    assert!(c.expires_at.is_some());

    println!("✅ Exit promotion scenario passed");
}

#[tokio::test]
async fn test_sweep_expires_elapsed_admission() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 5, 10).await;
    let registry = &system.registry;

    registry.join(queue, "A").await.unwrap();
    system.advance_minutes(11);

    let report = registry.sweep_all().await.unwrap();
    assert_eq!(report.expired, 1);

    let stats = registry.statistics(queue).await.unwrap();
    assert_eq!(stats.current_enterable, 0);
    assert_eq!(count_of(&stats, EntryStatus::Expired), 1);
    assert_eq!(stats.total_entries, 1);

    // The outcome stays visible to a polling client
    assert_eq!(
        registry.position(queue, "A").await.unwrap().status,
        PositionStatus::Expired
    );
}

#[tokio::test]
async fn test_sweep_expiry_promotes_waiting_entry() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 1, 5).await;
    let registry = &system.registry;

    registry.join(queue, "A").await.unwrap();
    let b = registry.join(queue, "B").await.unwrap();
    assert_eq!(b.status, PositionStatus::Waiting);
    assert_eq!(b.my_rank, Some(1));

    system.advance_minutes(6);
    let report = registry.sweep_all().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.promoted, 1);

    assert_eq!(
        registry.position(queue, "B").await.unwrap().status,
        PositionStatus::Enterable
    );
}

#[tokio::test]
async fn test_position_expires_lazily_without_sweep() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 1, 5).await;
    let registry = &system.registry;

    registry.join(queue, "A").await.unwrap();
    registry.join(queue, "B").await.unwrap();
    system.advance_minutes(5);

    assert_eq!(
        registry.position(queue, "A").await.unwrap().status,
        PositionStatus::Expired
    );
    assert_eq!(
        registry.position(queue, "B").await.unwrap().status,
        PositionStatus::Enterable
    );
}

#[tokio::test]
async fn test_capacity_is_never_exceeded() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 3, 10).await;
    let registry = &system.registry;

    for i in 0..20 {
        registry.join(queue, &format!("subject-{}", i)).await.unwrap();
        let summary = registry.get_queue(queue).await.unwrap();
        assert!(summary.current_enterable <= 3);
    }

    for i in 0..3 {
        registry
            .complete(queue, &format!("subject-{}", i))
            .await
            .unwrap();
        let summary = registry.get_queue(queue).await.unwrap();
        assert_eq!(summary.current_enterable, 3);
    }

    // Promotion followed join order
    for i in 3..6 {
        assert_eq!(
            registry
                .position(queue, &format!("subject-{}", i))
                .await
                .unwrap()
                .status,
            PositionStatus::Enterable
        );
    }
    let next = registry.position(queue, "subject-6").await.unwrap();
    assert_eq!(next.my_rank, Some(1));
}

#[tokio::test]
async fn test_ranks_follow_join_order() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 1, 10).await;
    let registry = &system.registry;

    registry.join(queue, "holder").await.unwrap();
    for name in ["w1", "w2", "w3", "w4"] {
        registry.join(queue, name).await.unwrap();
    }

    registry.exit(queue, "w2").await.unwrap();

    let w3 = registry.position(queue, "w3").await.unwrap();
    assert_eq!(w3.my_rank, Some(2));
    assert_eq!(w3.ahead_count, Some(1));
    let w4 = registry.position(queue, "w4").await.unwrap();
    assert_eq!(w4.my_rank, Some(3));

    // Joining again keeps the original place
    let again = registry.join(queue, "w4").await.unwrap();
    assert_eq!(again.my_rank, Some(3));
    assert_eq!(again.enqueued_at, w4.enqueued_at);
}

#[tokio::test]
async fn test_complete_requires_enterable_entry() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 1, 10).await;
    let registry = &system.registry;

    registry.join(queue, "A").await.unwrap();
    registry.join(queue, "B").await.unwrap();

    let err = registry.complete(queue, "B").await.unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::PreconditionFailed { .. }
    ));

    let err = registry.complete(queue, "nobody").await.unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::EntryNotFound { .. }
    ));

    let done = registry.complete(queue, "A").await.unwrap();
    assert_eq!(done.status, PositionStatus::Completed);

    let err = registry.complete(queue, "A").await.unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::PreconditionFailed { .. }
    ));
}

#[tokio::test]
async fn test_status_counts_sum_to_created_entries() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 2, 5).await;
    let registry = &system.registry;

    for name in ["A", "B", "C", "D", "E"] {
        registry.join(queue, name).await.unwrap();
    }
    registry.complete(queue, "A").await.unwrap();
    // Exits never move a status counter
    registry.exit(queue, "E").await.unwrap();
    system.advance_minutes(6);
    registry.sweep_all().await.unwrap();

    let stats = registry.statistics(queue).await.unwrap();
    let sum: u64 = stats.status_counts.iter().map(|c| c.count).sum();
    assert_eq!(stats.status_counts.len(), 4);
    assert_eq!(sum, stats.total_entries);
    assert_eq!(stats.total_entries, 5);
    assert_eq!(stats.transitions.created, 5);
    assert_eq!(count_of(&stats, EntryStatus::Completed), 1);
    assert_eq!(count_of(&stats, EntryStatus::Expired), 2);
}

#[tokio::test]
async fn test_reset_keeps_configuration() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 2, 7).await;
    let registry = &system.registry;

    for name in ["A", "B", "C"] {
        registry.join(queue, name).await.unwrap();
    }

    let summary = registry.reset_queue(queue).await.unwrap();
    assert_eq!(summary.current_waiting, 0);
    assert_eq!(summary.current_enterable, 0);
    assert_eq!(summary.max_active_users, 2);
    assert_eq!(summary.entry_ttl_minutes, 7);

    let stats = registry.statistics(queue).await.unwrap();
    assert!(stats.status_counts.iter().all(|c| c.count == 0));
    assert_eq!(stats.total_entries, 0);

    // The queue keeps working after a reset
    assert_eq!(
        registry.join(queue, "A").await.unwrap().status,
        PositionStatus::Enterable
    );
}

#[tokio::test]
async fn test_update_limits_admits_without_evicting() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 2, 10).await;
    let registry = &system.registry;

    for name in ["A", "B", "C", "D"] {
        registry.join(queue, name).await.unwrap();
    }

    let grown = registry
        .update_queue(
            queue,
            UpdateQueueRequest {
                max_active_users: Some(3),
                entry_ttl_minutes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(grown.current_enterable, 3);
    assert_eq!(grown.current_waiting, 1);

    let shrunk = registry
        .update_queue(
            queue,
            UpdateQueueRequest {
                max_active_users: Some(1),
                entry_ttl_minutes: Some(20),
            },
        )
        .await
        .unwrap();
    assert_eq!(shrunk.current_enterable, 3);
    assert_eq!(shrunk.entry_ttl_minutes, 20);

    // Slots free up without promotion until below the new cap
    registry.complete(queue, "A").await.unwrap();
    assert_eq!(
        registry.position(queue, "D").await.unwrap().status,
        PositionStatus::Waiting
    );

    let err = registry
        .update_queue(
            queue,
            UpdateQueueRequest {
                max_active_users: Some(0),
                entry_ttl_minutes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::InvalidConfiguration { .. }
    ));
}

#[tokio::test]
async fn test_duplicate_queue_rejected() {
    let system = TestSystem::new();
    system.booking_queue("perf-1", 2, 10).await;

    let err = system
        .registry
        .create_queue(create_request("perf-1", QueueType::BookingOrder, 5, 5))
        .await
        .unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::DuplicateQueue { .. }
    ));

    // A different queue type for the same performance is fine
    system
        .registry
        .create_queue(create_request("perf-1", QueueType::Lottery, 5, 5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_and_delete_queues() {
    let system = TestSystem::new();
    let registry = &system.registry;

    let q1 = system.booking_queue("perf-1", 2, 10).await;
    registry
        .create_queue(create_request("perf-1", QueueType::Promotion, 2, 10))
        .await
        .unwrap();
    system.booking_queue("perf-2", 2, 10).await;

    let all = registry.list_queues(&QueueFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let perf_1 = registry
        .list_queues(&QueueFilter {
            performance_id: Some("perf-1".to_string()),
            queue_type: None,
        })
        .await
        .unwrap();
    assert_eq!(perf_1.len(), 2);

    let booking = registry
        .list_queues(&QueueFilter {
            performance_id: None,
            queue_type: Some(QueueType::BookingOrder),
        })
        .await
        .unwrap();
    assert_eq!(booking.len(), 2);

    registry.join(q1, "A").await.unwrap();
    registry.delete_queue(q1).await.unwrap();

    let err = registry.position(q1, "A").await.unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::QueueNotFound { .. }
    ));
    let err = registry.delete_queue(q1).await.unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::QueueNotFound { .. }
    ));
}

#[tokio::test]
async fn test_start_booking_opens_queue_once() {
    let system = TestSystem::new();
    let registry = &system.registry;

    let first = registry.start_booking(KNOWN_SCHEDULE, "A").await.unwrap();
    let second = registry.start_booking(KNOWN_SCHEDULE, "B").await.unwrap();
    assert_eq!(first.queue_id, second.queue_id);
    assert_eq!(registry.queue_count().unwrap(), 1);

    let summary = registry.get_queue(first.queue_id).await.unwrap();
    assert_eq!(summary.performance_id, KNOWN_PERFORMANCE);
    assert_eq!(summary.schedule_id.as_deref(), Some(KNOWN_SCHEDULE));
    assert_eq!(summary.queue_type, QueueType::BookingOrder);

    let err = registry.start_booking("sch-unknown", "A").await.unwrap_err();
    assert!(matches!(
        admission_error(&err),
        AdmissionError::QueueNotFound { .. }
    ));
}

#[tokio::test]
async fn test_start_booking_uses_existing_performance_queue() {
    let system = TestSystem::new();
    let queue = system.booking_queue(KNOWN_PERFORMANCE, 1, 10).await;

    let view = system
        .registry
        .start_booking(KNOWN_SCHEDULE, "A")
        .await
        .unwrap();
    assert_eq!(view.queue_id, queue);
    assert_eq!(system.registry.queue_count().unwrap(), 1);
}

#[tokio::test]
async fn test_abandoned_waiters_are_reclaimed() {
    let system = TestSystem::with_policy(SweepPolicy {
        abandon_after: Some(Duration::seconds(30)),
        outcome_retention: Duration::minutes(10),
    });
    let queue = system.booking_queue("perf-1", 1, 10).await;
    let registry = &system.registry;

    registry.join(queue, "holder").await.unwrap();
    registry.join(queue, "polling").await.unwrap();
    registry.join(queue, "gone").await.unwrap();

    system.clock.advance(Duration::seconds(20));
    registry.position(queue, "polling").await.unwrap();
    system.clock.advance(Duration::seconds(20));

    let report = registry.sweep_all().await.unwrap();
    assert_eq!(report.abandoned, 1);

    assert_eq!(
        registry.position(queue, "gone").await.unwrap().status,
        PositionStatus::NotInQueue
    );
    let polling = registry.position(queue, "polling").await.unwrap();
    assert_eq!(polling.status, PositionStatus::Waiting);
    assert_eq!(polling.my_rank, Some(1));

    // Admitted holders are never reclaimed for idling
    assert_eq!(
        registry.position(queue, "holder").await.unwrap().status,
        PositionStatus::Enterable
    );
}

#[tokio::test]
async fn test_sweeper_records_runs() {
    let system = TestSystem::new();
    let queue = system.booking_queue("perf-1", 1, 1).await;
    system.registry.join(queue, "A").await.unwrap();
    system.registry.join(queue, "B").await.unwrap();
    system.advance_minutes(2);

    let sweeper = TtlSweeper::new(
        system.registry.clone(),
        std::time::Duration::from_secs(1),
    );
    let status = sweeper.status();
    let report = sweeper.run_once().await.unwrap();

    assert_eq!(report.expired, 1);
    assert_eq!(report.promoted, 1);
    assert_eq!(status.runs(), 1);
    assert_eq!(status.failures(), 0);
    assert!(status.last_run().is_some());
}
