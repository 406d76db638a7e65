//! Election engine behavior tests
//!
//! Tests for:
//! - First acquisition against an empty store
//! - Follower observation of an existing leader
//! - Renewal idempotence
//! - Takeover of a stale record
//! - Shutdown ordering and listener lifecycle

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use steward_election::{
    ElectionConfig, ElectionListener, LeaderElector, LeaderGuard, LeadershipStatus, LockRecord,
    MemoryLock, ResourceLock,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Started,
    Stopped,
    NewLeader(String),
}

/// Records every callback in order.
#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl ElectionListener for RecordingListener {
    fn started_leading(&self) {
        self.events.lock().push(Event::Started);
    }

    fn stopped_leading(&self) {
        self.events.lock().push(Event::Stopped);
    }

    fn new_leader(&self, identity: &str) {
        self.events.lock().push(Event::NewLeader(identity.to_string()));
    }
}

fn fast_config(identity: &str) -> ElectionConfig {
    ElectionConfig::default().with_identity(identity).with_timings(
        Duration::from_millis(400),
        Duration::from_millis(150),
        Duration::from_millis(40),
    )
}

/// Poll until `f` holds or the timeout elapses.
async fn eventually<F: Fn() -> bool>(timeout: Duration, f: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    f()
}

#[tokio::test]
async fn test_first_candidate_acquires_and_notifies() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let elector = Arc::new(LeaderElector::new(fast_config("a"), lock).unwrap());
    let listener = Arc::new(RecordingListener::default());
    elector.register(listener.clone());

    elector.clone().start().await.unwrap();

    assert!(eventually(Duration::from_secs(1), || elector.is_leader()).await);
    assert_eq!(elector.current_leader(), "a");
    assert_eq!(elector.status(), LeadershipStatus::Leader);
    assert_eq!(
        listener.events(),
        vec![Event::Started, Event::NewLeader("a".to_string())]
    );

    elector.shutdown();
}

#[tokio::test]
async fn test_follower_observes_leader_exactly_once() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let leader = Arc::new(LeaderElector::new(fast_config("a"), lock.clone()).unwrap());
    leader.clone().start().await.unwrap();
    assert!(eventually(Duration::from_secs(1), || leader.is_leader()).await);

    let follower = Arc::new(LeaderElector::new(fast_config("b"), lock).unwrap());
    let listener = Arc::new(RecordingListener::default());
    follower.register(listener.clone());
    follower.clone().start().await.unwrap();

    assert!(
        eventually(Duration::from_secs(1), || follower.current_leader() == "a").await
    );

    // several more ticks must not repeat the observation
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!follower.is_leader());
    assert_eq!(follower.status(), LeadershipStatus::Follower);
    assert_eq!(listener.events(), vec![Event::NewLeader("a".to_string())]);

    leader.shutdown();
    follower.shutdown();
}

#[tokio::test]
async fn test_renewal_changes_only_renew_time() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let elector = Arc::new(LeaderElector::new(fast_config("a"), lock.clone()).unwrap());
    elector.clone().start().await.unwrap();
    assert!(eventually(Duration::from_secs(1), || elector.is_leader()).await);

    let (first, _) = lock.get().await.unwrap().unwrap();

    // let a few renewal cycles run
    let mut renewed = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if lock.get().await.unwrap().unwrap().0.renew_time > first.renew_time {
            renewed = true;
            break;
        }
    }
    assert!(renewed);

    let (current, _) = lock.get().await.unwrap().unwrap();
    assert_eq!(current.holder_identity, first.holder_identity);
    assert_eq!(current.acquire_time, first.acquire_time);
    assert_eq!(current.leader_transitions, first.leader_transitions);
    assert!(current.renew_time > first.renew_time);

    elector.shutdown();
}

#[tokio::test]
async fn test_takeover_of_stale_record_counts_transition() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let aged = Utc::now() - chrono::Duration::seconds(60);
    lock.create(&LockRecord {
        holder_identity: "previous".to_string(),
        lease_duration_seconds: 1,
        acquire_time: aged,
        renew_time: aged,
        leader_transitions: 4,
    })
    .await
    .unwrap();

    let elector = Arc::new(LeaderElector::new(fast_config("a"), lock.clone()).unwrap());
    let listener = Arc::new(RecordingListener::default());
    elector.register(listener.clone());
    elector.clone().start().await.unwrap();

    assert!(eventually(Duration::from_secs(1), || elector.is_leader()).await);

    let (record, _) = lock.get().await.unwrap().unwrap();
    assert_eq!(record.holder_identity, "a");
    assert_eq!(record.leader_transitions, 5);
    assert!(record.acquire_time > aged);

    // the stale holder is observed before we take over
    assert_eq!(
        listener.events(),
        vec![
            Event::NewLeader("previous".to_string()),
            Event::Started,
            Event::NewLeader("a".to_string()),
        ]
    );

    elector.shutdown();
}

#[tokio::test]
async fn test_shutdown_fires_stopped_leading() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let elector = Arc::new(LeaderElector::new(fast_config("a"), lock).unwrap());
    let listener = Arc::new(RecordingListener::default());
    elector.register(listener.clone());

    elector.clone().start().await.unwrap();
    assert!(eventually(Duration::from_secs(1), || elector.is_leader()).await);

    elector.shutdown();
    assert!(
        eventually(Duration::from_secs(1), || elector.status()
            == LeadershipStatus::Stopped)
        .await
    );

    assert!(!elector.is_leader());
    assert_eq!(
        listener.events(),
        vec![
            Event::Started,
            Event::NewLeader("a".to_string()),
            Event::Stopped,
        ]
    );
}

#[tokio::test]
async fn test_deregistered_listener_receives_nothing_further() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let elector = Arc::new(LeaderElector::new(fast_config("a"), lock).unwrap());
    let kept = Arc::new(RecordingListener::default());
    let dropped = Arc::new(RecordingListener::default());
    elector.register(kept.clone());
    elector.register(dropped.clone());

    elector.clone().start().await.unwrap();
    assert!(eventually(Duration::from_secs(1), || elector.is_leader()).await);

    let dropped_dyn: Arc<dyn ElectionListener> = dropped.clone();
    elector.deregister(&dropped_dyn);
    let seen_before_shutdown = dropped.events();

    elector.shutdown();
    assert!(
        eventually(Duration::from_secs(1), || elector.status()
            == LeadershipStatus::Stopped)
        .await
    );

    assert_eq!(dropped.events(), seen_before_shutdown);
    assert_eq!(kept.events().last(), Some(&Event::Stopped));
}

#[tokio::test]
async fn test_guard_waits_for_leadership() {
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    let elector = Arc::new(LeaderElector::new(fast_config("a"), lock).unwrap());
    let guard = LeaderGuard::new(elector.clone());

    assert!(!guard.should_process());
    assert!(guard.run_if_leader(|| async { 42 }).await.is_none());

    elector.clone().start().await.unwrap();
    assert!(guard.wait_for_leadership().await);
    assert!(guard.should_process());
    assert_eq!(guard.run_if_leader(|| async { 42 }).await, Some(42));

    elector.shutdown();
}

#[tokio::test]
async fn test_guard_returns_false_when_election_stops() {
    // a candidate that can never win: someone else holds a live lease
    let lock = Arc::new(MemoryLock::new("test:leader-election"));
    lock.create(&LockRecord::new(
        "other",
        Duration::from_secs(3600),
        Utc::now(),
    ))
    .await
    .unwrap();

    let elector = Arc::new(LeaderElector::new(fast_config("b"), lock).unwrap());
    let guard = LeaderGuard::new(elector.clone());

    elector.clone().start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    elector.shutdown();

    assert!(!guard.wait_for_leadership().await);
}
