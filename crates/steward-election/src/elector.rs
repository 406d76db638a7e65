//! The election engine and its public handle.
//!
//! One spawned task runs the whole state machine: every store read/write
//! and every listener dispatch happens on that task, so transitions are
//! single-writer and callbacks are totally ordered. Accessors only touch
//! candidate-local state under its own lock, never the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::ElectionConfig;
use crate::error::{ElectionError, Result};
use crate::listener::{ElectionEvent, ElectionListener, ListenerSet};
use crate::lock::ResourceLock;
use crate::record::LockRecord;

/// Acquisition retries are spread over `retry_period * (1 + rand * factor)`
/// so competing candidates don't hammer the store in lockstep. Renewals by
/// the sitting leader stay un-jittered to keep the deadline math tight.
const RETRY_JITTER_FACTOR: f64 = 1.2;

/// Where this candidate currently stands in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipStatus {
    /// No successful read of the lock record yet.
    Unknown,
    /// Another candidate holds the lease, or nobody does.
    Follower,
    /// This candidate holds a valid, self-renewed lease.
    Leader,
    /// The engine has shut down. Terminal.
    Stopped,
}

/// Candidate-local state owned by the engine task.
struct ElectorState {
    /// Last holder identity observed in the record; may name another
    /// candidate while we are a follower. Empty until the first read.
    observed_leader: String,
    /// Monotonic time of our last successful renewal; `None` while not
    /// leading. The renew deadline is measured from here.
    last_renew: Option<Instant>,
}

/// Handle for one candidate's participation in a leader election.
///
/// Combines the engine, the listener registry, and the polling accessors.
/// Several elections over different lock names can coexist in one process;
/// nothing here is global.
pub struct LeaderElector {
    config: ElectionConfig,
    lock: Arc<dyn ResourceLock>,
    state: Mutex<ElectorState>,
    is_leader: AtomicBool,
    running: AtomicBool,
    stopped: AtomicBool,
    listeners: ListenerSet,
    shutdown_tx: broadcast::Sender<()>,
    status_tx: watch::Sender<LeadershipStatus>,
    status_rx: watch::Receiver<LeadershipStatus>,
}

impl LeaderElector {
    /// Create a candidate over the given lock backend. Fails fast on
    /// invalid timing configuration.
    pub fn new(config: ElectionConfig, lock: Arc<dyn ResourceLock>) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let (status_tx, status_rx) = watch::channel(LeadershipStatus::Unknown);

        Ok(Self {
            config,
            lock,
            state: Mutex::new(ElectorState {
                observed_leader: String::new(),
                last_renew: None,
            }),
            is_leader: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            listeners: ListenerSet::default(),
            shutdown_tx,
            status_tx,
            status_rx,
        })
    }

    /// This candidate's identity.
    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    /// Whether this candidate currently believes it is the leader. Stale by
    /// at most `renew_deadline` after the lease is actually lost.
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// The last observed holder identity; empty if none observed yet.
    pub fn current_leader(&self) -> String {
        self.state.lock().observed_leader.clone()
    }

    /// Current leadership status.
    pub fn status(&self) -> LeadershipStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to leadership status changes.
    pub fn subscribe(&self) -> watch::Receiver<LeadershipStatus> {
        self.status_rx.clone()
    }

    /// Register a listener for election events. No-op once the engine has
    /// stopped.
    pub fn register(&self, listener: Arc<dyn ElectionListener>) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        self.listeners.register(listener);
    }

    /// Remove a previously registered listener.
    pub fn deregister(&self, listener: &Arc<dyn ElectionListener>) {
        self.listeners.deregister(listener);
    }

    /// Join the election: spawns the engine loop as a background task.
    /// Returns [`ElectionError::AlreadyRunning`] on a second start.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ElectionError::AlreadyRunning);
        }

        info!(
            identity = %self.config.identity,
            component = %self.config.component_name,
            lock = %self.lock.key(),
            "starting leader election"
        );

        // Subscribe before spawning so a shutdown issued right after
        // start() cannot slip past the loop.
        let shutdown_rx = self.shutdown_tx.subscribe();
        let elector = self.clone();
        tokio::spawn(async move {
            elector.run_loop(shutdown_rx).await;
        });
        Ok(())
    }

    /// Request shutdown. The loop finishes any in-flight store call, fires
    /// `stopped_leading` if it was leading, and exits. The lease is left to
    /// expire naturally: a best-effort delete could race a legitimate new
    /// holder.
    pub fn shutdown(&self) {
        info!(identity = %self.config.identity, "stopping leader election");
        let _ = self.shutdown_tx.send(());
    }

    async fn run_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            self.election_tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.next_wait()) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        if self.is_leader() {
            self.demote("shutting down");
        }
        self.stopped.store(true, Ordering::SeqCst);
        self.set_status(LeadershipStatus::Stopped);
        info!(identity = %self.config.identity, "leader election stopped");
    }

    /// One pass of the state machine: renew if leading, otherwise try to
    /// acquire.
    async fn election_tick(&self) {
        if self.is_leader() {
            self.renew_tick().await;
        } else {
            self.acquire_tick().await;
        }
    }

    fn next_wait(&self) -> Duration {
        if self.is_leader() {
            self.config.retry_period
        } else {
            let factor = 1.0 + rand::thread_rng().gen::<f64>() * RETRY_JITTER_FACTOR;
            self.config.retry_period.mul_f64(factor)
        }
    }

    /// Follower path: read the record and create or claim it if we may.
    async fn acquire_tick(&self) {
        let now = Utc::now();

        match self.lock.get().await {
            Ok(None) => {
                let record =
                    LockRecord::new(&self.config.identity, self.config.lease_duration, now);
                match self.lock.create(&record).await {
                    Ok(()) => self.promote(),
                    Err(e) if e.is_race() => {
                        debug!(
                            identity = %self.config.identity,
                            "lost creation race; another candidate claimed the lock first"
                        );
                        self.set_status(LeadershipStatus::Follower);
                    }
                    Err(e) => {
                        debug!(
                            identity = %self.config.identity,
                            error = %e,
                            "failed to create lock record"
                        );
                        self.set_status(LeadershipStatus::Unknown);
                    }
                }
            }
            Ok(Some((record, version))) => {
                self.observe(&record.holder_identity);

                let claimable = record.holder_identity == self.config.identity
                    || record.holder_identity.is_empty()
                    || record.is_expired(now, self.config.lease_duration);
                if !claimable {
                    self.set_status(LeadershipStatus::Follower);
                    return;
                }

                let claimed = record.claimed_by(&self.config.identity, now);
                match self.lock.update(&claimed, &version).await {
                    Ok(()) => self.promote(),
                    Err(e) if e.is_race() => {
                        debug!(
                            identity = %self.config.identity,
                            "lost claim race; re-observing on next tick"
                        );
                        self.set_status(LeadershipStatus::Follower);
                    }
                    Err(e) => {
                        debug!(
                            identity = %self.config.identity,
                            error = %e,
                            "failed to claim lock record"
                        );
                    }
                }
            }
            Err(e) => {
                debug!(
                    identity = %self.config.identity,
                    error = %e,
                    "failed to read lock record"
                );
            }
        }
    }

    /// Leader path: refresh `renew_time` against the current version token.
    /// Any failure is pessimistic; the renew deadline decides demotion.
    async fn renew_tick(&self) {
        let now = Utc::now();

        let renewed = match self.lock.get().await {
            Ok(Some((record, version))) => {
                if record.holder_identity != self.config.identity {
                    // Another candidate already seized the lease while our
                    // renewals were failing.
                    self.demote("lease seized by another candidate");
                    self.observe(&record.holder_identity);
                    return;
                }
                match self.lock.update(&record.renewed(now), &version).await {
                    Ok(()) => true,
                    Err(e) if e.is_race() => {
                        debug!(
                            identity = %self.config.identity,
                            "renewal hit a version conflict"
                        );
                        false
                    }
                    Err(e) => {
                        debug!(
                            identity = %self.config.identity,
                            error = %e,
                            "failed to write lease renewal"
                        );
                        false
                    }
                }
            }
            Ok(None) => {
                debug!(
                    identity = %self.config.identity,
                    "lock record missing during renewal"
                );
                false
            }
            Err(e) => {
                debug!(
                    identity = %self.config.identity,
                    error = %e,
                    "failed to read lock record during renewal"
                );
                false
            }
        };

        if renewed {
            self.state.lock().last_renew = Some(Instant::now());
            debug!(identity = %self.config.identity, "renewed leadership lease");
            return;
        }

        let deadline_exceeded = {
            let state = self.state.lock();
            state
                .last_renew
                .map_or(true, |t| t.elapsed() >= self.config.renew_deadline)
        };
        if deadline_exceeded {
            self.demote("renew deadline exceeded");
        }
    }

    /// Transition to leader. Only the engine task calls this.
    fn promote(&self) {
        let observed_changed = {
            let mut state = self.state.lock();
            state.last_renew = Some(Instant::now());
            let changed = state.observed_leader != self.config.identity;
            if changed {
                state.observed_leader = self.config.identity.clone();
            }
            changed
        };

        self.is_leader.store(true, Ordering::SeqCst);
        self.set_status(LeadershipStatus::Leader);
        info!(
            identity = %self.config.identity,
            lock = %self.lock.key(),
            "acquired leadership lease"
        );

        self.listeners.notify(&ElectionEvent::StartedLeading);
        if observed_changed {
            self.listeners
                .notify(&ElectionEvent::NewLeader(self.config.identity.clone()));
        }
    }

    /// Transition to follower. Only the engine task calls this.
    fn demote(&self, reason: &str) {
        self.is_leader.store(false, Ordering::SeqCst);
        self.state.lock().last_renew = None;
        self.set_status(LeadershipStatus::Follower);
        warn!(identity = %self.config.identity, reason, "lost leadership lease");

        self.listeners.notify(&ElectionEvent::StoppedLeading);
    }

    /// Track the holder identity seen in the record, firing `new_leader`
    /// whenever it changes. Empty holders are not an observation.
    fn observe(&self, holder: &str) {
        if holder.is_empty() {
            return;
        }
        let changed = {
            let mut state = self.state.lock();
            if state.observed_leader != holder {
                state.observed_leader = holder.to_string();
                true
            } else {
                false
            }
        };
        if changed {
            info!(
                identity = %self.config.identity,
                leader = %holder,
                "observed new leader"
            );
            self.listeners
                .notify(&ElectionEvent::NewLeader(holder.to_string()));
        }
    }

    fn set_status(&self, status: LeadershipStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}

/// Gates work on leadership status.
pub struct LeaderGuard {
    elector: Arc<LeaderElector>,
}

impl LeaderGuard {
    pub fn new(elector: Arc<LeaderElector>) -> Self {
        Self { elector }
    }

    /// Whether this instance should be doing leader-only work right now.
    pub fn should_process(&self) -> bool {
        self.elector.is_leader()
    }

    /// Run a closure only if we currently lead.
    pub async fn run_if_leader<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if self.elector.is_leader() {
            Some(f().await)
        } else {
            None
        }
    }

    /// Block until this candidate becomes leader. Returns false if the
    /// election stopped first.
    pub async fn wait_for_leadership(&self) -> bool {
        let mut rx = self.elector.subscribe();
        loop {
            match *rx.borrow_and_update() {
                LeadershipStatus::Leader => return true,
                LeadershipStatus::Stopped => return false,
                _ => {}
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryLock;

    fn fast_config(identity: &str) -> ElectionConfig {
        ElectionConfig::default()
            .with_identity(identity)
            .with_timings(
                Duration::from_millis(400),
                Duration::from_millis(150),
                Duration::from_millis(40),
            )
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let lock = Arc::new(MemoryLock::new("test:lock"));
        let elector = Arc::new(LeaderElector::new(fast_config("a"), lock).unwrap());

        elector.clone().start().await.unwrap();
        let err = elector.clone().start().await.unwrap_err();
        assert!(matches!(err, ElectionError::AlreadyRunning));

        elector.shutdown();
    }

    #[tokio::test]
    async fn test_register_after_stop_is_noop() {
        let lock = Arc::new(MemoryLock::new("test:lock"));
        let elector = Arc::new(LeaderElector::new(fast_config("a"), lock).unwrap());

        elector.clone().start().await.unwrap();
        elector.shutdown();

        let mut rx = elector.subscribe();
        while *rx.borrow_and_update() != LeadershipStatus::Stopped {
            rx.changed().await.unwrap();
        }

        struct Noop;
        impl ElectionListener for Noop {
            fn started_leading(&self) {}
            fn stopped_leading(&self) {}
            fn new_leader(&self, _identity: &str) {}
        }

        elector.register(Arc::new(Noop));
        assert_eq!(elector.listeners.len(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let lock = Arc::new(MemoryLock::new("test:lock"));
        let config = ElectionConfig::default().with_timings(
            Duration::from_millis(100),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        assert!(LeaderElector::new(config, lock).is_err());
    }
}
