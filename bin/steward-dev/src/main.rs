//! Steward Development Runner
//!
//! Runs leader elections locally so the engine can be watched end to end.
//!
//! ## Modes
//!
//! - **memory (default)**: several in-process candidates compete over an
//!   embedded in-memory lock; kill/restart is simulated by watching the log.
//! - **redis**: a single candidate joins a real election over Redis; run
//!   several copies of this binary to watch failover between processes.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STEWARD_BACKEND` | `memory` | Lock backend: `memory` or `redis` |
//! | `STEWARD_REDIS_URL` | `redis://127.0.0.1:6379` | Redis URL (redis mode) |
//! | `STEWARD_NAMESPACE` | `default` | Scope qualifier for the lock record |
//! | `STEWARD_LOCK_NAME` | `leader-election` | Lock record name |
//! | `STEWARD_IDENTITY` | host-derived | Candidate identity (redis mode) |
//! | `STEWARD_CANDIDATES` | `3` | Number of candidates (memory mode) |
//! | `STEWARD_LEASE_SECS` | `10` | Lease duration |
//! | `STEWARD_RENEW_DEADLINE_SECS` | `5` | Renew deadline |
//! | `STEWARD_RETRY_SECS` | `2` | Retry period |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::info;

use steward_election::{
    ElectionConfig, ElectionListener, LeaderElector, MemoryLock, RedisLock, ResourceLock,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Logs every election event for one candidate.
struct LogListener {
    identity: String,
}

impl ElectionListener for LogListener {
    fn started_leading(&self) {
        info!(identity = %self.identity, "started leading");
    }

    fn stopped_leading(&self) {
        info!(identity = %self.identity, "stopped leading");
    }

    fn new_leader(&self, leader: &str) {
        info!(identity = %self.identity, leader = %leader, "new leader");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    steward_common::logging::init_logging("steward-dev");

    let backend = env_or("STEWARD_BACKEND", "memory");
    let namespace = env_or("STEWARD_NAMESPACE", "default");
    let lock_name = env_or("STEWARD_LOCK_NAME", "leader-election");
    let lease = Duration::from_secs(env_or_parse("STEWARD_LEASE_SECS", 10));
    let renew_deadline = Duration::from_secs(env_or_parse("STEWARD_RENEW_DEADLINE_SECS", 5));
    let retry_period = Duration::from_secs(env_or_parse("STEWARD_RETRY_SECS", 2));

    let base_config = ElectionConfig::default()
        .with_namespace(namespace.clone())
        .with_lock_name(lock_name.clone())
        .with_timings(lease, renew_deadline, retry_period);

    let mut electors: Vec<Arc<LeaderElector>> = Vec::new();

    match backend.as_str() {
        "redis" => {
            let redis_url = env_or("STEWARD_REDIS_URL", "redis://127.0.0.1:6379");
            let identity = env_or("STEWARD_IDENTITY", &base_config.identity);
            let lock: Arc<dyn ResourceLock> =
                Arc::new(RedisLock::new(&redis_url, &namespace, &lock_name).await?);

            info!(identity = %identity, redis_url = %redis_url, "joining Redis-backed election");
            electors.push(spawn_candidate(base_config.with_identity(identity), lock).await?);
        }
        _ => {
            let candidates: usize = env_or_parse("STEWARD_CANDIDATES", 3);
            let lock = Arc::new(MemoryLock::new(base_config.lock_key()));

            info!(candidates, "running embedded in-memory election");
            for i in 0..candidates {
                let config = base_config.clone().with_identity(format!("dev-{i}"));
                electors.push(spawn_candidate(config, lock.clone()).await?);
            }
        }
    }

    signal::ctrl_c().await?;
    info!("shutting down");

    for elector in &electors {
        elector.shutdown();
    }
    // let the loops fire their stopped_leading notifications before exit
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

async fn spawn_candidate(
    config: ElectionConfig,
    lock: Arc<dyn ResourceLock>,
) -> Result<Arc<LeaderElector>> {
    let identity = config.identity.clone();
    let elector = Arc::new(LeaderElector::new(config, lock)?);
    elector.register(Arc::new(LogListener { identity }));
    elector.clone().start().await?;
    Ok(elector)
}
