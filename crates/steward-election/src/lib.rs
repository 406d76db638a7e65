//! Lease-based leader election over an atomic record store.
//!
//! A group of cooperating processes ("candidates") agrees on exactly one
//! active leader at a time by competing for a single time-bounded lease,
//! stored as a record in a backend that supports optimistic
//! compare-and-swap. No consensus service is involved: leadership is
//! advisory, with a bounded stale-leader window rather than a hard
//! mutual-exclusion guarantee.
//!
//! # Features
//!
//! - `redis` (default) - Redis-backed lock record with Lua-scripted CAS
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use steward_election::{ElectionConfig, LeaderElector, MemoryLock};
//!
//! # async fn example() -> steward_election::Result<()> {
//! let lock = Arc::new(MemoryLock::new("default:leader-election"));
//! let config = ElectionConfig::default().with_identity("node-1");
//! let elector = Arc::new(LeaderElector::new(config, lock)?);
//!
//! elector.clone().start().await?;
//!
//! if elector.is_leader() {
//!     println!("I am the leader");
//! }
//!
//! elector.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod elector;
pub mod error;
pub mod listener;
pub mod lock;
pub mod record;

#[cfg(feature = "redis")]
pub mod redis;

pub use config::ElectionConfig;
pub use elector::{LeaderElector, LeaderGuard, LeadershipStatus};
pub use error::{ElectionError, LockError, Result};
pub use listener::ElectionListener;
pub use lock::{MemoryLock, ResourceLock};
pub use record::LockRecord;

#[cfg(feature = "redis")]
pub use redis::RedisLock;
