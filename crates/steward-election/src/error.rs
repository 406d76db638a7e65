//! Error types for the election crate.

use thiserror::Error;

/// Errors surfaced by a [`crate::lock::ResourceLock`] backend.
///
/// `AlreadyExists` and `Conflict` are expected races between candidates,
/// not failures; the engine re-reads and re-evaluates on its next tick.
#[derive(Error, Debug)]
pub enum LockError {
    /// A record already exists where an atomic create was attempted.
    #[error("lock record already exists")]
    AlreadyExists,

    /// The supplied version token no longer matches the stored record.
    #[error("lock record version conflict")]
    Conflict,

    #[error("lock record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any backend failure: network, auth, server-side unavailability.
    #[error("lock backend error: {0}")]
    Backend(String),
}

impl LockError {
    /// Whether this error is an expected optimistic-concurrency race.
    pub fn is_race(&self) -> bool {
        matches!(self, LockError::AlreadyExists | LockError::Conflict)
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for LockError {
    fn from(e: redis::RedisError) -> Self {
        LockError::Backend(e.to_string())
    }
}

/// Errors surfaced by the election engine itself.
#[derive(Error, Debug)]
pub enum ElectionError {
    /// Invalid timing relationships or identity; fatal at construction.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("election already running")]
    AlreadyRunning,

    #[error(transparent)]
    Lock(#[from] LockError),
}

pub type Result<T> = std::result::Result<T, ElectionError>;
