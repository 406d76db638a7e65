//! The resource lock: optimistic-concurrency access to the shared record.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LockError;
use crate::record::LockRecord;

/// Contract every lock backend implements.
///
/// The backend mediates a single named record with compare-and-swap
/// semantics: a successful create or update must be immediately visible to
/// subsequent reads, and `Conflict`/`AlreadyExists` must be returned
/// precisely when a concurrent writer invalidated the caller's token.
/// Version tokens are opaque; only the backend interprets them.
#[async_trait]
pub trait ResourceLock: Send + Sync {
    /// Where the record lives, for diagnostics.
    fn key(&self) -> &str;

    /// Read the record and its current version token. `None` if no record
    /// has ever been created at this key.
    async fn get(&self) -> Result<Option<(LockRecord, String)>, LockError>;

    /// Atomically create the record. Fails with
    /// [`LockError::AlreadyExists`] if any record is present.
    async fn create(&self, record: &LockRecord) -> Result<(), LockError>;

    /// Atomically replace the record, provided `expected_version` still
    /// matches. Fails with [`LockError::Conflict`] otherwise.
    async fn update(&self, record: &LockRecord, expected_version: &str) -> Result<(), LockError>;
}

/// In-process lock backend.
///
/// Serves local development and tests the same way an embedded queue
/// replaces a hosted one: full CAS semantics, no external service. All
/// candidates sharing leadership through it must share the same instance.
pub struct MemoryLock {
    key: String,
    state: Mutex<Option<(LockRecord, u64)>>,
}

impl MemoryLock {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ResourceLock for MemoryLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn get(&self) -> Result<Option<(LockRecord, String)>, LockError> {
        let state = self.state.lock();
        Ok(state
            .as_ref()
            .map(|(record, version)| (record.clone(), version.to_string())))
    }

    async fn create(&self, record: &LockRecord) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(LockError::AlreadyExists);
        }
        *state = Some((record.clone(), 1));
        Ok(())
    }

    async fn update(&self, record: &LockRecord, expected_version: &str) -> Result<(), LockError> {
        let mut state = self.state.lock();
        match state.as_mut() {
            Some((stored, version)) if version.to_string() == expected_version => {
                *stored = record.clone();
                *version += 1;
                Ok(())
            }
            _ => Err(LockError::Conflict),
        }
    }
}
