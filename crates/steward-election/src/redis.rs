//! Redis-backed resource lock.
//!
//! Stores the record as a hash of `{record: <json>, version: <counter>}`
//! and drives every write through a Lua script so create and
//! compare-and-swap update are atomic on the server. No TTL is set on the
//! key: lease validity is judged from the timestamps inside the record,
//! and the record itself is never deleted.

use redis::aio::ConnectionManager;

use crate::error::LockError;
use crate::lock::ResourceLock;
use crate::record::LockRecord;

const CREATE_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 1 then
        return 0
    end
    redis.call("HSET", KEYS[1], "record", ARGV[1], "version", 1)
    return 1
"#;

const UPDATE_SCRIPT: &str = r#"
    local v = redis.call("HGET", KEYS[1], "version")
    if not v or v ~= ARGV[2] then
        return 0
    end
    redis.call("HSET", KEYS[1], "record", ARGV[1], "version", tonumber(v) + 1)
    return 1
"#;

pub struct RedisLock {
    key: String,
    conn: ConnectionManager,
}

impl RedisLock {
    /// Connect to Redis and bind to the record at `{namespace}:{lock_name}`.
    pub async fn new(
        redis_url: &str,
        namespace: &str,
        lock_name: &str,
    ) -> Result<Self, LockError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| LockError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            key: format!("{namespace}:{lock_name}"),
            conn,
        })
    }
}

#[async_trait::async_trait]
impl ResourceLock for RedisLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn get(&self) -> Result<Option<(LockRecord, String)>, LockError> {
        let mut conn = self.conn.clone();
        let (record, version): (Option<String>, Option<String>) = redis::cmd("HMGET")
            .arg(&self.key)
            .arg("record")
            .arg("version")
            .query_async(&mut conn)
            .await?;

        match (record, version) {
            (Some(record), Some(version)) => {
                let record: LockRecord = serde_json::from_str(&record)?;
                Ok(Some((record, version)))
            }
            _ => Ok(None),
        }
    }

    async fn create(&self, record: &LockRecord) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record)?;
        let created: i32 = redis::Script::new(CREATE_SCRIPT)
            .key(&self.key)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        if created == 1 {
            Ok(())
        } else {
            Err(LockError::AlreadyExists)
        }
    }

    async fn update(&self, record: &LockRecord, expected_version: &str) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record)?;
        let updated: i32 = redis::Script::new(UPDATE_SCRIPT)
            .key(&self.key)
            .arg(payload)
            .arg(expected_version)
            .invoke_async(&mut conn)
            .await?;

        if updated == 1 {
            Ok(())
        } else {
            Err(LockError::Conflict)
        }
    }
}
