//! The lease record shared by all candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The serialized value stored at the well-known lock key.
///
/// The record is created once by the first candidate, then mutated by the
/// current holder on renewal or by any candidate claiming a stale record.
/// It is never deleted; ownership simply transfers. Field names serialize
/// in camelCase so records are readable by non-Rust tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// Candidate holding the lease; empty when unheld.
    pub holder_identity: String,
    /// Lease validity window, as agreed by all candidates. Candidates with
    /// mismatched configuration degrade the cluster to the shortest
    /// duration in effect.
    pub lease_duration_seconds: u64,
    /// When the current holder first acquired the lease.
    pub acquire_time: DateTime<Utc>,
    /// When the current holder last successfully renewed.
    pub renew_time: DateTime<Utc>,
    /// Incremented whenever the holder changes to a different candidate.
    /// Observability only, never used for correctness.
    pub leader_transitions: u64,
}

impl LockRecord {
    /// A fresh record for a first-time acquisition of an absent lock.
    pub fn new(identity: &str, lease_duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            holder_identity: identity.to_string(),
            lease_duration_seconds: lease_duration.as_secs(),
            acquire_time: now,
            renew_time: now,
            leader_transitions: 0,
        }
    }

    /// Whether the lease has expired from the point of view of a candidate
    /// configured with `lease_duration`.
    ///
    /// A `renew_time` ahead of our clock counts as live: the holder's clock
    /// is skewed forward and we must not shorten its lease for it.
    pub fn is_expired(&self, now: DateTime<Utc>, lease_duration: Duration) -> bool {
        match now.signed_duration_since(self.renew_time).to_std() {
            Ok(elapsed) => elapsed >= lease_duration,
            Err(_) => false,
        }
    }

    /// The record as written by `identity` when it claims the lease.
    ///
    /// Re-claiming a record we already hold keeps `acquire_time` and the
    /// transition counter; taking it over from another holder resets
    /// `acquire_time` and counts a transition.
    pub fn claimed_by(&self, identity: &str, now: DateTime<Utc>) -> Self {
        if self.holder_identity == identity {
            Self {
                renew_time: now,
                ..self.clone()
            }
        } else {
            Self {
                holder_identity: identity.to_string(),
                acquire_time: now,
                renew_time: now,
                leader_transitions: self.leader_transitions + 1,
                ..self.clone()
            }
        }
    }

    /// The record as written by the holder on a routine renewal: only
    /// `renew_time` moves.
    pub fn renewed(&self, now: DateTime<Utc>) -> Self {
        Self {
            renew_time: now,
            ..self.clone()
        }
    }
}
