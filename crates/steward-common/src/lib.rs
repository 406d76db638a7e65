//! Shared wiring for Steward services.
//!
//! Holds the pieces every Steward binary needs regardless of which election
//! backend it runs against: structured-logging setup, the serde-facing
//! [`ElectionSettings`] used in deployment configuration, and the default
//! candidate identity derived from the local host.

use serde::{Deserialize, Serialize};

pub mod logging;

/// Deployment-facing election settings.
///
/// This is the shape that lands in config files and environment wiring.
/// `steward-election` converts it into its runtime `ElectionConfig`, which
/// validates the timing relationships before an engine can start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSettings {
    /// Whether this instance takes part in leader election at all.
    pub enabled: bool,
    /// Redis connection URL for the lock backend.
    pub redis_url: String,
    /// Scope qualifier for the lock record's location.
    pub namespace: String,
    /// Name of the lock record within the namespace.
    pub lock_name: String,
    /// Candidate identity; empty means "derive from the local host".
    pub identity: String,
    /// Label used in diagnostics only, never in the protocol.
    pub component_name: String,
    /// How long a lease stays valid after its last renewal.
    pub lease_duration_seconds: u64,
    /// How long a failing leader keeps retrying renewal before it concedes.
    pub renew_deadline_seconds: u64,
    /// Interval between acquisition attempts while not leading.
    pub retry_period_seconds: u64,
}

impl Default for ElectionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            namespace: "default".to_string(),
            lock_name: "leader-election".to_string(),
            identity: String::new(),
            component_name: "leader-elector".to_string(),
            lease_duration_seconds: 10,
            renew_deadline_seconds: 5,
            retry_period_seconds: 2,
        }
    }
}

/// Derive a default candidate identity from the local host.
///
/// Falls back to a random UUID when no hostname is available, so two
/// candidates started on an unnamed host never collide on identity.
pub fn default_identity() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}
