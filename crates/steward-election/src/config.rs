//! Election engine configuration.

use std::time::Duration;

use steward_common::{default_identity, ElectionSettings};

use crate::error::{ElectionError, Result};

/// Timing and identity configuration for one election engine.
///
/// Immutable once the engine starts. The timing relationship
/// `retry_period < renew_deadline < lease_duration` is what keeps the
/// protocol live: a failing leader must concede before its lease expires,
/// and it must fit at least one renewal attempt inside its deadline.
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    /// This candidate's identity, unique across the cluster.
    pub identity: String,
    /// Scope qualifier for the lock record's location.
    pub namespace: String,
    /// Name of the lock record within the namespace.
    pub lock_name: String,
    /// Label for diagnostics and events only.
    pub component_name: String,
    /// How long a lease stays valid after its last renewal, as agreed by
    /// all candidates.
    pub lease_duration: Duration,
    /// How long a failing leader keeps retrying renewal before it concedes.
    pub renew_deadline: Duration,
    /// Interval between acquisition attempts while not leading.
    pub retry_period: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            namespace: "default".to_string(),
            lock_name: "leader-election".to_string(),
            component_name: "leader-elector".to_string(),
            lease_duration: Duration::from_secs(10),
            renew_deadline: Duration::from_secs(5),
            retry_period: Duration::from_secs(2),
        }
    }
}

impl ElectionConfig {
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_lock_name(mut self, lock_name: impl Into<String>) -> Self {
        self.lock_name = lock_name.into();
        self
    }

    pub fn with_timings(
        mut self,
        lease_duration: Duration,
        renew_deadline: Duration,
        retry_period: Duration,
    ) -> Self {
        self.lease_duration = lease_duration;
        self.renew_deadline = renew_deadline;
        self.retry_period = retry_period;
        self
    }

    /// Build a runtime config from deployment-facing settings. An empty
    /// identity falls back to the host-derived default.
    pub fn from_settings(settings: &ElectionSettings) -> Self {
        Self {
            identity: if settings.identity.is_empty() {
                default_identity()
            } else {
                settings.identity.clone()
            },
            namespace: settings.namespace.clone(),
            lock_name: settings.lock_name.clone(),
            component_name: settings.component_name.clone(),
            lease_duration: Duration::from_secs(settings.lease_duration_seconds),
            renew_deadline: Duration::from_secs(settings.renew_deadline_seconds),
            retry_period: Duration::from_secs(settings.retry_period_seconds),
        }
    }

    /// Fail fast on configurations that risk flapping or lock starvation.
    pub fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(ElectionError::Config("identity must not be empty".into()));
        }
        if self.retry_period.is_zero() {
            return Err(ElectionError::Config("retry period must be nonzero".into()));
        }
        if self.renew_deadline <= self.retry_period {
            return Err(ElectionError::Config(format!(
                "renew deadline ({:?}) must exceed retry period ({:?})",
                self.renew_deadline, self.retry_period
            )));
        }
        if self.lease_duration <= self.renew_deadline {
            return Err(ElectionError::Config(format!(
                "lease duration ({:?}) must exceed renew deadline ({:?})",
                self.lease_duration, self.renew_deadline
            )));
        }
        Ok(())
    }

    /// Where the lock record lives, e.g. `default:leader-election`.
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.namespace, self.lock_name)
    }
}
