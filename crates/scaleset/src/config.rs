//! Validated listener configuration.
//!
//! A [`ListenerConfig`] is built once (directly or via [`ListenerConfig::from_json`])
//! and handed to the message loop at construction. [`ListenerConfig::validate`]
//! runs before any session is created, so a loop never starts with a config it
//! cannot honour.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ListenerError, ScaleSetId, WorkloadTarget};

/// Default number of retries after a session-create conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 10;

/// Default delay between session-create attempts after a conflict.
pub const DEFAULT_CONFLICT_BACKOFF: Duration = Duration::from_secs(30);

/// Default upper bound on the best-effort session delete at shutdown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Session settings
// ---------------------------------------------------------------------------

/// Retry and timeout settings for the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Retries after the first create attempt hits a conflict. Total attempts
    /// are `conflict_retries + 1`.
    pub conflict_retries: u32,
    /// Fixed delay between create attempts.
    #[serde(rename = "conflictBackoffSecs", with = "duration_secs")]
    pub conflict_backoff: Duration,
    /// Upper bound on the session delete performed when the loop ends.
    #[serde(rename = "closeTimeoutSecs", with = "duration_secs")]
    pub close_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            conflict_backoff: DEFAULT_CONFLICT_BACKOFF,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Listener configuration
// ---------------------------------------------------------------------------

/// Everything one scale-set listener needs to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Scale set to lease a session on.
    pub scale_set_id: ScaleSetId,
    /// Owner name registered with the session.
    #[serde(default = "default_owner_name")]
    pub owner_name: String,
    /// Lower bound of the desired replica count.
    #[serde(default)]
    pub min_runners: u32,
    /// Upper bound of the desired replica count; also sent as message capacity.
    pub max_runners: u32,
    /// Orchestration resource whose replicas are driven.
    pub target: WorkloadTarget,
    /// Session retry and timeout settings.
    #[serde(default)]
    pub session: SessionSettings,
}

impl ListenerConfig {
    /// Creates a config with default session settings and the host's owner name.
    pub fn new(
        scale_set_id: ScaleSetId,
        min_runners: u32,
        max_runners: u32,
        target: WorkloadTarget,
    ) -> Self {
        Self {
            scale_set_id,
            owner_name: default_owner_name(),
            min_runners,
            max_runners,
            target,
            session: SessionSettings::default(),
        }
    }

    /// Deserialises a config from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self, ListenerError> {
        let config: ListenerConfig = serde_json::from_str(json)
            .map_err(|e| ListenerError::configuration(format!("invalid listener config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field rule, returning the first violation.
    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.owner_name.trim().is_empty() {
            return Err(ListenerError::configuration("owner name must not be empty"));
        }
        if self.min_runners > self.max_runners {
            return Err(ListenerError::configuration(format!(
                "min runners ({}) must not exceed max runners ({})",
                self.min_runners, self.max_runners
            )));
        }
        if i32::try_from(self.max_runners).is_err() {
            return Err(ListenerError::configuration(format!(
                "max runners ({}) must fit in a signed 32-bit capacity",
                self.max_runners
            )));
        }
        if self.target.namespace.trim().is_empty() {
            return Err(ListenerError::configuration("target namespace must not be empty"));
        }
        if self.target.resource_name.trim().is_empty() {
            return Err(ListenerError::configuration(
                "target resource name must not be empty",
            ));
        }
        Ok(())
    }

    /// Message capacity advertised on every poll.
    pub fn message_capacity(&self) -> i64 {
        i64::from(self.max_runners)
    }
}

/// Returns `$HOSTNAME`, or a random UUID when it is unset or blank.
pub fn default_owner_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
