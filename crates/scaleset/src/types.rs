//! Shared value types for the scale-set listener domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the state exchanged with the job-queue service: sessions, queue messages and
//! the statistics snapshots embedded in both.
//!
//! All types use the service's camelCase wire names so a transport adapter can
//! deserialise responses straight into them.

use serde::{Deserialize, Serialize};

use crate::{AccessToken, MessageId, RunnerRequestId, ScaleSetId, SessionId};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Read-only job and runner counts reported by the service.
///
/// Embedded in both [`Session`] and [`Message`]. The type is `Copy`, so every
/// consumer (notably a metrics sink) receives its own snapshot rather than a
/// reference into listener state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    /// Jobs visible to the scale set that no listener has acquired yet.
    pub total_available_jobs: u32,
    /// Jobs acquired by a listener but not yet assigned to a runner.
    pub total_acquired_jobs: u32,
    /// Jobs assigned to this scale set and waiting for, or bound to, a runner.
    pub total_assigned_jobs: u32,
    /// Jobs currently executing on a runner.
    pub total_running_jobs: u32,
    /// Runners registered with the scale set.
    pub total_registered_runners: u32,
    /// Registered runners currently executing a job.
    pub total_busy_runners: u32,
    /// Registered runners with no job.
    pub total_idle_runners: u32,
}

impl Statistics {
    /// Returns `true` if jobs were already queued when this snapshot was taken.
    ///
    /// Used at startup to decide whether the acquirable-jobs snapshot must be
    /// fetched before the first poll.
    pub fn has_pending_jobs(&self) -> bool {
        self.total_available_jobs > 0 || self.total_assigned_jobs > 0
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A leased handle on a scale set's message queue.
///
/// Created by the session manager. On refresh the queue URL and access token
/// are replaced wholesale; every other field is carried over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Service-generated session id.
    #[serde(rename = "sessionId")]
    pub id: SessionId,
    /// Name the session was registered under (normally the host name).
    pub owner_name: String,
    /// Scale set this session is leased on.
    pub scale_set_id: ScaleSetId,
    /// Base URL of the session's message queue.
    pub message_queue_url: String,
    /// Token authorising access to the message queue.
    pub message_queue_access_token: AccessToken,
    /// Statistics at session creation.
    #[serde(default)]
    pub statistics: Statistics,
}

impl Session {
    /// Returns the queue location and token as a standalone credential pair.
    pub fn credentials(&self) -> QueueCredentials {
        QueueCredentials {
            message_queue_url: self.message_queue_url.clone(),
            message_queue_access_token: self.message_queue_access_token.clone(),
        }
    }

    /// Returns a copy of this session with its queue credentials replaced.
    #[must_use]
    pub fn with_credentials(&self, credentials: QueueCredentials) -> Session {
        Session {
            message_queue_url: credentials.message_queue_url,
            message_queue_access_token: credentials.message_queue_access_token,
            ..self.clone()
        }
    }
}

/// The queue URL and access token pair returned by a session refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCredentials {
    /// Base URL of the session's message queue.
    pub message_queue_url: String,
    /// Token authorising access to the message queue.
    pub message_queue_access_token: AccessToken,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Message type tag carried by batched job-message envelopes.
pub const JOB_MESSAGES_TYPE: &str = "RunnerScaleSetJobMessages";

/// One message drained from a session's queue.
///
/// The body is an opaque JSON string holding an ordered list of job-lifecycle
/// sub-messages. Delivery is at-least-once: the message stays at the head of
/// the queue until it is deleted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Monotonic message id; [`MessageId::INITIAL`] marks the synthetic startup message.
    #[serde(rename = "messageId")]
    pub id: MessageId,
    /// Envelope type tag, normally [`JOB_MESSAGES_TYPE`].
    #[serde(rename = "messageType")]
    pub message_type: String,
    /// Batched sub-messages, JSON encoded. Empty means no sub-messages.
    #[serde(default)]
    pub body: String,
    /// Statistics at the time the message was produced.
    #[serde(default)]
    pub statistics: Statistics,
}

impl Message {
    /// Builds the synthetic initial message with the given body and statistics.
    pub fn initial(statistics: Statistics, body: String) -> Self {
        Self {
            id: MessageId::INITIAL,
            message_type: JOB_MESSAGES_TYPE.to_string(),
            body,
            statistics,
        }
    }
}

// ---------------------------------------------------------------------------
// Acquirable jobs
// ---------------------------------------------------------------------------

/// A job visible to the scale set but not yet claimed by any listener.
///
/// Returned by the acquirable-jobs snapshot at startup. Encoded into the body
/// of the initial message, each job decodes as a `JobAvailable` sub-message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquirableJob {
    /// Sub-message discriminator; blank means `JobAvailable`.
    #[serde(default)]
    pub message_type: String,
    /// Request id to pass to job acquisition.
    pub runner_request_id: RunnerRequestId,
    /// URL the job is acquired through.
    #[serde(default)]
    pub acquire_job_url: String,
    /// Repository the job belongs to.
    #[serde(default)]
    pub repository_name: String,
    /// Owner (organisation or user) of the repository.
    #[serde(default)]
    pub owner_name: String,
    /// Reference to the workflow file that defines the job.
    #[serde(default)]
    pub job_workflow_ref: String,
    /// Event that triggered the workflow run.
    #[serde(default)]
    pub event_name: String,
    /// Runner labels requested by the job.
    #[serde(default)]
    pub request_labels: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestration target
// ---------------------------------------------------------------------------

/// The orchestration resource whose replica count the listener drives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTarget {
    /// Namespace the resource lives in.
    pub namespace: String,
    /// Name of the runner-set resource.
    pub resource_name: String,
}

impl WorkloadTarget {
    /// Creates a target from its namespace and resource name.
    pub fn new(namespace: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl std::fmt::Display for WorkloadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.resource_name)
    }
}
