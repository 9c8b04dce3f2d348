//! Port traits implemented outside this crate.
//!
//! The listener talks to three collaborators it does not own:
//!
//! - [`RemoteQueueService`]: the job-queue service's session and message API.
//! - [`WorkloadScaler`]: the orchestrator resource holding the runner replicas.
//! - [`JobEventHandler`]: bookkeeping hooks invoked for every decoded event.
//!
//! [`MetricsSink`] receives immutable statistics snapshots; [`NoopMetricsSink`]
//! is the default for callers (and tests) that do not collect metrics.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    AccessToken, AcquirableJob, JobLifecycleEvent, JobStarted, Message, MessageId,
    QueueCredentials, QueueServiceError, RunnerRequestId, ScaleSetId, Session, SessionId,
    Statistics, WorkloadTarget,
};

/// The remote job-queue service's session and message API.
///
/// Implementations own the wire protocol, authentication and any bounded
/// transport-level retry. They must report a conflict and an expired token
/// through the matching [`QueueServiceError`] variants.
#[async_trait]
pub trait RemoteQueueService: Send + Sync {
    /// Leases a new message session on the scale set.
    async fn create_session(
        &self,
        scale_set_id: ScaleSetId,
        owner_name: &str,
    ) -> Result<Session, QueueServiceError>;

    /// Issues fresh queue credentials for an existing session.
    async fn refresh_session(
        &self,
        scale_set_id: ScaleSetId,
        session_id: SessionId,
    ) -> Result<QueueCredentials, QueueServiceError>;

    /// Releases a session.
    async fn delete_session(
        &self,
        scale_set_id: ScaleSetId,
        session_id: SessionId,
    ) -> Result<(), QueueServiceError>;

    /// Long-polls the queue for the next message after `last_message_id`.
    ///
    /// Returns `Ok(None)` when the poll window elapsed without a message.
    async fn get_message(
        &self,
        queue_url: &str,
        token: &AccessToken,
        last_message_id: MessageId,
        max_capacity: u32,
    ) -> Result<Option<Message>, QueueServiceError>;

    /// Deletes a processed message, advancing the server-side cursor.
    async fn delete_message(
        &self,
        queue_url: &str,
        token: &AccessToken,
        message_id: MessageId,
    ) -> Result<(), QueueServiceError>;

    /// Claims the given runner requests for this scale set, returning the ids
    /// actually acquired.
    async fn acquire_jobs(
        &self,
        scale_set_id: ScaleSetId,
        token: &AccessToken,
        request_ids: &[RunnerRequestId],
    ) -> Result<Vec<RunnerRequestId>, QueueServiceError>;

    /// Lists the jobs currently visible but unclaimed on the scale set.
    async fn get_acquirable_jobs(
        &self,
        scale_set_id: ScaleSetId,
    ) -> Result<Vec<AcquirableJob>, QueueServiceError>;
}

/// The orchestrator-side resource that runs the runner replicas.
#[async_trait]
pub trait WorkloadScaler: Send + Sync {
    /// Sets the desired replica count on `target`.
    async fn set_replicas(&self, target: &WorkloadTarget, count: u32) -> anyhow::Result<()>;

    /// Records job metadata on the runner that started `job`.
    ///
    /// Used for telemetry only. The listener logs a failure and carries on.
    async fn record_job_started(
        &self,
        _target: &WorkloadTarget,
        _job: &JobStarted,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Bookkeeping callback invoked for every decoded job-lifecycle event.
///
/// An error aborts the current message cycle; the message is not acknowledged
/// and will be redelivered.
///
/// `cancel` is the listener's shutdown token. The listener also stops waiting
/// on the handler once it fires, so long-running handlers should observe it to
/// release their own resources.
#[async_trait]
pub trait JobEventHandler: Send + Sync {
    async fn handle_event(
        &self,
        event: &JobLifecycleEvent,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}

/// A [`JobEventHandler`] that accepts every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJobEventHandler;

#[async_trait]
impl JobEventHandler for NoopJobEventHandler {
    async fn handle_event(
        &self,
        _event: &JobLifecycleEvent,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Receives metric observations from the listener.
///
/// Every argument is an owned snapshot or a shared borrow that cannot outlive
/// the call; implementations never see live listener state.
pub trait MetricsSink: Send + Sync {
    /// Statistics carried by a processed message.
    fn publish_statistics(&self, _statistics: Statistics) {}

    /// A decoded job-lifecycle event.
    fn publish_job_event(&self, _event: &JobLifecycleEvent) {}

    /// A desired replica count that was applied.
    fn publish_desired_runners(&self, _count: u32) {}
}

/// A [`MetricsSink`] that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}
