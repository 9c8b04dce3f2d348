//! Session-scoped access to the message queue.
//!
//! [`MessageClient`] owns the live [`Session`]. Every session-scoped call runs
//! through one algorithm:
//!
//! 1. Attempt the call with the current queue credentials.
//! 2. On an expired token, refresh the session once and swap it in.
//! 3. Retry the original call once with the new credentials.
//!
//! Any further failure, including a failed refresh, is returned with the
//! operation attached. A call never retries more than once, so a session whose
//! token keeps being rejected cannot cause a refresh storm.

use std::future::Future;
use std::sync::Arc;

use scaleset::{
    AcquirableJob, ListenerError, Message, MessageId, QueueCredentials, QueueOperation,
    QueueServiceError, RemoteQueueService, RunnerRequestId, Session,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancel;
use crate::session::SessionManager;

/// Message-queue client bound to one live session.
#[derive(Debug)]
pub struct MessageClient {
    sessions: SessionManager,
    session: Session,
}

impl MessageClient {
    /// Wraps an already-created session.
    pub fn new(sessions: SessionManager, session: Session) -> Self {
        Self { sessions, session }
    }

    /// Creates a session (retrying conflicts) and wraps it.
    pub async fn connect(
        sessions: SessionManager,
        cancel: &CancellationToken,
    ) -> Result<Self, ListenerError> {
        let session = sessions.create_session(cancel).await?;
        Ok(Self::new(sessions, session))
    }

    /// The live session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Long-polls for the next message after `last_message_id`.
    ///
    /// `capacity` tells the service how many jobs this listener can take on.
    /// A capacity outside `0..=u32::MAX` is a caller bug and fails without
    /// any remote call.
    pub async fn get_message(
        &mut self,
        last_message_id: MessageId,
        capacity: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Message>, ListenerError> {
        let max_capacity =
            u32::try_from(capacity).map_err(|_| ListenerError::InvalidCapacity { capacity })?;

        self.call_with_refresh(
            QueueOperation::GetMessage,
            cancel,
            |service, credentials| async move {
                service
                    .get_message(
                        &credentials.message_queue_url,
                        &credentials.message_queue_access_token,
                        last_message_id,
                        max_capacity,
                    )
                    .await
            },
        )
        .await
    }

    /// Deletes a processed message, advancing the server-side cursor.
    pub async fn delete_message(
        &mut self,
        message_id: MessageId,
        cancel: &CancellationToken,
    ) -> Result<(), ListenerError> {
        self.call_with_refresh(
            QueueOperation::DeleteMessage,
            cancel,
            |service, credentials| async move {
                service
                    .delete_message(
                        &credentials.message_queue_url,
                        &credentials.message_queue_access_token,
                        message_id,
                    )
                    .await
            },
        )
        .await
    }

    /// Claims the given runner requests, returning the ids actually acquired.
    pub async fn acquire_jobs(
        &mut self,
        request_ids: &[RunnerRequestId],
        cancel: &CancellationToken,
    ) -> Result<Vec<RunnerRequestId>, ListenerError> {
        let scale_set_id = self.session.scale_set_id;
        self.call_with_refresh(
            QueueOperation::AcquireJobs,
            cancel,
            |service, credentials| async move {
                service
                    .acquire_jobs(
                        scale_set_id,
                        &credentials.message_queue_access_token,
                        request_ids,
                    )
                    .await
            },
        )
        .await
    }

    /// Lists the jobs currently visible but unclaimed on the scale set.
    ///
    /// Not session-scoped, so an expired token never applies here.
    pub async fn get_acquirable_jobs(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<AcquirableJob>, ListenerError> {
        cancel::cancellable(
            cancel,
            self.sessions
                .service()
                .get_acquirable_jobs(self.sessions.scale_set_id()),
        )
        .await?
        .map_err(|source| ListenerError::Queue {
            operation: QueueOperation::GetAcquirableJobs,
            source,
        })
    }

    /// Releases the session. Best-effort; see [`SessionManager::close_session`].
    pub async fn close(self) -> Result<(), ListenerError> {
        self.sessions.close_session(Some(&self.session)).await
    }

    async fn call_with_refresh<T, F, Fut>(
        &mut self,
        operation: QueueOperation,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, ListenerError>
    where
        F: Fn(Arc<dyn RemoteQueueService>, QueueCredentials) -> Fut,
        Fut: Future<Output = Result<T, QueueServiceError>>,
    {
        let first = cancel::cancellable(
            cancel,
            call(self.sessions.service().clone(), self.session.credentials()),
        )
        .await?;

        let source = match first {
            Ok(value) => return Ok(value),
            Err(source) if source.is_token_expired() => source,
            Err(source) => return Err(ListenerError::Queue { operation, source }),
        };

        info!(
            %operation,
            session_id = %self.session.id,
            error = %source,
            "message queue token expired, refreshing session"
        );
        self.session = self
            .sessions
            .refresh_for(&self.session, operation, cancel)
            .await?;

        let retried = cancel::cancellable(
            cancel,
            call(self.sessions.service().clone(), self.session.credentials()),
        )
        .await?;
        debug!(%operation, succeeded = retried.is_ok(), "retried after session refresh");
        retried.map_err(|source| ListenerError::Queue { operation, source })
    }
}
