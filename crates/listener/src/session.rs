//! Scale-set session lifecycle: create with conflict retry, refresh, and
//! best-effort close.
//!
//! ```text
//! NoSession --create (retry on Conflict)--> Active
//! Active    --token expired--> Refreshing --success--> Active
//! Refreshing --failure--> Active (stale token, error surfaced)
//! ```
//!
//! The manager never holds a session itself. Each call takes the current
//! session by reference and hands a new one back by value, so exactly one
//! owner (the message client) holds the live session at any time.

use std::sync::Arc;

use scaleset::{
    ListenerError, QueueOperation, RemoteQueueService, ScaleSetId, Session, SessionSettings,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel;

/// Creates, refreshes and closes sessions on one scale set.
#[derive(Clone)]
pub struct SessionManager {
    service: Arc<dyn RemoteQueueService>,
    scale_set_id: ScaleSetId,
    owner_name: String,
    settings: SessionSettings,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("scale_set_id", &self.scale_set_id)
            .field("owner_name", &self.owner_name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        service: Arc<dyn RemoteQueueService>,
        scale_set_id: ScaleSetId,
        owner_name: impl Into<String>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            service,
            scale_set_id,
            owner_name: owner_name.into(),
            settings,
        }
    }

    /// The service this manager leases sessions from.
    pub fn service(&self) -> &Arc<dyn RemoteQueueService> {
        &self.service
    }

    /// The scale set this manager leases sessions on.
    pub fn scale_set_id(&self) -> ScaleSetId {
        self.scale_set_id
    }

    /// Leases a new session.
    ///
    /// A conflict (another listener still holds the scale set) is retried up
    /// to `conflict_retries` times with a fixed `conflict_backoff` in between.
    /// Any other failure aborts immediately. The backoff sleep observes
    /// `cancel`.
    pub async fn create_session(&self, cancel: &CancellationToken) -> Result<Session, ListenerError> {
        let max_attempts = self.settings.conflict_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = cancel::cancellable(
                cancel,
                self.service.create_session(self.scale_set_id, &self.owner_name),
            )
            .await?;

            match result {
                Ok(session) => {
                    info!(
                        scale_set_id = %self.scale_set_id,
                        session_id = %session.id,
                        owner = %session.owner_name,
                        attempt,
                        "message session created"
                    );
                    return Ok(session);
                }
                Err(source) if source.is_conflict() => {
                    if attempt >= max_attempts {
                        return Err(ListenerError::SessionRetriesExceeded {
                            attempts: attempt,
                            source,
                        });
                    }
                    info!(
                        scale_set_id = %self.scale_set_id,
                        attempt,
                        max_attempts,
                        backoff_secs = self.settings.conflict_backoff.as_secs_f64(),
                        error = %source,
                        "session conflict, another listener holds the scale set; retrying"
                    );
                    cancel::sleep(cancel, self.settings.conflict_backoff).await?;
                }
                Err(source) => return Err(ListenerError::CreateSession { source }),
            }
        }
    }

    /// Fetches fresh queue credentials for `session`.
    ///
    /// On success returns a new session with the queue URL and token
    /// replaced. On failure `session` is untouched and the error is returned;
    /// the caller decides whether to retry.
    pub async fn refresh_session(
        &self,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Result<Session, ListenerError> {
        self.refresh_for(session, QueueOperation::RefreshSession, cancel)
            .await
    }

    /// Refresh on behalf of `operation`, which is recorded in the error.
    pub(crate) async fn refresh_for(
        &self,
        session: &Session,
        operation: QueueOperation,
        cancel: &CancellationToken,
    ) -> Result<Session, ListenerError> {
        let credentials = cancel::cancellable(
            cancel,
            self.service.refresh_session(self.scale_set_id, session.id),
        )
        .await?
        .map_err(|source| ListenerError::RefreshSession {
            session_id: session.id,
            operation,
            source,
        })?;

        debug!(
            scale_set_id = %self.scale_set_id,
            session_id = %session.id,
            "message session refreshed"
        );
        Ok(session.with_credentials(credentials))
    }

    /// Deletes `session` if there is one.
    ///
    /// Best-effort: the delete is bounded by `close_timeout` rather than a
    /// cancellation token, because it normally runs after the loop's token
    /// has already fired. A failure is logged and returned for the caller to
    /// report; it never invalidates anything the caller has done.
    pub async fn close_session(&self, session: Option<&Session>) -> Result<(), ListenerError> {
        let Some(session) = session else {
            return Ok(());
        };

        let outcome = tokio::time::timeout(
            self.settings.close_timeout,
            self.service.delete_session(self.scale_set_id, session.id),
        )
        .await;

        let err = match outcome {
            Ok(Ok(())) => {
                info!(
                    scale_set_id = %self.scale_set_id,
                    session_id = %session.id,
                    "message session deleted"
                );
                return Ok(());
            }
            Ok(Err(source)) => ListenerError::CloseSession {
                session_id: session.id,
                source,
            },
            Err(_) => ListenerError::CloseSessionTimedOut {
                session_id: session.id,
            },
        };

        warn!(
            scale_set_id = %self.scale_set_id,
            session_id = %session.id,
            error = %err,
            "failed to delete message session"
        );
        Err(err)
    }
}
