//! Error types and failure classification for the scale-set listener.
//!
//! [`QueueServiceError`] is what a [`crate::RemoteQueueService`] implementation
//! reports. [`ListenerError`] is what every listener operation returns: it wraps
//! service, decode and collaborator failures with the operation that produced
//! them.
//!
//! [`ErrorClass`] is a cross-cutting concern: every [`ListenerError`] maps to
//! exactly one class, which decides whether the failure is retried locally,
//! aborts the loop, or signals a clean shutdown.

use thiserror::Error;

use crate::{MessageId, RunnerRequestId, SessionId, WorkloadTarget};

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// How a failure is handled by the layer that observes it.
///
/// ## Rules
///
/// - `TransientRetryable`: session-create conflicts and queue-token expiry.
///   Retried locally with a bounded attempt count, logged at info level. Only
///   a raw [`QueueServiceError`] carries this class: once one surfaces inside
///   a [`ListenerError`], the local retry is spent and the loop has stopped.
/// - `FatalProtocol`: malformed batches, invalid configuration or capacity.
///   Aborts the loop for a process-level restart.
/// - `FatalNetwork`: any other transport or HTTP failure, including
///   collaborator failures. Not retried at this layer.
/// - `Cancellation`: the governing cancellation token fired. Callers exit
///   cleanly rather than alarming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    TransientRetryable,
    FatalProtocol,
    FatalNetwork,
    Cancellation,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Names the remote operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueOperation {
    CreateSession,
    RefreshSession,
    DeleteSession,
    GetMessage,
    DeleteMessage,
    AcquireJobs,
    GetAcquirableJobs,
}

impl std::fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CreateSession => "create session",
            Self::RefreshSession => "refresh session",
            Self::DeleteSession => "delete session",
            Self::GetMessage => "get message",
            Self::DeleteMessage => "delete message",
            Self::AcquireJobs => "acquire jobs",
            Self::GetAcquirableJobs => "get acquirable jobs",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Remote queue service errors
// ---------------------------------------------------------------------------

/// Failure reported by a remote job-queue service call.
///
/// Transport adapters must map the service's responses onto these variants
/// faithfully: the listener's retry behaviour depends on `Conflict` and
/// `TokenExpired` being distinguishable from everything else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueServiceError {
    /// Another listener still holds a session on the scale set.
    ///
    /// Retryable on session creation only.
    #[error("session conflict: {message}")]
    Conflict { message: String },

    /// The session's queue access token has expired.
    ///
    /// Retryable once per call after a session refresh.
    #[error("message queue token expired: {message}")]
    TokenExpired { message: String },

    /// The service rejected the request (4xx other than conflict/expiry).
    #[error("client error (HTTP {status}): {message}")]
    ClientSide { status: u16, message: String },

    /// The request failed below the HTTP layer, or with a server error.
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl QueueServiceError {
    /// Returns `true` for a session conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` for an expired queue access token.
    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::TokenExpired { .. })
    }

    /// Classifies the failure as seen by the layer that may still retry it.
    pub fn class(&self) -> ErrorClass {
        if self.is_conflict() || self.is_token_expired() {
            ErrorClass::TransientRetryable
        } else {
            ErrorClass::FatalNetwork
        }
    }
}

// ---------------------------------------------------------------------------
// Listener errors
// ---------------------------------------------------------------------------

/// Errors returned by the session manager, message client, message loop and
/// scale decision engine.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The governing cancellation token fired while an operation was pending.
    #[error("operation cancelled")]
    Cancelled,

    /// Session creation kept hitting conflicts past the configured retry bound.
    #[error("unable to create message session after {attempts} attempts")]
    SessionRetriesExceeded {
        attempts: u32,
        #[source]
        source: QueueServiceError,
    },

    /// Session creation failed with a non-retryable error.
    #[error("failed to create message session")]
    CreateSession {
        #[source]
        source: QueueServiceError,
    },

    /// A session refresh failed. `operation` is the call that triggered the
    /// refresh (or [`QueueOperation::RefreshSession`] for a direct refresh).
    #[error("failed to refresh message session {session_id} during {operation}")]
    RefreshSession {
        session_id: SessionId,
        operation: QueueOperation,
        #[source]
        source: QueueServiceError,
    },

    /// Deleting the session failed. Reported but never fatal.
    #[error("failed to delete message session {session_id}")]
    CloseSession {
        session_id: SessionId,
        #[source]
        source: QueueServiceError,
    },

    /// Deleting the session did not finish within the close timeout.
    #[error("timed out deleting message session {session_id}")]
    CloseSessionTimedOut { session_id: SessionId },

    /// A session-scoped queue operation failed.
    #[error("{operation} failed")]
    Queue {
        operation: QueueOperation,
        #[source]
        source: QueueServiceError,
    },

    /// The requested message capacity is negative or does not fit the wire type.
    #[error("message capacity must be between 0 and 4294967295, got {capacity}")]
    InvalidCapacity { capacity: i64 },

    /// The outer batch of a message is not a JSON array of objects.
    #[error("message {message_id} has a malformed batch body")]
    MalformedBatch {
        message_id: MessageId,
        #[source]
        source: serde_json::Error,
    },

    /// A sub-message has no string `messageType` discriminator.
    #[error("sub-message {index} of message {message_id} has no messageType discriminator")]
    MissingDiscriminator { message_id: MessageId, index: usize },

    /// A sub-message of a recognised type failed to decode.
    #[error("failed to decode {message_type} sub-message {index} of message {message_id}")]
    MalformedEvent {
        message_id: MessageId,
        index: usize,
        message_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The acquirable-jobs snapshot could not be encoded into the initial message.
    #[error("failed to encode acquirable jobs snapshot")]
    EncodeSnapshot {
        #[source]
        source: serde_json::Error,
    },

    /// The external job event handler rejected an event.
    #[error("job event handler failed for runner request {request_id}")]
    Handler {
        request_id: RunnerRequestId,
        #[source]
        source: anyhow::Error,
    },

    /// The workload scaler failed to apply a replica count.
    #[error("failed to scale {target} to {desired} replicas")]
    Scale {
        target: WorkloadTarget,
        desired: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The listener configuration is invalid.
    ///
    /// Produced at construction time; a loop never starts with an invalid config.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl ListenerError {
    /// Classifies this error for abort and shutdown decisions.
    ///
    /// Never `TransientRetryable`: conflicts and token expiry only surface
    /// here after their local retry bound is exhausted.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Cancelled => ErrorClass::Cancellation,
            Self::InvalidCapacity { .. }
            | Self::MalformedBatch { .. }
            | Self::MissingDiscriminator { .. }
            | Self::MalformedEvent { .. }
            | Self::EncodeSnapshot { .. }
            | Self::Configuration { .. } => ErrorClass::FatalProtocol,
            _ => ErrorClass::FatalNetwork,
        }
    }

    /// Returns `true` if this error only signals cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Creates a [`ListenerError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
