//! Core domain for the scale-set listener.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, error type and port trait used by the listener runtime. Adapter
//! crates implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no I/O dependencies.
//! It defines *what* the listener needs from the job-queue service and the
//! orchestrator; adapters define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ScaleSetId`, `MessageId`, `SessionId`, etc.) |
//! | [`types`] | Sessions, messages, statistics and acquirable jobs |
//! | [`events`] | Job-lifecycle sub-messages and snapshot encoding |
//! | [`errors`] | Error taxonomy and failure classification |
//! | [`config`] | Validated listener configuration |
//! | [`ports`] | Collaborator traits (`RemoteQueueService`, `WorkloadScaler`, ...) |

pub mod config;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{default_owner_name, ListenerConfig, SessionSettings};
pub use errors::{ErrorClass, ListenerError, QueueOperation, QueueServiceError};
pub use events::{
    encode_acquirable_jobs, message_types, JobAssigned, JobAvailable, JobCompleted,
    JobLifecycleEvent, JobMessageBase, JobStarted,
};
pub use identifiers::{AccessToken, MessageId, RunnerId, RunnerRequestId, ScaleSetId, SessionId};
pub use ports::{
    JobEventHandler, MetricsSink, NoopJobEventHandler, NoopMetricsSink, RemoteQueueService,
    WorkloadScaler,
};
pub use types::{
    AcquirableJob, Message, QueueCredentials, Session, Statistics, WorkloadTarget,
    JOB_MESSAGES_TYPE,
};
