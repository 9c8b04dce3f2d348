//! Scale-set listener runtime.
//!
//! Leases a message session on a runner scale set, drains batched job-lifecycle
//! messages at least once, and turns the assigned-job count into a desired
//! replica count for the orchestrator.
//!
//! ## Components
//!
//! | Module | Component | Role |
//! |--------|-----------|------|
//! | [`session`] | [`SessionManager`] | create (conflict retry), refresh, best-effort close |
//! | [`client`] | [`MessageClient`] | get/delete/acquire with one token refresh per call |
//! | [`decode`] | [`decode_batch`] | batch body → ordered [`scaleset::JobLifecycleEvent`]s |
//! | [`message_loop`] | [`MessageLoop`] | poll → decode → dispatch → acquire → ack → scale |
//! | [`scaler`] | [`ScaleDecisionEngine`] | clamp to `[min, max]`, skip no-op updates |
//! | [`telemetry`] | [`init_tracing`] | tracing subscriber and OTLP export |
//!
//! ## Architectural Layer
//!
//! **Orchestration.** The job-queue transport and the orchestrator patcher
//! are supplied by callers through the [`scaleset`] port traits; this crate
//! sequences calls between them and owns no wire formats of its own.
//!
//! ## Cancellation
//!
//! Every blocking call observes a [`tokio_util::sync::CancellationToken`].
//! Cancellation surfaces as [`scaleset::ListenerError::Cancelled`], which
//! callers can tell apart with [`scaleset::ListenerError::is_cancelled`].

mod cancel;
pub mod client;
pub mod decode;
pub mod message_loop;
pub mod scaler;
pub mod session;
pub mod telemetry;

pub use client::MessageClient;
pub use decode::decode_batch;
pub use message_loop::MessageLoop;
pub use scaler::{clamp, ScaleDecision, ScaleDecisionEngine};
pub use session::SessionManager;
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryGuard, TracingMetricsSink};
