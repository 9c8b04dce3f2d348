//! Scale decisions: assigned-job count in, desired replica count out.
//!
//! # Scaling Algorithm
//!
//! ```text
//! desired = clamp(assigned_jobs, min_runners, max_runners)
//!
//! if desired == current_replicas:
//!     no-op
//! else:
//!     WorkloadScaler.set_replicas(desired)
//!     current_replicas = desired      // only after success
//! ```
//!
//! The replica count starts unknown, so the first decision always reaches the
//! scaler. After that, repeating a count is free.

use std::sync::Arc;

use scaleset::{ListenerError, MetricsSink, WorkloadScaler, WorkloadTarget};
use tracing::{debug, info};

/// Clamps `assigned` into `[min, max]`. Requires `min <= max`.
pub fn clamp(assigned: u32, min: u32, max: u32) -> u32 {
    assigned.min(max).max(min)
}

/// Outcome of one scale decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// The scaler was asked to move to this replica count.
    ScaledTo(u32),
    /// The desired count already matched the last applied count.
    NoChange(u32),
}

impl ScaleDecision {
    /// The desired replica count, whether or not it was applied.
    pub fn desired(self) -> u32 {
        match self {
            Self::ScaledTo(count) | Self::NoChange(count) => count,
        }
    }
}

/// Turns assigned-job counts into idempotent replica updates.
///
/// Holds the only copy of the last applied replica count; nothing else
/// mutates it.
pub struct ScaleDecisionEngine {
    scaler: Arc<dyn WorkloadScaler>,
    metrics: Arc<dyn MetricsSink>,
    target: WorkloadTarget,
    min_runners: u32,
    max_runners: u32,
    /// Last replica count the scaler accepted; `None` until the first success.
    current_replicas: Option<u32>,
}

impl std::fmt::Debug for ScaleDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaleDecisionEngine")
            .field("target", &self.target)
            .field("min_runners", &self.min_runners)
            .field("max_runners", &self.max_runners)
            .field("current_replicas", &self.current_replicas)
            .finish_non_exhaustive()
    }
}

impl ScaleDecisionEngine {
    /// Creates an engine. Fails if `min_runners > max_runners`.
    pub fn new(
        scaler: Arc<dyn WorkloadScaler>,
        metrics: Arc<dyn MetricsSink>,
        target: WorkloadTarget,
        min_runners: u32,
        max_runners: u32,
    ) -> Result<Self, ListenerError> {
        if min_runners > max_runners {
            return Err(ListenerError::configuration(format!(
                "min runners ({min_runners}) must not exceed max runners ({max_runners})"
            )));
        }
        Ok(Self {
            scaler,
            metrics,
            target,
            min_runners,
            max_runners,
            current_replicas: None,
        })
    }

    /// Last replica count the scaler accepted, if any.
    pub fn current_replicas(&self) -> Option<u32> {
        self.current_replicas
    }

    /// Applies one decision for `assigned_jobs`.
    ///
    /// A scaler failure propagates and leaves the recorded count unchanged,
    /// so the next decision retries it.
    pub async fn apply(&mut self, assigned_jobs: u32) -> Result<ScaleDecision, ListenerError> {
        let desired = clamp(assigned_jobs, self.min_runners, self.max_runners);

        if self.current_replicas == Some(desired) {
            debug!(
                target_resource = %self.target,
                assigned_jobs,
                desired,
                "desired replicas unchanged"
            );
            return Ok(ScaleDecision::NoChange(desired));
        }

        self.scaler
            .set_replicas(&self.target, desired)
            .await
            .map_err(|source| ListenerError::Scale {
                target: self.target.clone(),
                desired,
                source,
            })?;

        info!(
            target_resource = %self.target,
            assigned_jobs,
            from = ?self.current_replicas,
            to = desired,
            "scaled runner replicas"
        );
        self.current_replicas = Some(desired);
        self.metrics.publish_desired_runners(desired);
        Ok(ScaleDecision::ScaledTo(desired))
    }

    /// Pre-warms capacity at startup.
    ///
    /// Runs one decision with zero assigned jobs when `min_runners > 0`;
    /// otherwise does nothing and returns `None`.
    pub async fn prewarm(&mut self) -> Result<Option<ScaleDecision>, ListenerError> {
        if self.min_runners == 0 {
            return Ok(None);
        }
        self.apply(0).await.map(Some)
    }
}
