//! The scale-set listener control loop.
//!
//! One [`MessageLoop`] drives one scale set on one task. Cycles are strictly
//! serialised, so statistics and scale decisions apply in message-arrival
//! order.
//!
//! ```text
//! create session ──► pre-warm (min > 0) ──► initial message (id 0)
//!                                                │
//!        ┌───────────────────────────────────────┘
//!        ▼
//!   get message ──nil──► (poll again)
//!        │
//!        ▼
//!   decode ─► collect Available ids ─► dispatch ─► acquire ─► delete ─► scale
//! ```
//!
//! Every failure except the two best-effort paths (session close, runner
//! metadata) ends the loop with a wrapped error, leaving the message on the
//! queue for redelivery after a restart.

use std::sync::Arc;

use scaleset::{
    encode_acquirable_jobs, JobEventHandler, JobLifecycleEvent, JobStarted, ListenerConfig,
    ListenerError, Message, MessageId, MetricsSink, RemoteQueueService, RunnerRequestId,
    Statistics, WorkloadScaler, WorkloadTarget,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cancel;
use crate::client::MessageClient;
use crate::decode::decode_batch;
use crate::scaler::ScaleDecisionEngine;
use crate::session::SessionManager;

/// The listener control loop for one scale set.
pub struct MessageLoop {
    config: ListenerConfig,
    sessions: SessionManager,
    engine: ScaleDecisionEngine,
    scaler: Arc<dyn WorkloadScaler>,
    handler: Arc<dyn JobEventHandler>,
    metrics: Arc<dyn MetricsSink>,
    /// Id of the last message whose processing reached acknowledgement.
    last_processed_id: MessageId,
}

impl std::fmt::Debug for MessageLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLoop")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("last_processed_id", &self.last_processed_id)
            .finish_non_exhaustive()
    }
}

impl MessageLoop {
    /// Validates `config` and assembles a loop around the given collaborators.
    pub fn new(
        config: ListenerConfig,
        service: Arc<dyn RemoteQueueService>,
        scaler: Arc<dyn WorkloadScaler>,
        handler: Arc<dyn JobEventHandler>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ListenerError> {
        config.validate()?;

        let sessions = SessionManager::new(
            service,
            config.scale_set_id,
            config.owner_name.clone(),
            config.session.clone(),
        );
        let engine = ScaleDecisionEngine::new(
            scaler.clone(),
            metrics.clone(),
            config.target.clone(),
            config.min_runners,
            config.max_runners,
        )?;

        Ok(Self {
            config,
            sessions,
            engine,
            scaler,
            handler,
            metrics,
            last_processed_id: MessageId::INITIAL,
        })
    }

    /// Runs until `cancel` fires or a cycle fails.
    ///
    /// Always returns an error: [`ListenerError::Cancelled`] for a requested
    /// shutdown, anything else for a fatal failure. The session is closed on
    /// the way out either way.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ListenerError> {
        let span = info_span!(
            "scale_set_listener",
            scale_set_id = %self.config.scale_set_id,
            workload = %self.config.target,
        );

        async move {
            let mut client = MessageClient::connect(self.sessions.clone(), &cancel).await?;
            let result = self.listen(&mut client, &cancel).await;

            // Best-effort: a close failure is logged inside and never masks `result`.
            let _ = client.close().await;

            match &result {
                Err(err) if err.is_cancelled() => info!("listener stopped"),
                Err(err) => warn!(error = %err, "listener stopped on error"),
                Ok(()) => {}
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn listen(
        &mut self,
        client: &mut MessageClient,
        cancel: &CancellationToken,
    ) -> Result<(), ListenerError> {
        if let Some(decision) = self.engine.prewarm().await? {
            debug!(desired = decision.desired(), "pre-warmed runner capacity");
        }

        let initial = self.initial_message(client, cancel).await?;
        self.process_message(client, initial, cancel).await?;

        let capacity = self.config.message_capacity();
        loop {
            let Some(message) = client
                .get_message(self.last_processed_id, capacity, cancel)
                .await?
            else {
                continue;
            };
            self.process_message(client, message, cancel).await?;
        }
    }

    /// Synthesises message 0 from the session statistics.
    ///
    /// When jobs were already queued at session creation, the body carries the
    /// acquirable-jobs snapshot, so jobs that arrived before the first poll are
    /// acquired too.
    async fn initial_message(
        &self,
        client: &MessageClient,
        cancel: &CancellationToken,
    ) -> Result<Message, ListenerError> {
        let statistics = client.session().statistics;
        if !statistics.has_pending_jobs() {
            return Ok(Message::initial(statistics, String::new()));
        }

        let jobs = client.get_acquirable_jobs(cancel).await?;
        info!(
            acquirable_jobs = jobs.len(),
            available = statistics.total_available_jobs,
            assigned = statistics.total_assigned_jobs,
            "jobs pending at session start"
        );
        let body = encode_acquirable_jobs(&jobs)
            .map_err(|source| ListenerError::EncodeSnapshot { source })?;
        Ok(Message::initial(statistics, body))
    }

    async fn process_message(
        &mut self,
        client: &mut MessageClient,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<(), ListenerError> {
        let statistics = message.statistics;
        log_statistics(message.id, &statistics);
        self.metrics.publish_statistics(statistics);

        let redelivered = !message.id.is_initial() && message.id <= self.last_processed_id;
        if redelivered {
            warn!(
                message_id = %message.id,
                last_processed_id = %self.last_processed_id,
                "message already processed, skipping dispatch and acquisition"
            );
        } else {
            let events = decode_batch(&message)?;
            let available = self.dispatch(&events, cancel).await?;
            if !available.is_empty() {
                self.acquire(client, &available, cancel).await?;
            }
        }

        if !message.id.is_initial() {
            self.last_processed_id = self.last_processed_id.max(message.id);
            client.delete_message(message.id, cancel).await?;
            debug!(message_id = %message.id, "message acknowledged");
        }

        self.engine.apply(statistics.total_assigned_jobs).await?;
        Ok(())
    }

    /// Hands every event to the handler and returns the request ids of the
    /// `JobAvailable` events, in batch order.
    async fn dispatch(
        &self,
        events: &[JobLifecycleEvent],
        cancel: &CancellationToken,
    ) -> Result<Vec<RunnerRequestId>, ListenerError> {
        let mut available = Vec::new();

        for event in events {
            let request_id = event.runner_request_id();
            match event {
                JobLifecycleEvent::Available(_) => available.push(request_id),
                JobLifecycleEvent::Started(started) => {
                    record_job_started(self.scaler.as_ref(), &self.config.target, started).await;
                }
                JobLifecycleEvent::Assigned(_) | JobLifecycleEvent::Completed(_) => {}
            }

            debug!(
                message_type = event.message_type(),
                %request_id,
                repository = %event.base().repository_name,
                "dispatching job event"
            );
            cancel::cancellable(cancel, self.handler.handle_event(event, cancel))
                .await?
                .map_err(|source| ListenerError::Handler { request_id, source })?;
            self.metrics.publish_job_event(event);
        }

        Ok(available)
    }

    async fn acquire(
        &self,
        client: &mut MessageClient,
        request_ids: &[RunnerRequestId],
        cancel: &CancellationToken,
    ) -> Result<(), ListenerError> {
        let acquired = client.acquire_jobs(request_ids, cancel).await?;
        if acquired.len() < request_ids.len() {
            info!(
                requested = request_ids.len(),
                acquired = acquired.len(),
                "some available jobs were not acquired"
            );
        } else {
            debug!(acquired = acquired.len(), "acquired available jobs");
        }
        Ok(())
    }
}

/// Best-effort runner annotation; a failure is logged and otherwise ignored.
async fn record_job_started(
    scaler: &dyn WorkloadScaler,
    target: &WorkloadTarget,
    job: &JobStarted,
) {
    if let Err(err) = scaler.record_job_started(target, job).await {
        warn!(
            request_id = %job.base.runner_request_id,
            runner = %job.runner_name,
            error = %err,
            "failed to record job metadata on runner"
        );
    }
}

fn log_statistics(message_id: MessageId, statistics: &Statistics) {
    info!(
        %message_id,
        available_jobs = statistics.total_available_jobs,
        acquired_jobs = statistics.total_acquired_jobs,
        assigned_jobs = statistics.total_assigned_jobs,
        running_jobs = statistics.total_running_jobs,
        registered_runners = statistics.total_registered_runners,
        busy_runners = statistics.total_busy_runners,
        idle_runners = statistics.total_idle_runners,
        "processing message"
    );
}
