//! Scripted in-memory collaborators for driving a `MessageLoop` end to end.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use listener::MessageLoop;
use scaleset::{
    AccessToken, AcquirableJob, JobEventHandler, JobLifecycleEvent, JobStarted, ListenerConfig,
    Message, MessageId, NoopMetricsSink, QueueCredentials, QueueServiceError, RemoteQueueService,
    RunnerRequestId, ScaleSetId, Session, SessionId, SessionSettings, Statistics, WorkloadScaler,
    WorkloadTarget, JOB_MESSAGES_TYPE,
};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Remote queue service
// ---------------------------------------------------------------------------

/// What the fake does on the next `get_message` call.
#[derive(Debug, Clone)]
pub enum Poll {
    Deliver(Message),
    Empty,
    Fail(QueueServiceError),
    /// Blocks until the caller drops the future (a long-poll that never ends).
    Hang,
}

/// Every call the fake observed.
#[derive(Debug, Default)]
pub struct Calls {
    pub create_session: u32,
    pub refresh_session: u32,
    pub delete_session: Vec<SessionId>,
    /// `(last_message_id, max_capacity, token)` per poll.
    pub get_message: Vec<(MessageId, u32, String)>,
    pub delete_message: Vec<MessageId>,
    pub acquire_jobs: Vec<Vec<RunnerRequestId>>,
    pub get_acquirable_jobs: u32,
}

#[derive(Debug, Default)]
pub struct QueueState {
    pub creates: VecDeque<Result<(), QueueServiceError>>,
    pub session_statistics: Statistics,
    pub polls: VecDeque<Poll>,
    pub refreshes: VecDeque<Result<(), QueueServiceError>>,
    pub delete_results: VecDeque<Result<(), QueueServiceError>>,
    pub acquire_results: VecDeque<Result<(), QueueServiceError>>,
    pub acquirable_jobs: Vec<AcquirableJob>,
    pub token_generation: u32,
    pub calls: Calls,
}

/// Queue service that replays a script and cancels `cancel` once the poll
/// script runs out, which ends the loop under test.
pub struct FakeQueueService {
    state: Mutex<QueueState>,
    cancel: CancellationToken,
    session_id: SessionId,
}

impl FakeQueueService {
    pub fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            cancel,
            session_id: SessionId::new_random(),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap()
    }

    pub fn push_poll(&self, poll: Poll) {
        self.state().polls.push_back(poll);
    }

    pub fn deliver(&self, message: Message) {
        self.push_poll(Poll::Deliver(message));
    }

    fn token(&self) -> AccessToken {
        AccessToken::new(format!("token-{}", self.state().token_generation))
    }
}

#[async_trait]
impl RemoteQueueService for FakeQueueService {
    async fn create_session(
        &self,
        scale_set_id: ScaleSetId,
        owner_name: &str,
    ) -> Result<Session, QueueServiceError> {
        let mut state = self.state();
        state.calls.create_session += 1;
        state.creates.pop_front().unwrap_or(Ok(()))?;
        Ok(Session {
            id: self.session_id,
            owner_name: owner_name.to_string(),
            scale_set_id,
            message_queue_url: "https://queue.example/session".to_string(),
            message_queue_access_token: AccessToken::new(format!(
                "token-{}",
                state.token_generation
            )),
            statistics: state.session_statistics,
        })
    }

    async fn refresh_session(
        &self,
        _scale_set_id: ScaleSetId,
        _session_id: SessionId,
    ) -> Result<QueueCredentials, QueueServiceError> {
        {
            let mut state = self.state();
            state.calls.refresh_session += 1;
            state.refreshes.pop_front().unwrap_or(Ok(()))?;
            state.token_generation += 1;
        }
        Ok(QueueCredentials {
            message_queue_url: "https://queue.example/session".to_string(),
            message_queue_access_token: self.token(),
        })
    }

    async fn delete_session(
        &self,
        _scale_set_id: ScaleSetId,
        session_id: SessionId,
    ) -> Result<(), QueueServiceError> {
        self.state().calls.delete_session.push(session_id);
        Ok(())
    }

    async fn get_message(
        &self,
        _queue_url: &str,
        token: &AccessToken,
        last_message_id: MessageId,
        max_capacity: u32,
    ) -> Result<Option<Message>, QueueServiceError> {
        let next = {
            let mut state = self.state();
            state.calls.get_message.push((
                last_message_id,
                max_capacity,
                token.expose().to_string(),
            ));
            state.polls.pop_front()
        };

        match next {
            Some(Poll::Deliver(message)) => Ok(Some(message)),
            Some(Poll::Empty) => Ok(None),
            Some(Poll::Fail(err)) => Err(err),
            Some(Poll::Hang) => {
                std::future::pending::<()>().await;
                Ok(None)
            }
            None => {
                self.cancel.cancel();
                Ok(None)
            }
        }
    }

    async fn delete_message(
        &self,
        _queue_url: &str,
        _token: &AccessToken,
        message_id: MessageId,
    ) -> Result<(), QueueServiceError> {
        let mut state = self.state();
        state.calls.delete_message.push(message_id);
        state.delete_results.pop_front().unwrap_or(Ok(()))
    }

    async fn acquire_jobs(
        &self,
        _scale_set_id: ScaleSetId,
        _token: &AccessToken,
        request_ids: &[RunnerRequestId],
    ) -> Result<Vec<RunnerRequestId>, QueueServiceError> {
        let mut state = self.state();
        state.calls.acquire_jobs.push(request_ids.to_vec());
        state.acquire_results.pop_front().unwrap_or(Ok(()))?;
        Ok(request_ids.to_vec())
    }

    async fn get_acquirable_jobs(
        &self,
        _scale_set_id: ScaleSetId,
    ) -> Result<Vec<AcquirableJob>, QueueServiceError> {
        let mut state = self.state();
        state.calls.get_acquirable_jobs += 1;
        Ok(state.acquirable_jobs.clone())
    }
}

// ---------------------------------------------------------------------------
// Workload scaler
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeScaler {
    pub replicas: Mutex<Vec<u32>>,
    pub started: Mutex<Vec<RunnerRequestId>>,
    pub fail_record_started: bool,
}

impl FakeScaler {
    pub fn replicas(&self) -> Vec<u32> {
        self.replicas.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkloadScaler for FakeScaler {
    async fn set_replicas(&self, _target: &WorkloadTarget, count: u32) -> anyhow::Result<()> {
        self.replicas.lock().unwrap().push(count);
        Ok(())
    }

    async fn record_job_started(
        &self,
        _target: &WorkloadTarget,
        job: &JobStarted,
    ) -> anyhow::Result<()> {
        self.started.lock().unwrap().push(job.base.runner_request_id);
        if self.fail_record_started {
            anyhow::bail!("runner not found");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event handler
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingHandler {
    pub events: Mutex<Vec<JobLifecycleEvent>>,
    pub fail_on: Option<RunnerRequestId>,
}

impl RecordingHandler {
    pub fn seen(&self) -> Vec<(&'static str, u64)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.message_type(), e.runner_request_id().as_u64()))
            .collect()
    }
}

#[async_trait]
impl JobEventHandler for RecordingHandler {
    async fn handle_event(
        &self,
        event: &JobLifecycleEvent,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        if self.fail_on == Some(event.runner_request_id()) {
            anyhow::bail!("bookkeeping store unavailable");
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn config(min_runners: u32, max_runners: u32) -> ListenerConfig {
    ListenerConfig {
        scale_set_id: ScaleSetId::new(1),
        owner_name: "listener-0".to_string(),
        min_runners,
        max_runners,
        target: WorkloadTarget::new("arc-runners", "linux-x64"),
        session: SessionSettings {
            conflict_retries: 2,
            conflict_backoff: Duration::from_millis(1),
            close_timeout: Duration::from_secs(1),
        },
    }
}

pub fn message(id: u64, assigned_jobs: u32, body: &str) -> Message {
    Message {
        id: MessageId::new(id),
        message_type: JOB_MESSAGES_TYPE.to_string(),
        body: body.to_string(),
        statistics: Statistics {
            total_assigned_jobs: assigned_jobs,
            ..Statistics::default()
        },
    }
}

pub fn listener(
    config: ListenerConfig,
    service: Arc<FakeQueueService>,
    scaler: Arc<FakeScaler>,
    handler: Arc<RecordingHandler>,
) -> MessageLoop {
    MessageLoop::new(config, service, scaler, handler, Arc::new(NoopMetricsSink))
        .expect("valid test config")
}
