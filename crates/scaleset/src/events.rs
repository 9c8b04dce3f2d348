//! Job-lifecycle sub-messages carried inside a batched queue message.
//!
//! A batch body is a JSON array; each element carries a `messageType`
//! discriminator naming one of the four lifecycle stages below. Every stage
//! shares [`JobMessageBase`] and adds its own fields.
//!
//! Only `runnerRequestId` is mandatory on the wire. Everything else defaults
//! when absent, because the service omits fields that do not apply to a stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AcquirableJob, RunnerId, RunnerRequestId};

/// Discriminator values for the four known sub-message kinds.
pub mod message_types {
    /// A job became visible and may be acquired.
    pub const JOB_AVAILABLE: &str = "JobAvailable";
    /// A job was assigned to this scale set.
    pub const JOB_ASSIGNED: &str = "JobAssigned";
    /// A runner started executing a job.
    pub const JOB_STARTED: &str = "JobStarted";
    /// A job finished.
    pub const JOB_COMPLETED: &str = "JobCompleted";
}

/// Fields common to every job-lifecycle sub-message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessageBase {
    pub runner_request_id: RunnerRequestId,
    #[serde(default)]
    pub repository_name: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub job_workflow_ref: String,
    #[serde(default)]
    pub job_display_name: String,
    #[serde(default)]
    pub workflow_run_id: u64,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub request_labels: Vec<String>,
    #[serde(default)]
    pub queue_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scale_set_assign_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub runner_assign_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,
}

/// A job became visible to the scale set and must be acquired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAvailable {
    #[serde(flatten)]
    pub base: JobMessageBase,
    #[serde(default)]
    pub acquire_job_url: String,
}

/// A job was assigned to this scale set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAssigned {
    #[serde(flatten)]
    pub base: JobMessageBase,
}

/// A runner picked up a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    #[serde(flatten)]
    pub base: JobMessageBase,
    #[serde(default)]
    pub runner_id: RunnerId,
    #[serde(default)]
    pub runner_name: String,
}

/// A job finished on a runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompleted {
    #[serde(flatten)]
    pub base: JobMessageBase,
    /// Outcome reported by the service (e.g. `succeeded`, `failed`, `canceled`).
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub runner_id: RunnerId,
    #[serde(default)]
    pub runner_name: String,
}

/// A decoded job-lifecycle sub-message.
#[derive(Debug, Clone, PartialEq)]
pub enum JobLifecycleEvent {
    Available(JobAvailable),
    Assigned(JobAssigned),
    Started(JobStarted),
    Completed(JobCompleted),
}

impl JobLifecycleEvent {
    /// Returns the fields shared by every lifecycle stage.
    pub fn base(&self) -> &JobMessageBase {
        match self {
            Self::Available(event) => &event.base,
            Self::Assigned(event) => &event.base,
            Self::Started(event) => &event.base,
            Self::Completed(event) => &event.base,
        }
    }

    /// Returns the runner request this event refers to.
    pub fn runner_request_id(&self) -> RunnerRequestId {
        self.base().runner_request_id
    }

    /// Returns the wire discriminator for this event.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Available(_) => message_types::JOB_AVAILABLE,
            Self::Assigned(_) => message_types::JOB_ASSIGNED,
            Self::Started(_) => message_types::JOB_STARTED,
            Self::Completed(_) => message_types::JOB_COMPLETED,
        }
    }
}

// ---------------------------------------------------------------------------
// Acquirable job → JobAvailable sub-message
// ---------------------------------------------------------------------------

/// Wire shape of one element of an encoded acquirable-jobs snapshot.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailableSubMessage<'a> {
    message_type: &'a str,
    #[serde(flatten)]
    job: &'a JobAvailable,
}

impl From<&AcquirableJob> for JobAvailable {
    fn from(job: &AcquirableJob) -> Self {
        JobAvailable {
            base: JobMessageBase {
                runner_request_id: job.runner_request_id,
                repository_name: job.repository_name.clone(),
                owner_name: job.owner_name.clone(),
                job_workflow_ref: job.job_workflow_ref.clone(),
                event_name: job.event_name.clone(),
                request_labels: job.request_labels.clone(),
                ..JobMessageBase::default()
            },
            acquire_job_url: job.acquire_job_url.clone(),
        }
    }
}

/// Encodes an acquirable-jobs snapshot as a batch body of `JobAvailable`
/// sub-messages, in the order given.
///
/// A job whose `messageType` is blank is tagged `JobAvailable`; a job with
/// any other tag keeps it.
pub fn encode_acquirable_jobs(jobs: &[AcquirableJob]) -> Result<String, serde_json::Error> {
    let available: Vec<JobAvailable> = jobs.iter().map(JobAvailable::from).collect();
    let elements: Vec<AvailableSubMessage<'_>> = jobs
        .iter()
        .zip(&available)
        .map(|(job, event)| AvailableSubMessage {
            message_type: if job.message_type.is_empty() {
                message_types::JOB_AVAILABLE
            } else {
                job.message_type.as_str()
            },
            job: event,
        })
        .collect();
    serde_json::to_string(&elements)
}
