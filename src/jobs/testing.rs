//! Scripted in-memory [`JobApi`] used by unit tests.

use crate::jobs::{JobApi, JobError, JobHandle, JobKind, JobSnapshot, JobStatus, SubmitPayload};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Recorded call made against the scripted API.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Submit(SubmitPayload),
    Status(String),
}

/// Scripted answer to a status query.
#[derive(Clone, Debug)]
pub(crate) enum StatusReply {
    Pending,
    Done(Value),
    Failed(Option<Value>),
    Http(u16, &'static str),
}

#[derive(Default)]
struct Script {
    submissions: HashMap<JobKind, VecDeque<Result<&'static str, JobError>>>,
    statuses: HashMap<String, VecDeque<StatusReply>>,
    calls: Vec<(Instant, Call)>,
}

/// Fake job service answering from per-kind and per-job queues. When a job's status queue
/// holds a single entry, that entry repeats forever.
#[derive(Default)]
pub(crate) struct ScriptedJobApi {
    script: Mutex<Script>,
    latency: Duration,
}

impl ScriptedJobApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call suspends for `latency` before answering.
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn accept(self, kind: JobKind, job_id: &'static str) -> Self {
        self.push_submission(kind, Ok(job_id))
    }

    pub(crate) fn reject(self, kind: JobKind, error: JobError) -> Self {
        self.push_submission(kind, Err(error))
    }

    pub(crate) fn statuses(self, job_id: &str, replies: Vec<StatusReply>) -> Self {
        self.script
            .lock()
            .unwrap()
            .statuses
            .insert(job_id.to_string(), replies.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub(crate) fn status_times(&self, job_id: &str) -> Vec<Instant> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(_, call)| matches!(call, Call::Status(id) if id == job_id))
            .map(|(at, _)| *at)
            .collect()
    }

    fn push_submission(self, kind: JobKind, reply: Result<&'static str, JobError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .submissions
            .entry(kind)
            .or_default()
            .push_back(reply);
        self
    }

    fn record(&self, call: Call) {
        self.script
            .lock()
            .unwrap()
            .calls
            .push((Instant::now(), call));
    }
}

#[async_trait]
impl JobApi for ScriptedJobApi {
    async fn submit(&self, payload: SubmitPayload) -> Result<JobHandle, JobError> {
        let kind = payload.kind();
        self.record(Call::Submit(payload));
        tokio::time::sleep(self.latency).await;
        let reply = self
            .script
            .lock()
            .unwrap()
            .submissions
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Ok(job_id)) => Ok(JobHandle::new(job_id, kind)),
            Some(Err(error)) => Err(error),
            None => Err(JobError::SubmissionRejected {
                kind,
                message: kind.start_failure_message().to_string(),
            }),
        }
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<JobSnapshot, JobError> {
        self.record(Call::Status(handle.id().to_string()));
        tokio::time::sleep(self.latency).await;
        let reply = {
            let mut script = self.script.lock().unwrap();
            let queue = script.statuses.entry(handle.id().to_string()).or_default();
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };
        match reply.unwrap_or(StatusReply::Pending) {
            StatusReply::Pending => Ok(JobSnapshot {
                status: JobStatus::Pending,
                result: None,
            }),
            StatusReply::Done(result) => Ok(JobSnapshot {
                status: JobStatus::Done,
                result: Some(result),
            }),
            StatusReply::Failed(result) => Ok(JobSnapshot {
                status: JobStatus::Failed,
                result,
            }),
            StatusReply::Http(code, body) => Err(JobError::PollTransport {
                job_id: handle.id().to_string(),
                status: StatusCode::from_u16(code).ok(),
                body: body.to_string(),
            }),
        }
    }
}
