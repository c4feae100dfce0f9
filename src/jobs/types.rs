//! Shared types used by the job client, the poller, and the pipeline.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The two job stages offered by the remote service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Fetch an article and extract its body text.
    Extraction,
    /// Analyze previously extracted text.
    Analysis,
}

impl JobKind {
    /// Endpoint path (relative to the service base URL) that starts a job of this kind.
    pub const fn submit_path(self) -> &'static str {
        match self {
            Self::Extraction => "api/extract",
            Self::Analysis => "api/analyze-text",
        }
    }

    /// Fallback message used when the service refuses a submission without explanation.
    pub const fn start_failure_message(self) -> &'static str {
        match self {
            Self::Extraction => "Failed to start extraction",
            Self::Analysis => "Failed to start analysis",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => f.write_str("extraction"),
            Self::Analysis => f.write_str("analysis"),
        }
    }
}

/// Service-assigned identifier for a submitted job, tagged with its stage.
///
/// Handles are only produced by a successful submission and never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
    kind: JobKind,
}

impl JobHandle {
    pub(crate) fn new(id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Opaque identifier assigned by the service.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stage the job belongs to.
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

/// Request body used to start a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubmitPayload {
    /// `{"url": ...}` sent to the extraction endpoint.
    Extraction {
        /// Article URL to fetch.
        url: String,
    },
    /// `{"text": ...}` sent to the analysis endpoint.
    Analysis {
        /// Extracted article text.
        text: String,
    },
}

impl SubmitPayload {
    /// Stage this payload starts.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Extraction { .. } => JobKind::Extraction,
            Self::Analysis { .. } => JobKind::Analysis,
        }
    }
}

/// Lifecycle status reported by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Work is queued or still running.
    Pending,
    /// Work finished; the result carries the payload.
    Done,
    /// Work failed; the result carries the reason.
    Failed,
}

impl JobStatus {
    /// Interpret a wire status. Only the exact strings `done` and `failed` are terminal;
    /// anything else, including differently cased spellings, is treated as still pending.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "done" => Self::Done,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A single status read for a job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSnapshot {
    /// Reported status.
    pub status: JobStatus,
    /// Raw `result` field, when present.
    pub result: Option<Value>,
}

/// Payload carried by a finished job.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobPayload {
    /// Plain text result (extracted article, textual verdict).
    Text(String),
    /// Any non-string JSON result.
    Structured(Value),
}

impl JobPayload {
    /// Wrap a raw `result` value. Missing or `null` results become empty text.
    pub fn from_result(result: Option<Value>) -> Self {
        match result {
            None | Some(Value::Null) => Self::Text(String::new()),
            Some(Value::String(text)) => Self::Text(text),
            Some(other) => Self::Structured(other),
        }
    }

    /// Flatten the payload into text, encoding structured values as compact JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl fmt::Display for JobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Structured(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{value}"),
            },
        }
    }
}

impl From<&str> for JobPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Errors raised while submitting or polling jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid service URL: {0}")]
    InvalidBaseUrl(String),
    /// Submission failed at the transport level or returned a non-success status.
    #[error("Failed to submit {kind} job: {}", transport_detail(.status, .body))]
    SubmissionTransport {
        /// Stage being submitted.
        kind: JobKind,
        /// HTTP status, absent when no response was received.
        status: Option<StatusCode>,
        /// Response body or transport error text.
        body: String,
    },
    /// The service answered successfully but did not hand out a job identifier.
    #[error("{kind} job was not accepted: {message}")]
    SubmissionRejected {
        /// Stage being submitted.
        kind: JobKind,
        /// Service-reported error, or a generic message.
        message: String,
    },
    /// A status query failed at the transport level or returned a non-success status.
    #[error("Status query for job {job_id} failed: {}", transport_detail(.status, .body))]
    PollTransport {
        /// Job being polled.
        job_id: String,
        /// HTTP status, absent when no response was received.
        status: Option<StatusCode>,
        /// Response body or transport error text.
        body: String,
    },
    /// The service reported the job as failed.
    #[error("{kind} job {job_id} failed: {reason}")]
    JobFailed {
        /// Stage of the failed job.
        kind: JobKind,
        /// Job identifier.
        job_id: String,
        /// Service-supplied reason, or a generic message.
        reason: String,
    },
    /// The job did not reach a terminal status within the stage budget.
    #[error("{kind} job {job_id} did not finish within {}s", whole_seconds(.timeout))]
    PollTimeout {
        /// Stage of the job.
        kind: JobKind,
        /// Job identifier.
        job_id: String,
        /// Budget that was exhausted.
        timeout: Duration,
    },
    /// The surrounding pipeline was cancelled.
    #[error("Job operation cancelled")]
    Cancelled,
}

fn whole_seconds(duration: &Duration) -> u64 {
    duration.as_secs()
}

fn transport_detail(status: &Option<StatusCode>, body: &str) -> String {
    match status {
        Some(status) if body.is_empty() => format!("HTTP {status}"),
        Some(status) => format!("HTTP {status}: {body}"),
        None => body.to_string(),
    }
}

/// Body returned by the submission endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub(crate) job_id: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

/// Body returned by `GET api/job/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) result: Option<Value>,
}

/// Body returned by the legacy `POST api/analyze` endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SingleShotResponse {
    #[serde(default)]
    pub(crate) result: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

/// Pull a non-empty `error` string out of a JSON response body, if there is one.
pub fn service_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}
