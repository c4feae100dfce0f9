//! Status polling for submitted jobs.
//!
//! The poller is memoryless apart from its elapsed-time clock: each iteration acts only on the
//! latest status read. `Pending` (or any unrecognised status) waits one interval and re-checks
//! the budget; `Done` and `Failed` end the loop; a transport fault ends it immediately. A status
//! query is itself bounded by whatever remains of the budget.

use crate::jobs::cancel::CancelSignal;
use crate::jobs::client::JobApi;
use crate::jobs::types::{JobError, JobHandle, JobPayload, JobStatus};
use crate::metrics::PipelineMetrics;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

const JOB_FAILED_FALLBACK: &str = "Job failed";

/// Timeout budget and spacing between status queries for one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total time allowed before the stage fails with a timeout.
    pub timeout: Duration,
    /// Delay between consecutive status queries.
    pub interval: Duration,
}

impl PollPolicy {
    /// Default budget for extraction jobs: 3 minutes, polled every 1.5 seconds.
    pub const EXTRACTION: Self = Self {
        timeout: Duration::from_millis(180_000),
        interval: Duration::from_millis(1_500),
    };

    /// Default budget for analysis jobs: 4 minutes, polled every 1.5 seconds.
    pub const ANALYSIS: Self = Self {
        timeout: Duration::from_millis(240_000),
        interval: Duration::from_millis(1_500),
    };
}

/// Poll `handle` until it finishes, fails, or exhausts `policy.timeout`.
///
/// Both the status request and the inter-poll delay are raced against `cancel`; a fired
/// signal yields [`JobError::Cancelled`] without issuing further queries. A status request
/// still outstanding when the budget runs out ends the poll with [`JobError::PollTimeout`].
pub async fn poll_job(
    api: &dyn JobApi,
    handle: &JobHandle,
    policy: PollPolicy,
    cancel: &CancelSignal,
    metrics: &PipelineMetrics,
) -> Result<JobPayload, JobError> {
    let started = Instant::now();
    let mut queries = 0_u32;

    loop {
        queries += 1;
        metrics.record_status_query();
        let remaining = policy.timeout.saturating_sub(started.elapsed());
        let snapshot = match cancel
            .guard(tokio::time::timeout(remaining, api.job_status(handle)))
            .await?
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    job_id = handle.id(),
                    kind = %handle.kind(),
                    queries,
                    timeout = ?policy.timeout,
                    "Status query outlived the job budget"
                );
                return Err(timed_out(handle, policy));
            }
        };
        tracing::trace!(
            job_id = handle.id(),
            kind = %handle.kind(),
            status = ?snapshot.status,
            queries,
            "Polled job status"
        );

        match snapshot.status {
            JobStatus::Done => {
                tracing::debug!(job_id = handle.id(), queries, elapsed = ?started.elapsed(), "Job finished");
                return Ok(JobPayload::from_result(snapshot.result));
            }
            JobStatus::Failed => {
                let reason = failure_reason(snapshot.result);
                tracing::debug!(job_id = handle.id(), %reason, "Job reported failure");
                return Err(JobError::JobFailed {
                    kind: handle.kind(),
                    job_id: handle.id().to_string(),
                    reason,
                });
            }
            JobStatus::Pending => {}
        }

        cancel.sleep(policy.interval).await?;
        if started.elapsed() >= policy.timeout {
            tracing::warn!(
                job_id = handle.id(),
                kind = %handle.kind(),
                queries,
                timeout = ?policy.timeout,
                "Job did not finish in time"
            );
            return Err(timed_out(handle, policy));
        }
    }
}

fn timed_out(handle: &JobHandle, policy: PollPolicy) -> JobError {
    JobError::PollTimeout {
        kind: handle.kind(),
        job_id: handle.id().to_string(),
        timeout: policy.timeout,
    }
}

fn failure_reason(result: Option<Value>) -> String {
    match result {
        Some(Value::String(reason)) if !reason.trim().is_empty() => reason,
        Some(Value::Null) | Some(Value::String(_)) | None => JOB_FAILED_FALLBACK.to_string(),
        Some(other) => other.to_string(),
    }
}
