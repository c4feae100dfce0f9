use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    runs_cancelled: AtomicU64,
    runs_superseded: AtomicU64,
    jobs_submitted: AtomicU64,
    status_queries: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pipeline run that passed input validation.
    pub fn record_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that ended in `Success`.
    pub fn record_succeeded(&self) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that ended in `Failure`.
    pub fn record_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run abandoned through cancellation.
    pub fn record_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run whose outcome was discarded because a newer run replaced it.
    pub fn record_superseded(&self) {
        self.runs_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job accepted by the service.
    pub fn record_submission(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one status query issued while polling a job.
    pub fn record_status_query(&self) {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            runs_superseded: self.runs_superseded.load(Ordering::Relaxed),
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            status_queries: self.status_queries.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Runs started since process start.
    pub runs_started: u64,
    /// Runs that produced a success outcome.
    pub runs_succeeded: u64,
    /// Runs that produced a failure outcome.
    pub runs_failed: u64,
    /// Runs abandoned through cancellation.
    pub runs_cancelled: u64,
    /// Runs whose outcome was discarded in favour of a newer run.
    pub runs_superseded: u64,
    /// Jobs accepted by the service across both stages.
    pub jobs_submitted: u64,
    /// Status queries issued while polling either stage.
    pub status_queries: u64,
}
