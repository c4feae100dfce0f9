//! Two-stage pipeline: extract an article, then analyze the extracted text.
//!
//! Each stage is a submission followed by a poll, and every stage depends on the value the
//! previous one produced. Errors from the job layer are caught here exactly once and turned
//! into the single message the user sees; nothing is retried.

use crate::jobs::{
    CancelSignal, Cancelled, JobApi, JobError, JobKind, JobPayload, PollPolicy, SubmitPayload,
    poll_job, service_error_message,
};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::types::{
    NoopObserver, PipelineObserver, PipelineOutcome, PipelineRequest, PipelineSettings,
    PipelineStage, PipelineState,
};
use std::sync::Arc;
use std::time::Duration;

/// Drives extraction and analysis jobs against a [`JobApi`].
pub struct Pipeline {
    api: Arc<dyn JobApi>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Create a pipeline over `api` using the given stage budgets.
    pub fn new(api: Arc<dyn JobApi>, settings: PipelineSettings) -> Self {
        Self {
            api,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Shared metrics registry.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current counter values.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run the pipeline for a raw URL. Empty input is a no-op and returns `None` without
    /// touching the network.
    pub async fn analyze_url(&self, url: &str) -> Option<PipelineOutcome> {
        let Some(request) = PipelineRequest::new(url) else {
            tracing::debug!("Ignoring pipeline request with empty URL");
            return None;
        };
        Some(self.run(request).await)
    }

    /// Run both stages to a terminal outcome.
    pub async fn run(&self, request: PipelineRequest) -> PipelineOutcome {
        let never = CancelSignal::new();
        match self.run_observed(request, &NoopObserver, &never).await {
            Ok(outcome) => outcome,
            Err(Cancelled) => PipelineOutcome::Failure("Analysis cancelled".to_string()),
        }
    }

    /// Run both stages, reporting progress to `observer`.
    ///
    /// The observer sees `Running(Extracting)`, then `Running(Analyzing)` once extraction has
    /// produced text, then exactly one terminal state. When `cancel` fires, the pending request
    /// or wait is dropped, `Err(Cancelled)` is returned, and no terminal state is reported.
    pub async fn run_observed(
        &self,
        request: PipelineRequest,
        observer: &dyn PipelineObserver,
        cancel: &CancelSignal,
    ) -> Result<PipelineOutcome, Cancelled> {
        self.metrics.record_started();
        tracing::info!(url = request.url(), "Starting analysis pipeline");
        observer.on_state_change(&PipelineState::Running(PipelineStage::Extracting));

        let outcome = match self.execute(&request, observer, cancel).await {
            Ok(payload) => {
                self.metrics.record_succeeded();
                tracing::info!(url = request.url(), "Analysis pipeline succeeded");
                PipelineOutcome::Success(payload)
            }
            Err(JobError::Cancelled) => {
                self.metrics.record_cancelled();
                tracing::info!(url = request.url(), "Analysis pipeline cancelled");
                return Err(Cancelled);
            }
            Err(error) => {
                self.metrics.record_failed();
                let message = user_message(&error);
                tracing::warn!(url = request.url(), error = %error, %message, "Analysis pipeline failed");
                PipelineOutcome::Failure(message)
            }
        };

        observer.on_state_change(&outcome.clone().into());
        Ok(outcome)
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        observer: &dyn PipelineObserver,
        cancel: &CancelSignal,
    ) -> Result<JobPayload, JobError> {
        let article = self
            .stage(
                SubmitPayload::Extraction {
                    url: request.url().to_string(),
                },
                self.settings.extraction,
                cancel,
            )
            .await?;

        observer.on_state_change(&PipelineState::Running(PipelineStage::Analyzing));

        self.stage(
            SubmitPayload::Analysis {
                text: article.into_text(),
            },
            self.settings.analysis,
            cancel,
        )
        .await
    }

    async fn stage(
        &self,
        payload: SubmitPayload,
        policy: PollPolicy,
        cancel: &CancelSignal,
    ) -> Result<JobPayload, JobError> {
        let handle = cancel.guard(self.api.submit(payload)).await??;
        self.metrics.record_submission();
        tracing::debug!(job_id = handle.id(), kind = %handle.kind(), "Polling job");
        poll_job(self.api.as_ref(), &handle, policy, cancel, &self.metrics).await
    }
}

/// Convert a job-layer error into the message shown to the user, preferring service-reported
/// text over transport detail over a generic fallback.
pub fn user_message(error: &JobError) -> String {
    match error {
        JobError::InvalidBaseUrl(_) => error.to_string(),
        JobError::SubmissionTransport { kind, status, body } => {
            if let Some(message) = service_error_message(body) {
                return message;
            }
            match status {
                Some(status) => format!("{} (HTTP {})", kind.start_failure_message(), status.as_u16()),
                None => format!("{}: {body}", kind.start_failure_message()),
            }
        }
        JobError::SubmissionRejected { message, .. } => message.clone(),
        JobError::PollTransport { status, body, .. } => match status {
            Some(status) => format!("Job poll failed: {} {body}", status.as_u16())
                .trim_end()
                .to_string(),
            None => format!("Job poll failed: {body}"),
        },
        JobError::JobFailed { reason, .. } => reason.clone(),
        JobError::PollTimeout { kind, timeout, .. } => {
            let stage = match kind {
                JobKind::Extraction => "Extraction",
                JobKind::Analysis => "Analysis",
            };
            format!("{stage} job timed out after {}", format_budget(*timeout))
        }
        JobError::Cancelled => "Analysis cancelled".to_string(),
    }
}

fn format_budget(budget: Duration) -> String {
    if budget.subsec_millis() == 0 {
        format!("{}s", budget.as_secs())
    } else {
        format!("{}ms", budget.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{Call, ScriptedJobApi, StatusReply};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn pipeline(api: &Arc<ScriptedJobApi>) -> Pipeline {
        Pipeline::new(api.clone(), PipelineSettings::default())
    }

    fn request() -> PipelineRequest {
        PipelineRequest::new("https://news.example.com/story").expect("request")
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PipelineState>>);

    impl PipelineObserver for Recorder {
        fn on_state_change(&self, state: &PipelineState) {
            self.0.lock().unwrap().push(state.clone());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_threads_extracted_text_into_analysis() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses(
                    "e1",
                    vec![
                        StatusReply::Pending,
                        StatusReply::Pending,
                        StatusReply::Done(json!("Article body...")),
                    ],
                )
                .accept(JobKind::Analysis, "a1")
                .statuses(
                    "a1",
                    vec![StatusReply::Done(json!("Positive sentiment, neutral bias."))],
                ),
        );
        let recorder = Recorder::default();
        let pipeline = pipeline(&api);

        let outcome = pipeline
            .run_observed(request(), &recorder, &CancelSignal::new())
            .await
            .expect("not cancelled");

        assert_eq!(
            outcome,
            PipelineOutcome::Success(JobPayload::from("Positive sentiment, neutral bias."))
        );
        assert_eq!(
            api.calls(),
            vec![
                Call::Submit(SubmitPayload::Extraction {
                    url: "https://news.example.com/story".into()
                }),
                Call::Status("e1".into()),
                Call::Status("e1".into()),
                Call::Status("e1".into()),
                Call::Submit(SubmitPayload::Analysis {
                    text: "Article body...".into()
                }),
                Call::Status("a1".into()),
            ]
        );
        assert_eq!(
            recorder.0.into_inner().unwrap(),
            vec![
                PipelineState::Running(PipelineStage::Extracting),
                PipelineState::Running(PipelineStage::Analyzing),
                PipelineState::Success(JobPayload::from("Positive sentiment, neutral bias.")),
            ]
        );
        let snapshot = pipeline.metrics_snapshot();
        assert_eq!(snapshot.jobs_submitted, 2);
        assert_eq!(snapshot.status_queries, 4);
        assert_eq!(snapshot.runs_succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_extraction_exits_before_polling() {
        let api = Arc::new(ScriptedJobApi::new().reject(
            JobKind::Extraction,
            JobError::SubmissionRejected {
                kind: JobKind::Extraction,
                message: "invalid url".into(),
            },
        ));
        let pipeline = pipeline(&api);

        let outcome = pipeline.run(request()).await;

        assert_eq!(outcome, PipelineOutcome::Failure("invalid url".into()));
        assert_eq!(api.calls().len(), 1);
        assert!(matches!(api.calls()[0], Call::Submit(_)));
        assert_eq!(pipeline.metrics_snapshot().runs_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_extraction_never_reaches_analysis() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses(
                    "e1",
                    vec![StatusReply::Failed(Some(json!("paywalled content")))],
                )
                .accept(JobKind::Analysis, "a1"),
        );
        let recorder = Recorder::default();

        let outcome = pipeline(&api)
            .run_observed(request(), &recorder, &CancelSignal::new())
            .await
            .expect("not cancelled");

        assert_eq!(outcome, PipelineOutcome::Failure("paywalled content".into()));
        assert!(
            api.calls()
                .iter()
                .all(|call| !matches!(call, Call::Submit(SubmitPayload::Analysis { .. })))
        );
        assert!(
            !recorder
                .0
                .into_inner()
                .unwrap()
                .contains(&PipelineState::Running(PipelineStage::Analyzing))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_timeout_yields_timeout_message() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses("e1", vec![StatusReply::Pending]),
        );
        let started = Instant::now();

        let outcome = pipeline(&api).run(request()).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Failure("Extraction job timed out after 180s".into())
        );
        assert_eq!(started.elapsed(), Duration::from_millis(180_000));
        assert_eq!(api.status_times("e1").len(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_stage_uses_its_own_budget() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses("e1", vec![StatusReply::Done(json!("text"))])
                .accept(JobKind::Analysis, "a1")
                .statuses("a1", vec![StatusReply::Pending]),
        );

        let outcome = pipeline(&api).run(request()).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Failure("Analysis job timed out after 240s".into())
        );
        assert_eq!(api.status_times("a1").len(), 160);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_mid_poll_fails_with_transport_message() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses(
                    "e1",
                    vec![
                        StatusReply::Pending,
                        StatusReply::Http(500, "boom"),
                        StatusReply::Pending,
                    ],
                ),
        );

        let outcome = pipeline(&api).run(request()).await;

        assert_eq!(outcome, PipelineOutcome::Failure("Job poll failed: 500 boom".into()));
        assert_eq!(api.status_times("e1").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_submission_failure_is_reported_once() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses("e1", vec![StatusReply::Done(json!("text"))])
                .reject(
                    JobKind::Analysis,
                    JobError::SubmissionTransport {
                        kind: JobKind::Analysis,
                        status: Some(StatusCode::BAD_GATEWAY),
                        body: "<html>gateway</html>".into(),
                    },
                ),
        );
        let recorder = Recorder::default();

        let outcome = pipeline(&api)
            .run_observed(request(), &recorder, &CancelSignal::new())
            .await
            .expect("not cancelled");

        assert_eq!(
            outcome,
            PipelineOutcome::Failure("Failed to start analysis (HTTP 502)".into())
        );
        let states = recorder.0.into_inner().unwrap();
        assert_eq!(states.iter().filter(|state| state.is_terminal()).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_poll_returns_promptly_without_terminal_state() {
        let api = Arc::new(
            ScriptedJobApi::new()
                .accept(JobKind::Extraction, "e1")
                .statuses("e1", vec![StatusReply::Pending]),
        );
        let pipeline = Arc::new(pipeline(&api));
        let recorder = Arc::new(Recorder::default());
        let cancel = CancelSignal::new();

        let task = {
            let pipeline = Arc::clone(&pipeline);
            let recorder = Arc::clone(&recorder);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                pipeline
                    .run_observed(request(), recorder.as_ref(), &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        cancel.cancel();
        let result = task.await.expect("task");

        assert_eq!(result, Err(Cancelled));
        assert_eq!(api.status_times("e1").len(), 3);
        assert!(
            recorder
                .0
                .lock()
                .unwrap()
                .iter()
                .all(|state| !state.is_terminal())
        );
        assert_eq!(pipeline.metrics_snapshot().runs_cancelled, 1);
    }

    #[tokio::test]
    async fn empty_url_is_a_no_op() {
        let api = Arc::new(ScriptedJobApi::new());
        assert_eq!(pipeline(&api).analyze_url("  ").await, None);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn submission_transport_prefers_service_error_text() {
        let error = JobError::SubmissionTransport {
            kind: JobKind::Extraction,
            status: Some(StatusCode::BAD_REQUEST),
            body: r#"{"error":"invalid url"}"#.into(),
        };
        assert_eq!(user_message(&error), "invalid url");

        let network = JobError::SubmissionTransport {
            kind: JobKind::Extraction,
            status: None,
            body: "connection refused".into(),
        };
        assert_eq!(
            user_message(&network),
            "Failed to start extraction: connection refused"
        );
    }

    #[test]
    fn each_poll_error_kind_has_distinct_message() {
        let messages = [
            user_message(&JobError::PollTransport {
                job_id: "e1".into(),
                status: None,
                body: "reset".into(),
            }),
            user_message(&JobError::JobFailed {
                kind: JobKind::Analysis,
                job_id: "a1".into(),
                reason: "model overloaded".into(),
            }),
            user_message(&JobError::PollTimeout {
                kind: JobKind::Analysis,
                job_id: "a1".into(),
                timeout: Duration::from_secs(240),
            }),
        ];
        assert_eq!(messages[0], "Job poll failed: reset");
        assert_eq!(messages[1], "model overloaded");
        assert_eq!(messages[2], "Analysis job timed out after 240s");
    }
}
