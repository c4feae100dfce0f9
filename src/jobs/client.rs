//! HTTP client for the news analyzer job service.

use crate::config::get_config;
use crate::jobs::types::{
    JobError, JobHandle, JobKind, JobPayload, JobSnapshot, JobStatus, SingleShotResponse,
    StatusResponse, SubmitPayload, SubmitResponse,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("rustynews/", env!("CARGO_PKG_VERSION"));

/// Operations the pipeline needs from the job service.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Start a job. Exactly one request is issued; nothing is retried.
    async fn submit(&self, payload: SubmitPayload) -> Result<JobHandle, JobError>;

    /// Read the current status of a job.
    async fn job_status(&self, handle: &JobHandle) -> Result<JobSnapshot, JobError>;
}

/// reqwest-backed [`JobApi`] implementation.
pub struct HttpJobClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
}

impl HttpJobClient {
    /// Build a client for `base_url`. `request_timeout` bounds every individual request.
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self, JobError> {
        let base_url = normalize_base_url(base_url).map_err(JobError::InvalidBaseUrl)?;
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|error| JobError::InvalidBaseUrl(format!("failed to build client: {error}")))?;

        tracing::debug!(
            url = %base_url,
            request_timeout = ?request_timeout,
            "Initialized job service HTTP client"
        );

        Ok(Self { http, base_url })
    }

    /// Build a client from the global configuration.
    pub fn from_config() -> Result<Self, JobError> {
        let config = get_config();
        Self::new(&config.service_url, config.request_timeout)
    }

    /// Run the legacy one-request analysis (`POST api/analyze`), which answers with the final
    /// result directly instead of a job identifier.
    pub async fn analyze_single_shot(&self, url: &str) -> Result<JobPayload, JobError> {
        let kind = JobKind::Analysis;
        let response = self
            .http
            .post(self.endpoint("api/analyze"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|error| JobError::SubmissionTransport {
                kind,
                status: None,
                body: error.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let error = JobError::SubmissionTransport {
                kind,
                status: Some(status),
                body,
            };
            tracing::error!(error = %error, "Single-shot analysis failed");
            return Err(error);
        }

        let parsed: SingleShotResponse = serde_json::from_str(&body).unwrap_or_default();
        match parsed.result {
            Some(result) => Ok(JobPayload::from_result(Some(result))),
            None => Err(JobError::SubmissionRejected {
                kind,
                message: parsed
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Failed to analyze article".to_string()),
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format_endpoint(&self.base_url, path)
    }
}

#[async_trait]
impl JobApi for HttpJobClient {
    async fn submit(&self, payload: SubmitPayload) -> Result<JobHandle, JobError> {
        let kind = payload.kind();
        let response = self
            .http
            .post(self.endpoint(kind.submit_path()))
            .json(&payload)
            .send()
            .await
            .map_err(|error| JobError::SubmissionTransport {
                kind,
                status: None,
                body: error.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let error = JobError::SubmissionTransport {
                kind,
                status: Some(status),
                body,
            };
            tracing::error!(error = %error, "Job submission failed");
            return Err(error);
        }

        let parsed: SubmitResponse = serde_json::from_str(&body).unwrap_or_default();
        match parsed.job_id.filter(|id| !id.trim().is_empty()) {
            Some(job_id) => {
                tracing::debug!(%kind, job_id = %job_id, "Job submitted");
                Ok(JobHandle::new(job_id, kind))
            }
            None => {
                let message = parsed
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| kind.start_failure_message().to_string());
                tracing::warn!(%kind, %message, "Job submission rejected");
                Err(JobError::SubmissionRejected { kind, message })
            }
        }
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<JobSnapshot, JobError> {
        let job_id = handle.id().to_string();
        let response = self
            .http
            .get(self.endpoint(&format!("api/job/{job_id}")))
            .send()
            .await
            .map_err(|error| JobError::PollTransport {
                job_id: job_id.clone(),
                status: None,
                body: error.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(JobError::PollTransport {
                job_id,
                status: Some(status),
                body,
            });
        }

        let parsed: StatusResponse =
            serde_json::from_str(&body).map_err(|_| JobError::PollTransport {
                job_id: job_id.clone(),
                status: Some(status),
                body: body.clone(),
            })?;

        Ok(JobSnapshot {
            status: JobStatus::from_wire(&parsed.status),
            result: parsed.result,
        })
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url.trim()).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
