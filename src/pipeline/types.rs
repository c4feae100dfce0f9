//! Values exchanged between the pipeline and its presentation layer.

use crate::config::Config;
use crate::jobs::{JobPayload, PollPolicy};
use serde::Serialize;
use std::fmt;

/// Validated pipeline input: a non-empty article URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineRequest {
    url: String,
}

impl PipelineRequest {
    /// Build a request, returning `None` for empty or whitespace-only URLs.
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            url: trimmed.to_string(),
        })
    }

    /// Article URL to analyze.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Terminal result of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum PipelineOutcome {
    /// Both stages completed; carries the analysis result.
    Success(JobPayload),
    /// Some stage failed; carries the message to show the user.
    Failure(String),
}

/// Stage currently executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    /// Extraction job submitted or being polled.
    Extracting,
    /// Analysis job submitted or being polled.
    Analyzing,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extracting => f.write_str("extracting"),
            Self::Analyzing => f.write_str("analyzing"),
        }
    }
}

/// State reported to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PipelineState {
    /// Nothing running and nothing to show.
    #[default]
    Idle,
    /// A run is in flight.
    Running(PipelineStage),
    /// The latest run succeeded.
    Success(JobPayload),
    /// The latest run failed.
    Error(String),
}

impl PipelineState {
    /// Whether this state ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }
}

impl From<PipelineOutcome> for PipelineState {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Success(payload) => Self::Success(payload),
            PipelineOutcome::Failure(message) => Self::Error(message),
        }
    }
}

/// Receives state changes while a pipeline runs.
pub trait PipelineObserver: Send + Sync {
    /// Called on start, on every stage transition, and once with the terminal state.
    fn on_state_change(&self, state: &PipelineState);
}

impl<F> PipelineObserver for F
where
    F: Fn(&PipelineState) + Send + Sync,
{
    fn on_state_change(&self, state: &PipelineState) {
        self(state);
    }
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_state_change(&self, _state: &PipelineState) {}
}

/// Polling budgets for both stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Budget for the extraction job.
    pub extraction: PollPolicy,
    /// Budget for the analysis job.
    pub analysis: PollPolicy,
}

impl PipelineSettings {
    /// Read stage budgets from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            extraction: config.extraction,
            analysis: config.analysis,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extraction: PollPolicy::EXTRACTION,
            analysis: PollPolicy::ANALYSIS,
        }
    }
}
