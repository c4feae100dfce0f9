#![deny(missing_docs)]

//! Client for the news analyzer job service.
//!
//! A run submits an extraction job for an article URL, polls it to completion, submits the
//! extracted text as an analysis job, polls that too, and reports a single
//! [`pipeline::PipelineOutcome`].

/// Environment-driven configuration management.
pub mod config;
/// Job submission, polling, and cancellation.
pub mod jobs;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Two-stage pipeline orchestration.
pub mod pipeline;
