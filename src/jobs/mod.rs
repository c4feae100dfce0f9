//! Job service integration: submission, status polling, and cancellation.

/// Cancellable waits shared by the poller and the pipeline.
pub mod cancel;
pub mod client;
pub mod poller;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::{CancelSignal, Cancelled};
pub use client::{HttpJobClient, JobApi};
pub use poller::{PollPolicy, poll_job};
pub use types::{
    JobError, JobHandle, JobKind, JobPayload, JobSnapshot, JobStatus, SubmitPayload,
    service_error_message,
};
