//! Extraction-then-analysis orchestration and the state it reports.

pub mod orchestrator;
pub mod session;
pub mod types;

pub use orchestrator::{Pipeline, user_message};
pub use session::{PipelineSession, RunResolution, RunTicket};
pub use types::{
    NoopObserver, PipelineObserver, PipelineOutcome, PipelineRequest, PipelineSettings,
    PipelineStage, PipelineState,
};
