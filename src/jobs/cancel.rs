//! Cancellation primitive shared by the poller and the pipeline.
//!
//! A [`CancelSignal`] wraps a `tokio::sync::watch` flag. Every suspension point in a pipeline
//! run (request futures and inter-poll delays) is raced against the flag, so cancelling a run
//! interrupts whatever it is currently waiting on instead of letting the wait run out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Returned when a wait or request was abandoned because its run was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

impl From<Cancelled> for super::JobError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Cloneable cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a signal in the not-cancelled state.
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolve once the signal fires (immediately if it already has).
    pub async fn cancelled(&self) {
        let mut receiver = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleep for `duration`, returning early with [`Cancelled`] if the signal fires.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.guard(tokio::time::sleep(duration)).await
    }

    /// Drive `future` to completion unless the signal fires first, in which case the future
    /// is dropped (aborting any in-flight request it owns).
    pub async fn guard<F>(&self, future: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Cancelled),
            output = future => Ok(output),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
