//! Cancellable deferred tasks.
//!
//! # Responsibilities
//! - Run a future after a delay
//! - Hand the caller a cancel handle
//!
//! # Design Decisions
//! - Cancelling a task that already fired is a no-op
//! - Dropping the handle does NOT cancel the task; retry timers must
//!   outlive the caller that scheduled them

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Handle to a deferred task.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Cancel the task if it has not fired yet. No-op otherwise.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the task has run (or been cancelled) already.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run `task` after `delay` on the current runtime.
pub fn schedule<F>(delay: Duration, task: F) -> ScheduledTask
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        task.await;
    });
    ScheduledTask { handle }
}
