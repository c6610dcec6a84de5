use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::sleep;

use super::traits::{ScheduledCallback, ScheduledTask, Scheduler};

/// [`Scheduler`] backed by the Tokio timer.
///
/// Each callback runs on its own task after the delay; cancelling aborts the task.
/// Must be used from inside a Tokio runtime.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: ScheduledCallback) -> Box<dyn ScheduledTask> {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            callback();
        });

        Box::new(TokioTask(handle.abort_handle()))
    }
}

struct TokioTask(AbortHandle);

impl ScheduledTask for TokioTask {
    fn cancel(&self) {
        self.0.abort();
    }
}
