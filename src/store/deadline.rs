//! One-shot deadline owned by a pending slot.

use core::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Command;
use crate::models::Platform;

/// Scheduled conversion of a platform's pending slot.
///
/// When the delay elapses the timer posts
/// [`Command::DeadlineElapsed`] into the store's own queue, so it is
/// processed strictly between other commands. Dropping or cancelling the
/// timer aborts the task; a firing that was already queued is discarded by
/// the generation check in [`crate::reconcile`].
#[derive(Debug)]
pub(super) struct DeadlineTimer {
    /// Generation of the slot this timer was armed for.
    generation: u64,
    /// Sleeping task that posts the deadline.
    task: JoinHandle<()>,
}

impl DeadlineTimer {
    /// Arms a deadline for `platform`'s slot `generation`.
    pub(super) fn schedule(
        platform: Platform,
        generation: u64,
        delay: Duration,
        queue: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The store may have shut down while we slept.
            if let Some(queue) = queue.upgrade()
                && queue
                    .send(Command::DeadlineElapsed {
                        platform,
                        generation,
                    })
                    .is_err()
            {
                tracing::debug!(%platform, generation, "store closed before deadline");
            }
        });
        tracing::trace!(%platform, generation, delay_ms = delay.as_millis(), "deadline armed");
        Self { generation, task }
    }

    /// Returns the generation this timer was armed for.
    pub(super) const fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancels the deadline.
    pub(super) fn cancel(self) {
        tracing::trace!(generation = self.generation, "deadline cancelled");
        drop(self);
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
