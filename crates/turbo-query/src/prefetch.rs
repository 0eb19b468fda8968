//! Debounced prefetch timers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Registry of pending delayed prefetches, one per prefetch id.
///
/// Scheduling an id again replaces its pending timer. Dropping the scheduler
/// cancels everything still pending.
#[derive(Debug, Default)]
pub struct PrefetchScheduler {
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PrefetchScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    fn pending_mut(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` after `delay` unless `id` is scheduled or cancelled first.
    pub fn schedule<F>(&self, id: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        let mut pending = self.pending_mut();
        pending.retain(|_, h| !h.is_finished());
        if let Some(previous) = pending.insert(id.clone(), handle) {
            previous.abort();
            debug!(prefetch_id = %id, "prefetch rescheduled");
        }
    }

    /// Cancel the pending prefetch for `id`. Returns whether one was pending.
    pub fn cancel(&self, id: &str) -> bool {
        match self.pending_mut().remove(id) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Cancel every pending prefetch.
    pub fn cancel_all(&self) {
        let mut pending = self.pending_mut();
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }

    /// Number of prefetches still waiting or running.
    pub fn pending(&self) -> usize {
        self.pending_mut()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
