use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::job::Generation;
use super::notice::RenderNotifier;
use super::scheduler::PollHandle;
use super::session::SessionState;

/// Holds the one poll loop allowed to run and retires it on invalidation.
#[derive(Debug, Default)]
pub struct InvalidationController {
    armed: Mutex<Option<PollHandle>>,
}

impl InvalidationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the current poll loop, reset the job to `Idle` and return the
    /// new generation. Anything still in flight for the old generation
    /// will be discarded when it resolves.
    pub(crate) fn invalidate<N: RenderNotifier>(&self, state: &SessionState<N>) -> Generation {
        let mut slot = self.slot();
        if let Some(handle) = slot.take() {
            debug!(job_id = handle.job_id(), "retiring poll loop");
            handle.stop();
        }
        state.invalidate()
    }

    /// Install a freshly spawned poll loop. Refused, and the loop stopped,
    /// if its generation was already superseded.
    pub(crate) fn arm<N: RenderNotifier>(
        &self,
        state: &SessionState<N>,
        handle: PollHandle,
    ) -> bool {
        let mut slot = self.slot();
        if handle.generation() != state.generation() {
            debug!(job_id = handle.job_id(), "refusing stale poll loop");
            handle.stop();
            return false;
        }
        if let Some(previous) = slot.replace(handle) {
            previous.stop();
        }
        true
    }

    fn slot(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
