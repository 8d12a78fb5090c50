use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use super::controller::InvalidationController;
use super::job::{Generation, PollPolicy, RenderJob, RenderSnapshot};
use super::machine::{RenderEvent, RenderMachine, RenderState, Transition};
use super::notice::{Notice, RenderNotifier};
use super::scheduler::PollScheduler;
use crate::error::RenderError;
use crate::toolkit::RenderBackend;

/// State shared between a session and its poll loop.
///
/// All writes to the job go through [`SessionState::apply`] or
/// [`SessionState::invalidate`], both of which check the generation
/// under the same lock that guards the job.
pub(crate) struct SessionState<N> {
    job: Mutex<RenderJob>,
    snapshots: watch::Sender<RenderSnapshot>,
    notifier: N,
    pub(crate) live_pollers: AtomicUsize,
}

impl<N: RenderNotifier> SessionState<N> {
    fn new(policy: PollPolicy, notifier: N) -> Self {
        let job = RenderJob::new(policy);
        let (snapshots, _) = watch::channel(job.snapshot());
        Self {
            job: Mutex::new(job),
            snapshots,
            notifier,
            live_pollers: AtomicUsize::new(0),
        }
    }

    /// Apply `event` if `generation` is still current. Returns `None` when
    /// the event was stale and has been dropped.
    pub(crate) fn apply(&self, generation: Generation, event: RenderEvent) -> Option<Transition> {
        let (transition, notice) = {
            let mut job = self.lock();
            if job.generation != generation {
                let discarded = RenderError::StaleResultDiscarded {
                    stale: generation.value(),
                    current: job.generation.value(),
                };
                debug!(reason = %discarded, ?event, "dropping stale event");
                return None;
            }

            let transition = RenderMachine::apply(&mut job, event);
            self.record(&job, &transition);
            let notice = Notice::for_transition(&transition, &job);
            (transition, notice)
        };

        if let Some(notice) = notice {
            self.notifier.notify(&notice);
        }
        Some(transition)
    }

    /// Bump the generation and reset the job to `Idle`.
    pub(crate) fn invalidate(&self) -> Generation {
        let (generation, notice) = {
            let mut job = self.lock();
            job.generation = job.generation.next();
            let transition = RenderMachine::apply(&mut job, RenderEvent::Invalidate);
            self.record(&job, &transition);
            (job.generation, Notice::for_transition(&transition, &job))
        };

        if let Some(notice) = notice {
            self.notifier.notify(&notice);
        }
        generation
    }

    pub(crate) fn generation(&self) -> Generation {
        self.lock().generation
    }

    fn snapshot(&self) -> RenderSnapshot {
        self.lock().snapshot()
    }

    fn record(&self, job: &RenderJob, transition: &Transition) {
        if let Transition::Moved { from, to } = transition {
            info!(
                job_id = job.job_id.as_deref().unwrap_or("-"),
                %from,
                %to,
                message = %job.last_message,
                "render state changed"
            );
        }
        if !matches!(transition, Transition::Ignored { .. }) {
            self.snapshots.send_replace(job.snapshot());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RenderJob> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One editing session's render lifecycle.
///
/// `start_render`, `cancel` and `document_edited` are the only entry
/// points that mutate the job; everything else reads snapshots.
pub struct RenderSession<B, N> {
    state: Arc<SessionState<N>>,
    backend: Arc<B>,
    controller: InvalidationController,
    policy: PollPolicy,
}

impl<B, N> RenderSession<B, N>
where
    B: RenderBackend,
    N: RenderNotifier,
{
    pub fn new(backend: B, notifier: N, policy: PollPolicy) -> Self {
        Self {
            state: Arc::new(SessionState::new(policy.clone(), notifier)),
            backend: Arc::new(backend),
            controller: InvalidationController::new(),
            policy,
        }
    }

    /// Retire whatever is running, submit `document`, and start polling
    /// once a job id comes back.
    ///
    /// The document is expected to be valid JSON already; parsing is the
    /// caller's concern.
    pub async fn start_render(&self, document: &Value) -> RenderSnapshot {
        let generation = self.controller.invalidate(&self.state);
        self.state.apply(generation, RenderEvent::Submit);
        info!(generation = generation.value(), "submitting composition");

        let event = match self.backend.submit_composition(document).await {
            Ok(job_id) => RenderEvent::Submitted { job_id },
            Err(err) => RenderEvent::SubmitFailed(RenderError::Submission(err.to_string())),
        };
        let job_id = match &event {
            RenderEvent::Submitted { job_id } => Some(job_id.clone()),
            _ => None,
        };

        let transition = self.state.apply(generation, event);
        if let (Some(Transition::Moved { to: RenderState::Polling, .. }), Some(job_id)) =
            (transition, job_id)
        {
            let handle = PollScheduler::spawn(
                Arc::clone(&self.state),
                Arc::clone(&self.backend),
                job_id,
                generation,
                &self.policy,
            );
            self.controller.arm(&self.state, handle);
        }

        self.snapshot()
    }

    /// Stop polling and return to `Idle`.
    pub fn cancel(&self) -> RenderSnapshot {
        self.controller.invalidate(&self.state);
        info!("render cancelled");
        self.snapshot()
    }

    /// The source document changed; any result for the old document is void.
    pub fn document_edited(&self) -> RenderSnapshot {
        self.controller.invalidate(&self.state);
        debug!("document edited, render state reset");
        self.snapshot()
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.state.snapshot()
    }

    /// Observe every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<RenderSnapshot> {
        self.state.snapshots.subscribe()
    }

    /// Wait until the job leaves `Submitting`/`Polling`.
    pub async fn wait_for_outcome(&self) -> RenderSnapshot {
        let mut rx = self.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if !snapshot.state.is_active() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// Poll loops currently alive. Never more than one once retired loops
    /// have observed their stop signal.
    #[cfg(test)]
    pub fn live_pollers(&self) -> usize {
        self.state
            .live_pollers
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}
