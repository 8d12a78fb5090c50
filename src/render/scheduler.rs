use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio::time::Interval;
use tracing::{debug, warn};

use super::job::{Generation, PollPolicy};
use super::machine::RenderEvent;
use super::notice::RenderNotifier;
use super::session::SessionState;
use crate::error::RenderError;
use crate::toolkit::RenderBackend;

/// Owner's side of a running poll loop. Stopping it, or dropping it,
/// prevents any further tick.
#[derive(Debug)]
pub struct PollHandle {
    generation: Generation,
    job_id: String,
    stop: watch::Sender<bool>,
}

impl PollHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stop(self) {
        // The loop may already have exited on its own.
        let _ = self.stop.send(true);
    }
}

/// Keeps the session's live poller count accurate for the lifetime of a loop.
struct PollerGuard<N: RenderNotifier> {
    state: Arc<SessionState<N>>,
}

impl<N: RenderNotifier> PollerGuard<N> {
    fn new(state: Arc<SessionState<N>>) -> Self {
        state.live_pollers.fetch_add(1, Ordering::SeqCst);
        Self { state }
    }
}

impl<N: RenderNotifier> Drop for PollerGuard<N> {
    fn drop(&mut self) {
        self.state.live_pollers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns the interval-driven status loop for one job.
pub struct PollScheduler;

impl PollScheduler {
    /// Start polling `job_id` on behalf of `generation`.
    ///
    /// Exactly one status query is outstanding at a time: the loop awaits
    /// each response before it waits on the timer again, and a tick that
    /// comes due meanwhile is delayed rather than queued.
    pub(crate) fn spawn<B, N>(
        state: Arc<SessionState<N>>,
        backend: Arc<B>,
        job_id: String,
        generation: Generation,
        policy: &PollPolicy,
    ) -> PollHandle
    where
        B: RenderBackend,
        N: RenderNotifier,
    {
        let (stop, stop_rx) = watch::channel(false);
        let guard = PollerGuard::new(Arc::clone(&state));
        let ticker = policy.ticker();

        debug!(
            %job_id,
            generation = generation.value(),
            interval_ms = policy.interval.as_millis() as u64,
            max_attempts = policy.max_attempts,
            "starting poll loop"
        );
        tokio::spawn(run(
            state,
            backend,
            job_id.clone(),
            generation,
            ticker,
            stop_rx,
            guard,
        ));

        PollHandle {
            generation,
            job_id,
            stop,
        }
    }
}

async fn run<B, N>(
    state: Arc<SessionState<N>>,
    backend: Arc<B>,
    job_id: String,
    generation: Generation,
    mut ticker: Interval,
    mut stop: watch::Receiver<bool>,
    _guard: PollerGuard<N>,
) where
    B: RenderBackend,
    N: RenderNotifier,
{
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => {
                debug!(%job_id, generation = generation.value(), "poll loop cancelled");
                break;
            }
            _ = ticker.tick() => {}
        }

        match state.apply(generation, RenderEvent::Tick) {
            Some(t) if !t.ends_polling() => {}
            _ => break,
        }

        debug!(%job_id, "querying job status");
        let event = match backend.job_status(&job_id).await {
            Ok(report) => RenderEvent::StatusReported(report),
            Err(err) => {
                warn!(%job_id, error = %err, "status query failed");
                RenderEvent::PollFailed(RenderError::PollTransport(err.to_string()))
            }
        };

        match state.apply(generation, event) {
            Some(t) if !t.ends_polling() => {}
            _ => break,
        }
    }
}
