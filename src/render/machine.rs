use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::job::{IDLE_MESSAGE, PROGRESS_CEILING, RenderJob};
use crate::error::RenderError;
use crate::toolkit::{JobPhase, JobStatusResponse};

/// The six states a render job moves through.
///
/// Idle → Submitting → Polling → Completed | Failed | TimedOut, with
/// invalidation returning any state to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderState {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

impl RenderState {
    /// No further polling happens from these without a new submission.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RenderState::Completed | RenderState::Failed | RenderState::TimedOut
        )
    }

    /// A submission or poll loop owns the job.
    pub fn is_active(self) -> bool {
        matches!(self, RenderState::Submitting | RenderState::Polling)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Idle => write!(f, "IDLE"),
            RenderState::Submitting => write!(f, "SUBMITTING"),
            RenderState::Polling => write!(f, "POLLING"),
            RenderState::Completed => write!(f, "COMPLETED"),
            RenderState::Failed => write!(f, "FAILED"),
            RenderState::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// The user asked for a render.
    Submit,
    /// The submit capability returned a job id.
    Submitted { job_id: String },
    /// The submit capability failed. Carries a [`RenderError::Submission`].
    SubmitFailed(RenderError),
    /// The poll timer fired.
    Tick,
    /// A status query came back.
    StatusReported(JobStatusResponse),
    /// A status query itself failed. Carries a [`RenderError::PollTransport`].
    PollFailed(RenderError),
    /// Document edit, cancel, or a fresh submission.
    Invalidate,
}

impl RenderEvent {
    fn name(&self) -> &'static str {
        match self {
            RenderEvent::Submit => "submit",
            RenderEvent::Submitted { .. } => "submitted",
            RenderEvent::SubmitFailed(_) => "submit_failed",
            RenderEvent::Tick => "tick",
            RenderEvent::StatusReported(_) => "status_reported",
            RenderEvent::PollFailed(_) => "poll_failed",
            RenderEvent::Invalidate => "invalidate",
        }
    }
}

/// What applying an event did to the job.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The job changed state.
    Moved { from: RenderState, to: RenderState },
    /// Same state, but message or progress may have changed.
    Stayed(RenderState),
    /// The event does not apply in the current state; nothing changed.
    Ignored {
        state: RenderState,
        event: &'static str,
    },
}

impl Transition {
    /// The state the job is in after this transition.
    pub fn state(&self) -> RenderState {
        match self {
            Transition::Moved { to, .. } => *to,
            Transition::Stayed(state) | Transition::Ignored { state, .. } => *state,
        }
    }

    /// The poll loop that produced this transition has nothing more to do.
    pub fn ends_polling(&self) -> bool {
        self.state() != RenderState::Polling
    }
}

/// Applies [`RenderEvent`]s to a [`RenderJob`].
pub struct RenderMachine;

impl RenderMachine {
    /// Apply an event and return the resulting transition.
    ///
    /// Terminal states ignore everything except `Submit` and `Invalidate`,
    /// so a late tick can never rewrite `result_url` or `last_message`.
    pub fn apply(job: &mut RenderJob, event: RenderEvent) -> Transition {
        let from = job.state;
        let name = event.name();

        match (from, event) {
            (_, RenderEvent::Invalidate) => {
                job.reset();
                job.state = RenderState::Idle;
                job.last_message = IDLE_MESSAGE.to_string();
                Self::moved_or_stayed(from, RenderState::Idle)
            }
            (state, RenderEvent::Submit) if state == RenderState::Idle || state.is_terminal() => {
                job.reset();
                job.state = RenderState::Submitting;
                job.submitted_at = Some(Utc::now());
                job.last_message = "Sending video definition to renderer...".to_string();
                Self::moved_or_stayed(from, RenderState::Submitting)
            }
            (RenderState::Submitting, RenderEvent::Submitted { job_id }) => {
                job.job_id = Some(job_id);
                job.state = RenderState::Polling;
                job.attempt_count = 0;
                job.progress_estimate = 0.0;
                job.last_message = "Video sent to renderer. Waiting for progress...".to_string();
                Self::moved_or_stayed(from, RenderState::Polling)
            }
            (RenderState::Submitting, RenderEvent::SubmitFailed(err)) => {
                Self::fail(job, RenderState::Failed, err)
            }
            (RenderState::Polling, RenderEvent::Tick) => {
                job.attempt_count += 1;
                if job.attempt_count > job.policy.max_attempts {
                    let attempts = job.attempt_count;
                    Self::fail(
                        job,
                        RenderState::TimedOut,
                        RenderError::TimeoutExceeded { attempts },
                    )
                } else {
                    let step = job.policy.progress_step();
                    job.progress_estimate = (job.progress_estimate + step).min(PROGRESS_CEILING);
                    Transition::Stayed(RenderState::Polling)
                }
            }
            (RenderState::Polling, RenderEvent::StatusReported(report)) => {
                Self::apply_status(job, report)
            }
            (RenderState::Polling, RenderEvent::PollFailed(err)) => {
                Self::fail(job, RenderState::Failed, err)
            }
            (state, _) => Transition::Ignored { state, event: name },
        }
    }

    fn apply_status(job: &mut RenderJob, report: JobStatusResponse) -> Transition {
        match report.phase() {
            JobPhase::Completed => {
                job.state = RenderState::Completed;
                job.progress_estimate = 100.0;
                job.finished_at = Some(Utc::now());
                job.missing_output = report.output_url.is_none();
                job.last_message = if job.missing_output {
                    "Render complete, but no video URL was provided by the API.".to_string()
                } else {
                    "Video rendering complete!".to_string()
                };
                job.result_url = report.output_url;
                Transition::Moved {
                    from: RenderState::Polling,
                    to: RenderState::Completed,
                }
            }
            JobPhase::Failed => {
                let detail = report
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string());
                Self::fail(job, RenderState::Failed, RenderError::ServerReported(detail))
            }
            JobPhase::Processing => {
                job.last_message = format!("Status: {}", report.status_label());
                Transition::Stayed(RenderState::Polling)
            }
        }
    }

    fn fail(job: &mut RenderJob, to: RenderState, err: RenderError) -> Transition {
        let from = job.state;
        job.state = to;
        job.progress_estimate = 0.0;
        job.result_url = None;
        job.missing_output = false;
        job.finished_at = Some(Utc::now());
        job.last_message = err.to_string();
        job.failure = Some(err);
        Self::moved_or_stayed(from, to)
    }

    fn moved_or_stayed(from: RenderState, to: RenderState) -> Transition {
        if from == to {
            Transition::Stayed(to)
        } else {
            Transition::Moved { from, to }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::job::PollPolicy;

    fn make_job(max_attempts: u32) -> RenderJob {
        RenderJob::new(PollPolicy {
            max_attempts,
            ..Default::default()
        })
    }

    fn polling_job(max_attempts: u32) -> RenderJob {
        let mut job = make_job(max_attempts);
        RenderMachine::apply(&mut job, RenderEvent::Submit);
        RenderMachine::apply(
            &mut job,
            RenderEvent::Submitted {
                job_id: "job-1".into(),
            },
        );
        job
    }

    #[test]
    fn happy_path_walks_all_states() {
        let mut job = make_job(20);

        let t = RenderMachine::apply(&mut job, RenderEvent::Submit);
        assert_eq!(
            t,
            Transition::Moved {
                from: RenderState::Idle,
                to: RenderState::Submitting
            }
        );
        assert!(job.submitted_at.is_some());

        let t = RenderMachine::apply(
            &mut job,
            RenderEvent::Submitted {
                job_id: "job-1".into(),
            },
        );
        assert_eq!(t.state(), RenderState::Polling);
        assert_eq!(job.job_id.as_deref(), Some("job-1"));

        assert_eq!(
            RenderMachine::apply(&mut job, RenderEvent::Tick),
            Transition::Stayed(RenderState::Polling)
        );
        let t = RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::processing()),
        );
        assert_eq!(t, Transition::Stayed(RenderState::Polling));
        assert_eq!(job.last_message, "Status: processing");

        RenderMachine::apply(&mut job, RenderEvent::Tick);
        let t = RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::completed(Some("https://x/out.mp4"))),
        );
        assert_eq!(
            t,
            Transition::Moved {
                from: RenderState::Polling,
                to: RenderState::Completed
            }
        );
        assert_eq!(job.result_url.as_deref(), Some("https://x/out.mp4"));
        assert_eq!(job.progress_estimate, 100.0);
        assert_eq!(job.attempt_count, 2);
        assert!(!job.missing_output);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn submit_failure_goes_straight_to_failed() {
        let mut job = make_job(20);
        RenderMachine::apply(&mut job, RenderEvent::Submit);

        let t = RenderMachine::apply(
            &mut job,
            RenderEvent::SubmitFailed(RenderError::Submission("connection refused".into())),
        );
        assert_eq!(
            t,
            Transition::Moved {
                from: RenderState::Submitting,
                to: RenderState::Failed
            }
        );
        assert_eq!(job.last_message, "Error: connection refused");
        assert!(job.job_id.is_none());
        assert_eq!(job.attempt_count, 0);
    }

    #[test]
    fn server_failure_uses_server_message_or_generic() {
        let mut job = polling_job(20);
        RenderMachine::apply(&mut job, RenderEvent::Tick);
        RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::failed(Some("codec missing"))),
        );
        assert_eq!(job.state, RenderState::Failed);
        assert_eq!(job.last_message, "Rendering failed: codec missing");
        assert_eq!(job.progress_estimate, 0.0);

        let mut job = polling_job(20);
        RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::failed(None)),
        );
        assert_eq!(job.last_message, "Rendering failed: Unknown error");
        assert_eq!(
            job.failure,
            Some(RenderError::ServerReported("Unknown error".into()))
        );
    }

    #[test]
    fn poll_transport_error_fails_the_job() {
        let mut job = polling_job(20);
        RenderMachine::apply(&mut job, RenderEvent::Tick);
        let t = RenderMachine::apply(
            &mut job,
            RenderEvent::PollFailed(RenderError::PollTransport("timeout".into())),
        );
        assert_eq!(t.state(), RenderState::Failed);
        assert_eq!(job.last_message, "Error checking status: timeout");
    }

    #[test]
    fn exceeding_attempts_times_out() {
        let mut job = polling_job(3);
        for _ in 0..3 {
            assert_eq!(
                RenderMachine::apply(&mut job, RenderEvent::Tick),
                Transition::Stayed(RenderState::Polling)
            );
        }
        let t = RenderMachine::apply(&mut job, RenderEvent::Tick);
        assert_eq!(
            t,
            Transition::Moved {
                from: RenderState::Polling,
                to: RenderState::TimedOut
            }
        );
        assert!(job.last_message.contains("timed out"));
        assert_eq!(job.progress_estimate, 0.0);
        assert_eq!(
            job.failure,
            Some(RenderError::TimeoutExceeded { attempts: 4 })
        );
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut job = polling_job(20);
        let mut last = job.progress_estimate;
        for _ in 0..20 {
            RenderMachine::apply(&mut job, RenderEvent::Tick);
            RenderMachine::apply(
                &mut job,
                RenderEvent::StatusReported(JobStatusResponse::processing()),
            );
            assert!(job.progress_estimate >= last);
            assert!(job.progress_estimate <= PROGRESS_CEILING);
            last = job.progress_estimate;
        }
        assert!((last - PROGRESS_CEILING).abs() < 1e-9);
    }

    #[test]
    fn completed_without_output_url_is_flagged() {
        let mut job = polling_job(20);
        RenderMachine::apply(&mut job, RenderEvent::Tick);
        let t = RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::completed(None)),
        );
        assert_eq!(t.state(), RenderState::Completed);
        assert!(job.result_url.is_none());
        assert!(job.missing_output);
        assert!(job.last_message.contains("no video URL"));
    }

    #[test]
    fn terminal_states_ignore_late_events() {
        let mut job = polling_job(20);
        RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::completed(Some("https://x/out.mp4"))),
        );
        let message = job.last_message.clone();

        for event in [
            RenderEvent::Tick,
            RenderEvent::StatusReported(JobStatusResponse::failed(Some("late"))),
            RenderEvent::PollFailed(RenderError::PollTransport("late".into())),
            RenderEvent::Submitted {
                job_id: "job-2".into(),
            },
        ] {
            let t = RenderMachine::apply(&mut job, event);
            assert!(matches!(t, Transition::Ignored { .. }));
        }
        assert_eq!(job.state, RenderState::Completed);
        assert_eq!(job.result_url.as_deref(), Some("https://x/out.mp4"));
        assert_eq!(job.last_message, message);
    }

    #[test]
    fn failure_clears_previous_result() {
        let mut job = polling_job(20);
        job.result_url = Some("https://x/old.mp4".into());
        job.progress_estimate = 40.0;
        RenderMachine::apply(
            &mut job,
            RenderEvent::PollFailed(RenderError::PollTransport("boom".into())),
        );
        assert!(job.result_url.is_none());
        assert_eq!(job.progress_estimate, 0.0);
    }

    #[test]
    fn invalidate_resets_from_any_state() {
        let mut job = polling_job(20);
        for _ in 0..5 {
            RenderMachine::apply(&mut job, RenderEvent::Tick);
        }
        let t = RenderMachine::apply(&mut job, RenderEvent::Invalidate);
        assert_eq!(
            t,
            Transition::Moved {
                from: RenderState::Polling,
                to: RenderState::Idle
            }
        );
        assert_eq!(job.attempt_count, 0);
        assert_eq!(job.progress_estimate, 0.0);
        assert!(job.job_id.is_none());
        assert_eq!(job.last_message, IDLE_MESSAGE);

        let t = RenderMachine::apply(&mut job, RenderEvent::Invalidate);
        assert_eq!(t, Transition::Stayed(RenderState::Idle));
    }

    #[test]
    fn resubmit_from_terminal_state_starts_fresh() {
        let mut job = polling_job(20);
        RenderMachine::apply(
            &mut job,
            RenderEvent::StatusReported(JobStatusResponse::completed(Some("https://x/out.mp4"))),
        );
        let t = RenderMachine::apply(&mut job, RenderEvent::Submit);
        assert_eq!(t.state(), RenderState::Submitting);
        assert!(job.result_url.is_none());
        assert!(job.job_id.is_none());
    }

    #[test]
    fn events_out_of_order_are_ignored() {
        let mut job = make_job(20);
        assert!(matches!(
            RenderMachine::apply(&mut job, RenderEvent::Tick),
            Transition::Ignored { event: "tick", .. }
        ));
        RenderMachine::apply(&mut job, RenderEvent::Submit);
        assert!(matches!(
            RenderMachine::apply(&mut job, RenderEvent::Submit),
            Transition::Ignored {
                state: RenderState::Submitting,
                ..
            }
        ));
    }

    #[test]
    fn state_display() {
        assert_eq!(RenderState::Idle.to_string(), "IDLE");
        assert_eq!(RenderState::TimedOut.to_string(), "TIMED_OUT");
        assert!(RenderState::TimedOut.is_terminal());
        assert!(RenderState::Polling.is_active());
        assert!(!RenderState::Idle.is_terminal());
    }
}
