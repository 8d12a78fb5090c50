use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::machine::RenderState;
use crate::error::RenderError;

/// Progress never goes past this while a job is still polling.
pub const PROGRESS_CEILING: f64 = 95.0;

pub const IDLE_MESSAGE: &str = "Ready to render";

/// When the first status check happens relative to entering `Polling`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstPoll {
    /// Tick right away, then once per interval.
    #[default]
    Immediate,
    /// Wait one full interval before the first tick.
    AfterInterval,
}

/// Timing and patience limits for the poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Ticks allowed before the job is forced into `TimedOut`.
    pub max_attempts: u32,
    pub first_poll: FirstPoll,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 20,
            first_poll: FirstPoll::Immediate,
        }
    }
}

impl PollPolicy {
    /// How much the progress estimate advances per tick.
    ///
    /// This is a smoothing heuristic so the bar keeps moving. It says
    /// nothing about how far along the render actually is.
    pub fn progress_step(&self) -> f64 {
        PROGRESS_CEILING / f64::from(self.max_attempts.max(1))
    }

    /// Build the repeating timer for one poll loop.
    pub(crate) fn ticker(&self) -> Interval {
        let period = self.interval.max(Duration::from_millis(1));
        let start = match self.first_poll {
            FirstPoll::Immediate => Instant::now(),
            FirstPoll::AfterInterval => Instant::now() + period,
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

/// Token identifying one submission. Results tagged with an older
/// generation are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// The single active render attempt owned by an editing session.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub job_id: Option<String>,
    pub state: RenderState,
    pub attempt_count: u32,
    pub progress_estimate: f64,
    pub result_url: Option<String>,
    /// Set when the job completed but the toolkit gave no output location.
    pub missing_output: bool,
    pub last_message: String,
    pub failure: Option<RenderError>,
    pub generation: Generation,
    pub policy: PollPolicy,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RenderJob {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            job_id: None,
            state: RenderState::Idle,
            attempt_count: 0,
            progress_estimate: 0.0,
            result_url: None,
            missing_output: false,
            last_message: IDLE_MESSAGE.to_string(),
            failure: None,
            generation: Generation::default(),
            policy,
            submitted_at: None,
            finished_at: None,
        }
    }

    /// Clear everything a previous attempt left behind.
    pub(crate) fn reset(&mut self) {
        self.job_id = None;
        self.attempt_count = 0;
        self.progress_estimate = 0.0;
        self.result_url = None;
        self.missing_output = false;
        self.failure = None;
        self.submitted_at = None;
        self.finished_at = None;
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            job_id: self.job_id.clone(),
            state: self.state,
            attempt_count: self.attempt_count,
            progress_estimate: self.progress_estimate,
            result_url: self.result_url.clone(),
            missing_output: self.missing_output,
            last_message: self.last_message.clone(),
            failure: self.failure.clone(),
            generation: self.generation,
            submitted_at: self.submitted_at,
            finished_at: self.finished_at,
        }
    }
}

/// Read-only view of a [`RenderJob`] handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub job_id: Option<String>,
    pub state: RenderState,
    pub attempt_count: u32,
    pub progress_estimate: f64,
    pub result_url: Option<String>,
    pub missing_output: bool,
    pub last_message: String,
    pub failure: Option<RenderError>,
    pub generation: Generation,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RenderSnapshot {
    /// True only for a completed render that has somewhere to fetch the video from.
    pub fn has_usable_output(&self) -> bool {
        self.state == RenderState::Completed && self.result_url.is_some()
    }
}

/// Summary printed once a render settles.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub job_id: Option<String>,
    pub state: RenderState,
    pub attempts: u32,
    pub result_url: Option<String>,
    pub missing_output: bool,
    pub message: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
}

impl RenderReport {
    pub fn from_snapshot(snapshot: &RenderSnapshot) -> Self {
        let finished_at = snapshot.finished_at.unwrap_or_else(Utc::now);
        let duration_ms = snapshot
            .submitted_at
            .map(|start| (finished_at - start).num_milliseconds());

        Self {
            job_id: snapshot.job_id.clone(),
            state: snapshot.state,
            attempts: snapshot.attempt_count,
            result_url: snapshot.result_url.clone(),
            missing_output: snapshot.missing_output,
            message: snapshot.last_message.clone(),
            submitted_at: snapshot.submitted_at,
            finished_at,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = RenderJob::new(PollPolicy::default());
        assert_eq!(job.state, RenderState::Idle);
        assert_eq!(job.attempt_count, 0);
        assert_eq!(job.progress_estimate, 0.0);
        assert!(job.job_id.is_none());
        assert!(job.result_url.is_none());
        assert_eq!(job.last_message, IDLE_MESSAGE);
        assert_eq!(job.policy.max_attempts, 20);
        assert_eq!(job.policy.interval, Duration::from_secs(3));
    }

    #[test]
    fn progress_step_spreads_ceiling_over_attempts() {
        let policy = PollPolicy::default();
        assert!((policy.progress_step() - 4.75).abs() < f64::EPSILON);

        let zero = PollPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(zero.progress_step(), PROGRESS_CEILING);
    }

    #[test]
    fn generation_advances() {
        let g = Generation::default();
        assert_eq!(g.value(), 0);
        assert_eq!(g.next().next().value(), 2);
        assert!(g.next() > g);
    }

    #[test]
    fn report_from_completed_snapshot() {
        let mut job = RenderJob::new(PollPolicy::default());
        let start = Utc::now();
        job.job_id = Some("job-1".into());
        job.state = RenderState::Completed;
        job.attempt_count = 2;
        job.result_url = Some("https://x/out.mp4".into());
        job.submitted_at = Some(start);
        job.finished_at = Some(start + chrono::Duration::milliseconds(6000));

        let snap = job.snapshot();
        assert!(snap.has_usable_output());

        let report = RenderReport::from_snapshot(&snap);
        assert_eq!(report.job_id.as_deref(), Some("job-1"));
        assert_eq!(report.attempts, 2);
        assert_eq!(report.duration_ms, Some(6000));
    }

    #[test]
    fn completed_without_url_is_not_usable() {
        let mut job = RenderJob::new(PollPolicy::default());
        job.state = RenderState::Completed;
        job.missing_output = true;
        assert!(!job.snapshot().has_usable_output());
    }
}
