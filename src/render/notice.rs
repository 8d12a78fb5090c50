use super::job::RenderJob;
use super::machine::{RenderState, Transition};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-style message emitted on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    /// Build the notice for a transition, or `None` if the job did not
    /// change state. Resetting a job that had already settled is silent.
    pub fn for_transition(transition: &Transition, job: &RenderJob) -> Option<Self> {
        let Transition::Moved { from, to } = *transition else {
            return None;
        };

        let (title, severity) = match to {
            RenderState::Idle if !from.is_active() => return None,
            RenderState::Idle => ("Render Cancelled", Severity::Info),
            RenderState::Submitting => ("Initializing Render...", Severity::Info),
            RenderState::Polling => ("Render Submitted", Severity::Info),
            RenderState::Completed if job.missing_output => {
                ("Render Complete (No URL)", Severity::Warning)
            }
            RenderState::Completed => ("Video Rendered!", Severity::Success),
            RenderState::TimedOut => ("Rendering Timeout", Severity::Error),
            RenderState::Failed => match job.failure {
                Some(RenderError::Submission(_)) => ("Render Initiation Failed", Severity::Error),
                Some(RenderError::PollTransport(_)) => ("Polling Error", Severity::Error),
                _ => ("Rendering Failed", Severity::Error),
            },
        };

        Some(Self {
            title,
            description: job.last_message.clone(),
            severity,
        })
    }
}

/// Fire-and-forget sink for [`Notice`]s. Must not block.
pub trait RenderNotifier: Send + Sync + 'static {
    fn notify(&self, notice: &Notice);
}
