use thiserror::Error;

use crate::toolkit::ToolkitError;

#[derive(Debug, Error)]
pub enum VibeflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid JSON format: {0}")]
    InvalidDocument(serde_json::Error),

    #[error("Toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why a render job stopped. The `Display` text is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RenderError {
    /// Submit call failed or came back without a job id. Never retried.
    #[error("Error: {0}")]
    Submission(String),

    /// A status query itself failed. Handled exactly like a server failure.
    #[error("Error checking status: {0}")]
    PollTransport(String),

    /// The toolkit reported `status: "failed"`.
    #[error("Rendering failed: {0}")]
    ServerReported(String),

    /// Local patience limit, not a render failure.
    #[error("Rendering timed out. Please try again.")]
    TimeoutExceeded { attempts: u32 },

    /// Internal only: a response arrived for a generation that was
    /// already invalidated.
    #[error("stale result discarded (generation {stale}, current {current})")]
    StaleResultDiscarded { stale: u64, current: u64 },
}
