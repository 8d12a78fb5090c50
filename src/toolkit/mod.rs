pub mod client;
pub mod error;
pub mod types;

pub use client::{RenderBackend, ToolkitClient};
pub use error::ToolkitError;
pub use types::{JobPhase, JobStatusResponse};
