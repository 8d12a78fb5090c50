use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use super::error::ToolkitError;
use super::types::{ComposeResponse, JobStatusResponse};

/// The two capabilities the render core needs from the outside world.
///
/// [`ToolkitClient`] is the real implementation; tests substitute
/// scripted backends.
pub trait RenderBackend: Send + Sync + 'static {
    /// Submit a composition and return the opaque job id.
    fn submit_composition(
        &self,
        document: &Value,
    ) -> impl Future<Output = Result<String, ToolkitError>> + Send;

    /// Query the current status of a previously submitted job.
    fn job_status(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<JobStatusResponse, ToolkitError>> + Send;
}

pub struct ToolkitClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl ToolkitClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ToolkitError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn compose(&self, document: &Value) -> Result<String, ToolkitError> {
        let url = format!("{}/v1/ffmpeg/compose", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(document)
            .send()
            .await?;
        let body: ComposeResponse = Self::check(response).await?.json().await?;
        body.usable_job_id().ok_or(ToolkitError::MissingJobId)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatusResponse, ToolkitError> {
        let url = format!("{}/v1/toolkit/job/status/{job_id}", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let body = Self::check(response).await?.json().await?;
        Ok(body)
    }

    /// One-shot media conversion. The toolkit's reply is returned as-is.
    pub async fn convert(&self, payload: &Value) -> Result<Value, ToolkitError> {
        let url = format!("{}/v1/media/convert", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(payload)
            .send()
            .await?;
        let body = Self::check(response).await?.json().await?;
        Ok(body)
    }

    /// Connectivity probe against `/v1/toolkit/test`.
    pub async fn test_connection(&self) -> Result<Value, ToolkitError> {
        let url = format!("{}/v1/toolkit/test", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let body = Self::check(response).await?.json().await?;
        Ok(body)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("content-type", "application/json");
        if self.api_key.is_empty() {
            req
        } else {
            req.header("x-api-key", &self.api_key)
        }
    }

    async fn check(response: Response) -> Result<Response, ToolkitError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "toolkit returned an error status");
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body
        };
        Err(ToolkitError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl RenderBackend for ToolkitClient {
    async fn submit_composition(&self, document: &Value) -> Result<String, ToolkitError> {
        self.compose(document).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ToolkitError> {
        self.status(job_id).await
    }
}
