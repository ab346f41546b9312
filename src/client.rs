use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, StripError};

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Body of `POST /prompt`.
#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a Value,
}

/// Minimal async client for the ComfyUI HTTP API.
///
/// Only prompt submission is needed by a checkpoint sweep. Responses are
/// judged by status code alone.
///
/// # Example
/// ```no_run
/// use checkpoint_strip::ComfyClient;
///
/// # async fn example() -> checkpoint_strip::Result<()> {
/// let client = ComfyClient::new("http://127.0.0.1:8188");
/// let status = client.queue_prompt(&serde_json::json!({})).await?;
/// assert!((200..300).contains(&status));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ComfyClient {
    http: Client,
    endpoint: String,
    prompt_timeout: Duration,
}

impl ComfyClient {
    /// Create a new client pointing at the given ComfyUI endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            prompt_timeout: Duration::from_secs(30),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Per-request timeout for `/prompt`.
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full URL prompts are posted to.
    pub fn prompt_url(&self) -> String {
        format!("{}/prompt", self.endpoint)
    }

    // ── Prompt ──────────────────────────────────────────────────────

    /// Queue a workflow for execution. Returns the HTTP status on 2xx.
    ///
    /// The response body is not inspected on success. On any other status
    /// the body text is carried in [`StripError::Http`] for logging.
    pub async fn queue_prompt(&self, workflow: &Value) -> Result<u16> {
        let body = PromptRequest { prompt: workflow };

        let resp = self
            .http
            .post(self.prompt_url())
            .timeout(self.prompt_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(StripError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(status.as_u16())
    }

    fn connect_error(&self, source: reqwest::Error) -> StripError {
        StripError::Network {
            context: format!(
                "Cannot connect to ComfyUI at {}, is the service running?",
                self.endpoint
            ),
            source,
        }
    }
}
