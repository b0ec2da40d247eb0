//! Generation client: one outbound call to the model endpoint.
//!
//! The client never interprets the returned text and never retries. Every
//! failure (timeout, connection, HTTP status, unreadable envelope) is a
//! [`AgencyPulseError::Transport`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use agencypulse_shared::{AgencyPulseError, ModelConfig, Result};

use crate::prompt::GenerationRequest;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw model text plus call latency.
#[derive(Debug, Clone, PartialEq)]
pub struct RawText {
    pub text: String,
    pub latency_ms: u64,
}

/// Sends a rendered request to a generative model.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn invoke(&self, request: &GenerationRequest) -> Result<RawText>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: &'a str,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    candidate_text: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

fn map_http_error(error: reqwest::Error) -> AgencyPulseError {
    if error.is_timeout() {
        AgencyPulseError::Transport(format!("request timeout: {error}"))
    } else if error.is_connect() {
        AgencyPulseError::Transport(format!("connection error: {error}"))
    } else {
        AgencyPulseError::Transport(format!("HTTP error: {error}"))
    }
}

/// HTTP implementation of [`GenerationClient`].
pub struct HttpGenerationClient {
    client: Client,
    endpoint: String,
    model: Option<String>,
    api_key: String,
}

impl HttpGenerationClient {
    /// Build a client with a hard per-call `timeout`.
    pub fn new(config: &ModelConfig, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| AgencyPulseError::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    #[instrument(skip_all, fields(task = %request.task, prompt_chars = request.prompt.len()))]
    async fn invoke(&self, request: &GenerationRequest) -> Result<RawText> {
        let envelope = Envelope {
            model: self.model.as_deref(),
            prompt: &request.prompt,
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&envelope)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorReply>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(AgencyPulseError::Transport(format!(
                "model endpoint returned {status}: {message}"
            )));
        }

        let reply: Reply = response
            .json()
            .await
            .map_err(|e| AgencyPulseError::Transport(format!("unreadable model response: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(latency_ms, chars = reply.candidate_text.len(), "model call completed");

        Ok(RawText {
            text: reply.candidate_text,
            latency_ms,
        })
    }
}
