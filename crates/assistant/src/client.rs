//! Client for the model server's `/api/generate` endpoint.

use std::time::Duration;

use feza_config::AssistantConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{AssistantError, AssistantResult};

#[derive(Debug, Clone, Copy, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Clone)]
pub struct ModelClient {
    http: Client,
    endpoint: String,
    model: String,
    options: GenerateOptions,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ModelClient {
    pub fn new(config: &AssistantConfig) -> AssistantResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            options: GenerateOptions {
                num_predict: config.num_predict,
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
            },
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a prompt, retrying failed attempts after a fixed delay.
    ///
    /// Transport errors, non-success statuses and unreadable bodies all
    /// count as failed attempts.
    pub async fn generate(&self, prompt: &str) -> AssistantResult<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.attempt(prompt).await {
                Ok(text) => {
                    debug!(attempt, model = %self.model, "model answered");
                    return Ok(text);
                }
                Err(error) => {
                    warn!(attempt, max_attempts = self.max_attempts, %error, "model request failed");
                    last_error = error.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(AssistantError::Unavailable {
            attempts: self.max_attempts,
            last: last_error,
        })
    }

    async fn attempt(&self, prompt: &str) -> AssistantResult<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: self.options,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::Upstream {
                status: status.as_u16(),
            });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}
