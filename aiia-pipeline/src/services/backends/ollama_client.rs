//! Ollama local vision model client
//!
//! `POST {url}/api/generate` with a base64 image and `stream: false`.
//! Hardware hints from config (`num_gpu`, `num_thread`, ...) are passed
//! through in `options` untouched.

use super::{BackendError, VisionBackend, USER_AGENT};
use crate::config::OllamaConfig;
use crate::error::ConfigError;
use crate::services::image_prep::PreparedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    options: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaClient {
    http_client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("Ollama HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.url.trim_end_matches('/'))
    }

    fn options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("temperature".to_string(), Value::from(self.config.temperature));
        options.insert("top_p".to_string(), Value::from(self.config.top_p));
        for (key, value) in &self.config.options {
            options.insert(key.clone(), value.clone());
        }
        options
    }
}

#[async_trait]
impl VisionBackend for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str, image: &PreparedImage) -> Result<String, BackendError> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            images: vec![image.to_base64()],
            stream: false,
            options: self.options(),
        };

        tracing::debug!(model = %self.config.model, url = %self.config.url, "Querying Ollama");

        let response = self.http_client.post(self.endpoint()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError(status.as_u16(), error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        if body.response.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(body.response)
    }
}
