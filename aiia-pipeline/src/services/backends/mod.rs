//! Vision-language analysis backends
//!
//! Each backend turns `(prompt, image)` into free text that should parse as
//! JSON. Normalization into a Classification happens in the content
//! analyzer, so adding a backend means adding one [`VisionBackend`]
//! implementation and one [`BackendKind`] variant.

pub mod gemini_client;
pub mod ollama_client;

pub use gemini_client::GeminiClient;
pub use ollama_client::OllamaClient;

use crate::config::{BackendKind, PipelineConfig};
use crate::error::ConfigError;
use crate::services::image_prep::PreparedImage;
use async_trait::async_trait;
use thiserror::Error;

/// User agent sent to HTTP backends
pub const USER_AGENT: &str = concat!("aiia/", env!("CARGO_PKG_VERSION"));

/// Backend call errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Backend returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::NetworkError(e.to_string())
        }
    }
}

/// A vision-language model reachable over HTTP or local inference
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Backend family (e.g. `ollama`)
    fn name(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str;

    /// Send prompt and image, return the model's raw text
    async fn generate(&self, prompt: &str, image: &PreparedImage) -> Result<String, BackendError>;
}

/// Build backends in configured priority order
pub fn build_backends(config: &PipelineConfig) -> Result<Vec<Box<dyn VisionBackend>>, ConfigError> {
    config
        .backends
        .iter()
        .map(|kind| -> Result<Box<dyn VisionBackend>, ConfigError> {
            match kind {
                BackendKind::Ollama => Ok(Box::new(OllamaClient::new(config.ollama.clone())?)),
                BackendKind::Gemini => Ok(Box::new(GeminiClient::new(config.gemini.clone())?)),
            }
        })
        .collect()
}
