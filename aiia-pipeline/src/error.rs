//! Error types for the pipeline crate
//!
//! Only configuration problems are raised to the caller, at construction
//! time. Per-image and per-stage failures are absorbed by the stages and
//! surface as counts in the ProcessingResult.

use thiserror::Error;

/// Construction-time configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Quality threshold outside (0, 1]
    #[error("Quality threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    /// Persona key not present in the persona table
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    /// Taxonomy name not recognized
    #[error("Unknown taxonomy: {0}")]
    UnknownTaxonomy(String),

    /// Backend priority list is empty
    #[error("At least one analysis backend must be configured")]
    NoBackends,

    /// A configured backend needs an API key that was not supplied
    #[error("{backend} backend requires an API key. Set AIIA_GEMINI_API_KEY or GOOGLE_API_KEY, or add api_key under [gemini] in config.toml")]
    MissingApiKey { backend: String },

    /// Embedded metadata mode requested but the metadata tool cannot run
    #[error("Metadata tool unavailable: {0}")]
    MetadataToolUnavailable(String),

    /// Any other out-of-range value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Config file could not be read or parsed
    #[error(transparent)]
    Load(#[from] aiia_common::Error),
}

/// Errors from pipeline entry points that are not per-image
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::Report(e.to_string())
    }
}
