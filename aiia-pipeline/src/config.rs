//! Pipeline configuration
//!
//! `PipelineConfig` is resolved once per run (TOML file, then CLI
//! overrides applied by the binary), validated, and then shared read-only
//! with every stage behind an `Arc`.
//!
//! Gemini API key priority: ENV (`AIIA_GEMINI_API_KEY`, `GOOGLE_API_KEY`) → TOML

use crate::error::ConfigError;
use aiia_common::models::ScoreScale;
use aiia_common::taxonomy::{self, PersonaProfile, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Environment variables checked for the Gemini API key, in priority order
pub const GEMINI_KEY_ENV_VARS: [&str; 2] = ["AIIA_GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Analysis backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local vision-language model served by Ollama
    Ollama,
    /// Google Gemini cloud model
    Gemini,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::Gemini => "gemini",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" | "llava" | "local" => Some(BackendKind::Ollama),
            "gemini" | "cloud" => Some(BackendKind::Gemini),
            _ => None,
        }
    }
}

/// Where analysis results are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataMode {
    /// `<basename>.xmp` next to each image
    #[default]
    XmpSidecar,
    /// In-place edits via exiftool
    Embedded,
}

/// Ollama backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub top_p: f64,
    /// Opaque hardware/throughput hints merged into the request `options`
    /// (e.g. `num_gpu`, `num_thread`, `num_batch`)
    pub options: BTreeMap<String, serde_json::Value>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llava:13b".to_string(),
            timeout_secs: 120,
            temperature: 0.3,
            top_p: 0.8,
            options: BTreeMap::new(),
        }
    }
}

/// Gemini backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            temperature: 0.3,
            top_p: 0.8,
            max_output_tokens: 500,
        }
    }
}

/// Run-scoped pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of scored images kept by curation, in (0, 1]
    pub quality_threshold: f64,
    /// IQA metric name (`brisque`, `niqe`, `musiq`, `sharpness`, `heuristic`, ...)
    pub iqa_metric: String,
    /// External IQA command-line scorer
    pub iqa_command: String,
    /// Per-image limit for the external scorer, seconds
    pub iqa_timeout_secs: u64,
    /// Backend priority, first entry tried first
    pub backends: Vec<BackendKind>,
    pub ollama: OllamaConfig,
    pub gemini: GeminiConfig,
    /// Persona key, see `aiia_common::taxonomy::PERSONAS`
    pub persona: String,
    /// Vocabulary name (`photography` or `classic`)
    pub taxonomy: String,
    pub score_scale: ScoreScale,
    pub recursive: bool,
    pub metadata_mode: MetadataMode,
    /// Request and keep a critique for every image
    pub gallery_critique: bool,
    /// With gallery critique off, critiques are kept only at or below this score
    pub critique_threshold: u8,
    /// Longest edge of the image sent to backends
    pub max_image_dimension: u32,
    /// Short edge below which an image is logged as undersized (still analyzed)
    pub min_image_dimension: u32,
    pub jpeg_quality: u8,
    pub exiftool_path: String,
    /// Per-invocation limit for exiftool, seconds
    pub exiftool_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.10,
            iqa_metric: "brisque".to_string(),
            iqa_command: "pyiqa".to_string(),
            iqa_timeout_secs: 120,
            backends: vec![BackendKind::Ollama],
            ollama: OllamaConfig::default(),
            gemini: GeminiConfig::default(),
            persona: taxonomy::DEFAULT_PERSONA.to_string(),
            taxonomy: "photography".to_string(),
            score_scale: ScoreScale::TenPoint,
            recursive: true,
            metadata_mode: MetadataMode::XmpSidecar,
            gallery_critique: false,
            critique_threshold: 5,
            max_image_dimension: 1024,
            min_image_dimension: 200,
            jpeg_quality: 90,
            exiftool_path: "exiftool".to_string(),
            exiftool_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    /// Load from the resolved TOML file (or defaults) and resolve secrets
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config: PipelineConfig = aiia_common::config::load_or_default(
            explicit_path,
            aiia_common::config::CONFIG_ENV_VAR,
        )?;
        config.gemini.api_key = resolve_gemini_api_key(config.gemini.api_key.as_deref());
        Ok(config)
    }

    /// Check every construction-time invariant
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.quality_threshold > 0.0 && self.quality_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.quality_threshold));
        }

        if self.persona_profile().is_none() {
            return Err(ConfigError::UnknownPersona(self.persona.clone()));
        }

        if Taxonomy::by_name(&self.taxonomy).is_none() {
            return Err(ConfigError::UnknownTaxonomy(self.taxonomy.clone()));
        }

        if self.backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        if self.backends.contains(&BackendKind::Gemini)
            && !self.gemini.api_key.as_deref().is_some_and(is_valid_key)
        {
            return Err(ConfigError::MissingApiKey {
                backend: BackendKind::Gemini.name().to_string(),
            });
        }

        if self.critique_threshold == 0 || self.critique_threshold > self.score_scale.max() {
            return Err(ConfigError::InvalidValue(format!(
                "critique_threshold {} outside score scale 1-{}",
                self.critique_threshold,
                self.score_scale.max()
            )));
        }

        if self.max_image_dimension < 64 {
            return Err(ConfigError::InvalidValue(format!(
                "max_image_dimension {} is too small (minimum 64)",
                self.max_image_dimension
            )));
        }

        if self.iqa_timeout_secs == 0 || self.exiftool_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "subprocess timeouts must be at least 1 second".to_string(),
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidValue(format!(
                "jpeg_quality {} outside 1-100",
                self.jpeg_quality
            )));
        }

        Ok(())
    }

    pub fn persona_profile(&self) -> Option<&'static PersonaProfile> {
        taxonomy::find_persona(&self.persona)
    }

    pub fn vocabulary(&self) -> Taxonomy {
        Taxonomy::by_name(&self.taxonomy).unwrap_or_default()
    }

    /// Human-readable backend chain, e.g. `ollama:llava:13b -> gemini:gemini-1.5-flash`
    pub fn ai_model_label(&self) -> String {
        self.backends
            .iter()
            .map(|b| match b {
                BackendKind::Ollama => format!("ollama:{}", self.ollama.model),
                BackendKind::Gemini => format!("gemini:{}", self.gemini.model),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Resolve the Gemini API key, ENV before TOML
pub fn resolve_gemini_api_key(toml_key: Option<&str>) -> Option<String> {
    let env_key = GEMINI_KEY_ENV_VARS.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|k| is_valid_key(k))
            .map(|k| (*name, k))
    });
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    match (env_key, toml_key) {
        (Some((name, key)), toml) => {
            if toml.is_some() {
                warn!(
                    "Gemini API key found in multiple sources: environment ({}), TOML. Using environment (highest priority).",
                    name
                );
            }
            info!("Gemini API key loaded from environment variable {}", name);
            Some(key)
        }
        (None, Some(key)) => {
            info!("Gemini API key loaded from TOML config");
            Some(key.to_string())
        }
        (None, None) => None,
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ai_model_label(), "ollama:llava:13b");
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = PipelineConfig::default();
        config.quality_threshold = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
        config.quality_threshold = 1.0;
        assert!(config.validate().is_ok());
        config.quality_threshold = 1.01;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_unknown_persona_rejected() {
        let config = PipelineConfig {
            persona: "food_blogger".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::UnknownPersona(p)) if p == "food_blogger"));
    }

    #[test]
    fn test_gemini_without_key_rejected() {
        let config = PipelineConfig {
            backends: vec![BackendKind::Ollama, BackendKind::Gemini],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey { .. })));
    }

    #[test]
    fn test_gemini_whitespace_key_rejected() {
        let mut config = PipelineConfig {
            backends: vec![BackendKind::Gemini],
            ..Default::default()
        };
        config.gemini.api_key = Some("   ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey { .. })));
    }

    #[test]
    fn test_empty_backends_rejected() {
        let config = PipelineConfig {
            backends: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoBackends)));
    }

    #[test]
    fn test_critique_threshold_follows_scale() {
        let config = PipelineConfig {
            score_scale: ScoreScale::FivePoint,
            critique_threshold: 7,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_subprocess_timeout_rejected() {
        let config = PipelineConfig {
            exiftool_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            quality_threshold = 0.3
            backends = ["gemini", "ollama"]
            metadata_mode = "embedded"

            [ollama]
            model = "bakllava"

            [ollama.options]
            num_gpu = 35
            "#,
        )
        .unwrap();

        assert_eq!(config.quality_threshold, 0.3);
        assert_eq!(config.backends, vec![BackendKind::Gemini, BackendKind::Ollama]);
        assert_eq!(config.metadata_mode, MetadataMode::Embedded);
        assert_eq!(config.ollama.model, "bakllava");
        assert_eq!(config.ollama.url, "http://localhost:11434");
        assert_eq!(config.ollama.options["num_gpu"], serde_json::json!(35));
        assert_eq!(config.iqa_metric, "brisque");
        assert_eq!(config.iqa_timeout_secs, 120);
        assert_eq!(config.exiftool_timeout_secs, 30);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(BackendKind::parse("LLaVA"), Some(BackendKind::Ollama));
        assert_eq!(BackendKind::parse("gemini"), Some(BackendKind::Gemini));
        assert_eq!(BackendKind::parse("gpt"), None);
    }
}
