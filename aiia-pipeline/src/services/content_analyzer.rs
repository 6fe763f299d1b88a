//! Content analysis stage
//!
//! Tries each backend in priority order and accepts the first response the
//! normalizer validates. A backend that errors or returns unusable text is
//! skipped; if none succeeds the placeholder classification is returned.

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::services::backends::{self, VisionBackend};
use crate::services::image_prep::{self, PreparedImage};
use crate::services::prompt::PromptBuilder;
use crate::services::response_normalizer::ResponseNormalizer;
use aiia_common::models::Classification;
use std::path::Path;

/// Classification plus the backend that produced it
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub classification: Classification,
    /// `name:model` of the accepted backend, `None` for the placeholder
    pub backend: Option<String>,
    /// Backends tried, including the accepted one
    pub attempts: usize,
}

impl AnalysisOutcome {
    pub fn is_placeholder(&self) -> bool {
        self.backend.is_none()
    }
}

/// Image preparation settings shared by all backends
#[derive(Debug, Clone, Copy)]
pub struct PrepSettings {
    pub max_dimension: u32,
    pub min_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for PrepSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            min_dimension: 200,
            jpeg_quality: 90,
        }
    }
}

pub struct ContentAnalyzer {
    backends: Vec<Box<dyn VisionBackend>>,
    normalizer: ResponseNormalizer,
    prompt: String,
    prep: PrepSettings,
}

impl ContentAnalyzer {
    pub fn new(
        backends: Vec<Box<dyn VisionBackend>>,
        normalizer: ResponseNormalizer,
        prompt: String,
        prep: PrepSettings,
    ) -> Self {
        Self {
            backends,
            normalizer,
            prompt,
            prep,
        }
    }

    /// Build backends, prompt and normalizer from a validated config
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let persona = config
            .persona_profile()
            .ok_or_else(|| ConfigError::UnknownPersona(config.persona.clone()))?;
        let taxonomy = config.vocabulary();

        let prompt = PromptBuilder {
            persona,
            taxonomy: &taxonomy,
            scale: config.score_scale,
            gallery_critique: config.gallery_critique,
            critique_threshold: config.critique_threshold,
        }
        .build();

        let normalizer = ResponseNormalizer::new(
            taxonomy,
            config.score_scale,
            config.gallery_critique,
            config.critique_threshold,
        );

        Ok(Self::new(
            backends::build_backends(config)?,
            normalizer,
            prompt,
            PrepSettings {
                max_dimension: config.max_image_dimension,
                min_dimension: config.min_image_dimension,
                jpeg_quality: config.jpeg_quality,
            },
        ))
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|b| format!("{}:{}", b.name(), b.model()))
            .collect()
    }

    /// Classify one image; never fails
    pub async fn analyze(&self, image_path: &Path) -> Classification {
        self.analyze_detailed(image_path).await.classification
    }

    /// Classify one image, reporting which backend answered
    pub async fn analyze_detailed(&self, image_path: &Path) -> AnalysisOutcome {
        let prepared = match image_prep::prepare_for_analysis(
            image_path,
            self.prep.max_dimension,
            self.prep.jpeg_quality,
        )
        .await
        {
            Ok(prepared) => {
                if prepared.original_short_side() < self.prep.min_dimension {
                    tracing::debug!(
                        file = %image_path.display(),
                        width = prepared.original_width,
                        height = prepared.original_height,
                        min = self.prep.min_dimension,
                        "Image below recommended size, analyzing anyway"
                    );
                }
                prepared
            }
            Err(e) => {
                tracing::warn!(file = %image_path.display(), error = %e, "Image preparation failed, using placeholder");
                return self.placeholder(0);
            }
        };

        self.analyze_prepared(image_path, &prepared).await
    }

    async fn analyze_prepared(&self, image_path: &Path, prepared: &PreparedImage) -> AnalysisOutcome {
        let mut attempts = 0;

        for backend in &self.backends {
            attempts += 1;
            let label = format!("{}:{}", backend.name(), backend.model());

            let raw = match backend.generate(&self.prompt, prepared).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(file = %image_path.display(), backend = %label, error = %e, "Backend call failed");
                    continue;
                }
            };

            match self.normalizer.normalize(&raw) {
                Ok(classification) => {
                    tracing::debug!(
                        file = %image_path.display(),
                        backend = %label,
                        category = %classification.category,
                        score = classification.score,
                        "Image classified"
                    );
                    return AnalysisOutcome {
                        classification,
                        backend: Some(label),
                        attempts,
                    };
                }
                Err(e) => {
                    tracing::warn!(file = %image_path.display(), backend = %label, error = %e, "Discarding unusable backend response");
                    tracing::trace!(response = %raw, "Raw backend response");
                }
            }
        }

        tracing::warn!(file = %image_path.display(), attempts, "All backends failed, using placeholder classification");
        self.placeholder(attempts)
    }

    fn placeholder(&self, attempts: usize) -> AnalysisOutcome {
        AnalysisOutcome {
            classification: Classification::placeholder(self.normalizer.scale()),
            backend: None,
            attempts,
        }
    }
}
