//! Metadata persistence stage
//!
//! Converts a Classification into either an XMP sidecar or embedded
//! metadata (one mode per run) and enforces the rating rules:
//! - star rating derived from score and its explicit scale
//! - embedded mode keeps an existing 4 or 5 star rating rather than demoting it
//! - a final rating of 5 carries the `GALLERY` tag exactly once

use crate::config::{MetadataMode, PipelineConfig};
use crate::error::ConfigError;
use crate::services::exiftool_client::{ExifTool, MetadataTool, MetadataToolError, TagMap, TagValue};
use crate::services::xmp_sidecar::{self, XmpFields};
use aiia_common::models::{Classification, GALLERY_TAG};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Image file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to write sidecar for {0}: {1}")]
    Sidecar(PathBuf, std::io::Error),

    #[error(transparent)]
    Tool(#[from] MetadataToolError),
}

/// What was actually written for one image
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenMetadata {
    /// Sidecar path, or the image itself in embedded mode
    pub target: PathBuf,
    pub rating: u8,
    pub tags: Vec<String>,
    /// Rating found in the file before writing (embedded mode only)
    pub previous_rating: Option<u8>,
}

/// Rating after the monotonicity rule: an existing 4 or 5 is never lowered
pub fn final_rating(computed: u8, existing: Option<u8>) -> u8 {
    match existing {
        Some(existing @ 4..=5) => existing.max(computed),
        _ => computed,
    }
}

/// Tag set to persist: deduplicated, with `GALLERY` exactly once at rating 5
pub fn persisted_tags(tags: &[String], rating: u8) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len() + 1);
    for tag in tags {
        if tag != GALLERY_TAG && !out.contains(tag) {
            out.push(tag.clone());
        }
    }
    if rating == 5 {
        out.push(GALLERY_TAG.to_string());
    }
    out
}

/// `Category: X, Subcategory: Y`
pub fn description_text(classification: &Classification) -> String {
    format!(
        "Category: {}, Subcategory: {}",
        classification.category, classification.subcategory
    )
}

/// Composite comment: critique, score and tags
pub fn composite_comment(classification: &Classification, tags: &[String]) -> String {
    format!(
        "Critique: {} | Score: {}/{} | Tags: {}",
        classification.critique.as_deref().unwrap_or("N/A"),
        classification.score,
        classification.scale.max(),
        tags.join(", ")
    )
}

pub struct MetadataWriter {
    mode: MetadataMode,
    tool: Option<Arc<dyn MetadataTool>>,
    model_label: String,
}

impl MetadataWriter {
    /// Sidecar writer; needs no external tool
    pub fn xmp_sidecar(model_label: impl Into<String>) -> Self {
        Self {
            mode: MetadataMode::XmpSidecar,
            tool: None,
            model_label: model_label.into(),
        }
    }

    /// Embedded writer using the given tool
    pub fn embedded(tool: Arc<dyn MetadataTool>, model_label: impl Into<String>) -> Self {
        Self {
            mode: MetadataMode::Embedded,
            tool: Some(tool),
            model_label: model_label.into(),
        }
    }

    /// Build from config; embedded mode requires a working exiftool
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let label = config.ai_model_label();
        match config.metadata_mode {
            MetadataMode::XmpSidecar => Ok(Self::xmp_sidecar(label)),
            MetadataMode::Embedded => {
                let tool = ExifTool::new(&config.exiftool_path)
                    .map_err(|e| ConfigError::MetadataToolUnavailable(e.to_string()))?
                    .with_timeout(Duration::from_secs(config.exiftool_timeout_secs));
                tracing::info!(version = tool.version(), "Embedded metadata mode via exiftool");
                Ok(Self::embedded(Arc::new(tool), label))
            }
        }
    }

    pub fn mode(&self) -> MetadataMode {
        self.mode
    }

    /// Persist one classification; `false` on any failure, never an error
    pub async fn persist(&self, image_path: &Path, classification: &Classification) -> bool {
        self.persist_with_quality(image_path, classification, None)
            .await
            .is_some()
    }

    /// Persist, returning what was written; failures are logged
    pub async fn persist_with_quality(
        &self,
        image_path: &Path,
        classification: &Classification,
        quality_score: Option<f64>,
    ) -> Option<WrittenMetadata> {
        match self.write(image_path, classification, quality_score).await {
            Ok(written) => Some(written),
            Err(e) => {
                tracing::error!(file = %image_path.display(), error = %e, "Metadata write failed");
                None
            }
        }
    }

    /// Persist, surfacing the failure reason
    pub async fn write(
        &self,
        image_path: &Path,
        classification: &Classification,
        quality_score: Option<f64>,
    ) -> Result<WrittenMetadata, PersistError> {
        if !image_path.is_file() {
            return Err(PersistError::FileNotFound(image_path.to_path_buf()));
        }

        match (&self.tool, self.mode) {
            (Some(tool), MetadataMode::Embedded) => {
                self.write_embedded(tool.as_ref(), image_path, classification).await
            }
            _ => self.write_sidecar(image_path, classification, quality_score).await,
        }
    }

    async fn write_sidecar(
        &self,
        image_path: &Path,
        classification: &Classification,
        quality_score: Option<f64>,
    ) -> Result<WrittenMetadata, PersistError> {
        // Sidecars are regenerated each run, so there is no prior rating to keep
        let rating = classification.star_rating();
        let tags = persisted_tags(&classification.tags, rating);
        let description = classification
            .critique
            .clone()
            .unwrap_or_else(|| description_text(classification));
        let category = classification.category.to_string();

        let fields = XmpFields {
            rating,
            tags: &tags,
            description: &description,
            category: &category,
            subcategory: &classification.subcategory,
            score: classification.score,
            score_max: classification.scale.max(),
            quality_score,
            analysis_date: Utc::now(),
            model_type: &self.model_label,
        };

        let target = xmp_sidecar::write_sidecar(image_path, &fields)
            .await
            .map_err(|e| PersistError::Sidecar(image_path.to_path_buf(), e))?;

        tracing::debug!(file = %image_path.display(), sidecar = %target.display(), rating, "Wrote XMP sidecar");

        Ok(WrittenMetadata {
            target,
            rating,
            tags,
            previous_rating: None,
        })
    }

    async fn write_embedded(
        &self,
        tool: &dyn MetadataTool,
        image_path: &Path,
        classification: &Classification,
    ) -> Result<WrittenMetadata, PersistError> {
        // Existing rating must be known before anything is written
        let previous_rating = tool.read_rating(image_path).await?;

        let computed = classification.star_rating();
        let rating = final_rating(computed, previous_rating);
        if rating != computed {
            tracing::debug!(file = %image_path.display(), computed, kept = rating, "Preserving existing high rating");
        }

        let tags = persisted_tags(&classification.tags, rating);
        tool.write_tags(image_path, &embedded_tag_map(classification, rating, &tags))
            .await?;

        Ok(WrittenMetadata {
            target: image_path.to_path_buf(),
            rating,
            tags,
            previous_rating,
        })
    }
}

/// Tag map for embedded mode
pub fn embedded_tag_map(classification: &Classification, rating: u8, tags: &[String]) -> TagMap {
    let description = description_text(classification);
    let comment = composite_comment(classification, tags);

    let mut map = TagMap::new();
    map.insert("IPTC:Keywords".to_string(), TagValue::List(tags.to_vec()));
    map.insert("XMP-dc:Subject".to_string(), TagValue::List(tags.to_vec()));
    map.insert("EXIF:Rating".to_string(), TagValue::Number(rating as i64));
    map.insert("XMP-xmp:Rating".to_string(), TagValue::Number(rating as i64));
    map.insert("EXIF:ImageDescription".to_string(), TagValue::Text(description.clone()));
    map.insert("XMP-dc:Description".to_string(), TagValue::Text(description));
    map.insert("EXIF:UserComment".to_string(), TagValue::Text(comment));
    map
}
