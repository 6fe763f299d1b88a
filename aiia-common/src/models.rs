//! Pipeline data model
//!
//! Types flowing between the curation, analysis and persistence stages, and
//! the aggregate records handed back to callers. None of these are persisted
//! by the pipeline; the only durable output is metadata written to images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Tag added to every image whose final star rating is 5
pub const GALLERY_TAG: &str = "GALLERY";

/// Tags identifying a placeholder classification
pub const PLACEHOLDER_TAGS: [&str; 2] = ["AI-Placeholder", "Analysis-Failed"];

/// Subcategory used by the placeholder classification
pub const PLACEHOLDER_SUBCATEGORY: &str = "Other";

/// Error string returned when curation selects nothing
pub const NO_IMAGES_PASSED: &str = "No images passed quality assessment";

/// Image with its curation-stage quality score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredImage {
    pub path: PathBuf,
    pub quality_score: f64,
}

/// Top-level content category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "Person", alias = "people", alias = "person")]
    People,
    #[serde(alias = "place")]
    Place,
    #[serde(alias = "thing")]
    Thing,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::People, Category::Place, Category::Thing];

    /// Parse a backend-supplied label, case-insensitive
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "people" | "person" => Some(Category::People),
            "place" => Some(Category::Place),
            "thing" => Some(Category::Thing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::People => "People",
            Category::Place => "Place",
            Category::Thing => "Thing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric domain of `Classification::score`
///
/// Carried explicitly so the persistence stage never guesses the scale
/// from the magnitude of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// Scores 1-10
    #[default]
    TenPoint,
    /// Scores 1-5 (already star ratings)
    FivePoint,
}

impl ScoreScale {
    pub fn max(&self) -> u8 {
        match self {
            ScoreScale::TenPoint => 10,
            ScoreScale::FivePoint => 5,
        }
    }

    /// Middle of the range, used for placeholder classifications
    pub fn midpoint(&self) -> u8 {
        match self {
            ScoreScale::TenPoint => 5,
            ScoreScale::FivePoint => 3,
        }
    }

    /// Clamp a raw score into this domain
    pub fn clamp(&self, raw: i64) -> u8 {
        raw.clamp(1, self.max() as i64) as u8
    }

    /// Star rating (1-5) for a score in this domain
    pub fn to_stars(&self, score: u8) -> u8 {
        match self {
            ScoreScale::TenPoint => score.div_ceil(2).clamp(1, 5),
            ScoreScale::FivePoint => score.clamp(1, 5),
        }
    }
}

/// Canonical analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub subcategory: String,
    /// 2-5 vocabulary tags, no duplicates, display order preserved
    pub tags: Vec<String>,
    pub score: u8,
    pub scale: ScoreScale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
}

impl Classification {
    /// Fixed degraded-mode result used when every backend fails
    pub fn placeholder(scale: ScoreScale) -> Self {
        Self {
            category: Category::Thing,
            subcategory: PLACEHOLDER_SUBCATEGORY.to_string(),
            tags: PLACEHOLDER_TAGS.iter().map(|t| t.to_string()).collect(),
            score: scale.midpoint(),
            scale,
            critique: None,
        }
    }

    /// True if this is the placeholder sentinel pattern
    pub fn is_placeholder(&self) -> bool {
        self.category == Category::Thing
            && self.subcategory == PLACEHOLDER_SUBCATEGORY
            && self.tags.len() == PLACEHOLDER_TAGS.len()
            && self.tags.iter().zip(PLACEHOLDER_TAGS).all(|(a, b)| a == b)
            && self.score == self.scale.midpoint()
    }

    /// Star rating derived from score and scale
    pub fn star_rating(&self) -> u8 {
        self.scale.to_stars(self.score)
    }
}

/// Per-image record within a ProcessingResult
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub file_path: PathBuf,
    pub image_name: String,
    pub classification: Classification,
    /// None in single-image and archive runs, which skip curation
    pub quality_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub metadata_written: bool,
    /// Final persisted star rating, if metadata was written
    pub star_rating: Option<u8>,
    /// Final persisted tag set (may include GALLERY)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub written_tags: Vec<String>,
}

/// Archive-mode aggregate statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStatistics {
    pub total_images: usize,
    pub average_rating: f64,
    /// Count per star rating 1..=5
    pub rating_distribution: BTreeMap<u8, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    /// Ten most frequent tags, most frequent first
    pub top_tags: Vec<(String, usize)>,
    pub five_star_images: usize,
    pub gallery_worthy_percentage: f64,
}

/// Aggregate result of a directory run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub run_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_images_found: usize,
    pub images_curated: usize,
    pub images_analyzed: usize,
    pub metadata_written: usize,
    /// Images that fell back to the placeholder classification
    pub placeholder_classifications: usize,
    pub processing_time_seconds: f64,
    pub quality_threshold: f64,
    pub iqa_model: String,
    pub ai_model: String,
    pub cancelled: bool,
    pub results: Vec<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_statistics: Option<ArchiveStatistics>,
}

impl ProcessingResult {
    /// Empty result for a run, to be filled in by the orchestrator
    pub fn new(run_id: Uuid, quality_threshold: f64, iqa_model: &str, ai_model: &str) -> Self {
        Self {
            run_id,
            success: false,
            error: None,
            total_images_found: 0,
            images_curated: 0,
            images_analyzed: 0,
            metadata_written: 0,
            placeholder_classifications: 0,
            processing_time_seconds: 0.0,
            quality_threshold,
            iqa_model: iqa_model.to_string(),
            ai_model: ai_model.to_string(),
            cancelled: false,
            results: Vec::new(),
            archive_statistics: None,
        }
    }

    /// Mark the run as a structured failure
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Result of `process_single_image`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleImageResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata_written: bool,
    pub processing_time_seconds: f64,
    pub ai_model: String,
    pub message: String,
}
