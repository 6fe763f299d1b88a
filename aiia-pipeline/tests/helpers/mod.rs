//! Test Helper Utilities
//!
//! Shared fixtures and fakes for aiia-pipeline integration tests

#![allow(dead_code)]

pub mod fakes;
pub mod image_generator;

pub use fakes::{CollectingSink, FakeMetadataTool, FixedScoreMetric, Reply, ScriptedBackend};
pub use image_generator::{generate_test_image, generate_test_library, ImageSpec};

use aiia_pipeline::config::PipelineConfig;
use aiia_pipeline::services::backends::VisionBackend;
use aiia_pipeline::services::content_analyzer::{ContentAnalyzer, PrepSettings};
use aiia_pipeline::services::curation::CurationStage;
use aiia_pipeline::services::metadata_writer::MetadataWriter;
use aiia_pipeline::services::prompt::PromptBuilder;
use aiia_pipeline::services::quality_scorer::{IqaMetric, QualityScorer};
use aiia_pipeline::services::response_normalizer::ResponseNormalizer;
use aiia_pipeline::WorkflowOrchestrator;
use std::sync::Arc;

/// Backend reply in the expected JSON shape
pub fn json_reply(category: &str, subcategory: &str, tags: &[&str], score: u8) -> String {
    serde_json::json!({
        "category": category,
        "subcategory": subcategory,
        "tags": tags,
        "score": score,
    })
    .to_string()
}

/// Same reply wrapped in a markdown fence, as chat models tend to answer
pub fn fenced_reply(category: &str, subcategory: &str, tags: &[&str], score: u8) -> String {
    format!("```json\n{}\n```", json_reply(category, subcategory, tags, score))
}

/// Analyzer over the given backends using the config's persona and vocabulary
pub fn build_analyzer(config: &PipelineConfig, backends: Vec<Box<dyn VisionBackend>>) -> ContentAnalyzer {
    let taxonomy = config.vocabulary();
    let persona = config.persona_profile().expect("test persona exists");

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

    ContentAnalyzer::new(
        backends,
        normalizer,
        prompt,
        PrepSettings {
            max_dimension: config.max_image_dimension,
            min_dimension: config.min_image_dimension,
            jpeg_quality: config.jpeg_quality,
        },
    )
}

/// Orchestrator with fake collaborators and XMP sidecar output
pub fn build_orchestrator(
    config: PipelineConfig,
    metric: Box<dyn IqaMetric>,
    backends: Vec<Box<dyn VisionBackend>>,
) -> WorkflowOrchestrator {
    let writer = MetadataWriter::xmp_sidecar(config.ai_model_label());
    build_orchestrator_with_writer(config, metric, backends, writer)
}

pub fn build_orchestrator_with_writer(
    config: PipelineConfig,
    metric: Box<dyn IqaMetric>,
    backends: Vec<Box<dyn VisionBackend>>,
    writer: MetadataWriter,
) -> WorkflowOrchestrator {
    let analyzer = build_analyzer(&config, backends);
    let curation = CurationStage::new(Arc::new(QualityScorer::with_metric(metric)));
    WorkflowOrchestrator::with_components(config, curation, analyzer, writer)
}
