//! Pipeline stages and their external collaborators

pub mod backends;
pub mod content_analyzer;
pub mod curation;
pub mod exiftool_client;
pub mod file_scanner;
pub mod image_prep;
pub mod metadata_writer;
pub mod prompt;
pub mod quality_scorer;
pub mod response_normalizer;
pub mod workflow_orchestrator;
pub mod xmp_sidecar;

pub use backends::{BackendError, GeminiClient, OllamaClient, VisionBackend};
pub use content_analyzer::{AnalysisOutcome, ContentAnalyzer, PrepSettings};
pub use curation::{CurationOutcome, CurationStage};
pub use exiftool_client::{ExifTool, MetadataTool, MetadataToolError, TagMap, TagValue};
pub use file_scanner::{FileScanner, ScanError, ScanResult};
pub use metadata_writer::{MetadataWriter, PersistError, WrittenMetadata};
pub use quality_scorer::{IqaMetric, QualityScorer, ScoreError};
pub use response_normalizer::{NormalizeError, ResponseNormalizer};
pub use workflow_orchestrator::WorkflowOrchestrator;
