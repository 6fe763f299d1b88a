//! Pipeline workflow orchestrator
//!
//! Sequences the stages over a directory or a single image, aggregates
//! counts and relays progress to a caller-supplied sink.
//!
//! # State Progression
//! SCANNING → CURATING → ANALYZING → PERSISTING → DONE
//!
//! `DONE` is reached early from CURATING when nothing survives scoring,
//! and archive runs go straight from SCANNING to ANALYZING. Each state is
//! handled by a `phase_*` method in its own module.
//!
//! Stages never raise for per-image problems, so the orchestrator only
//! sequences, counts and logs. Cancellation is checked between images.

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::models::{PipelineRun, PipelineState};
use crate::services::content_analyzer::ContentAnalyzer;
use crate::services::curation::{display_name, CurationStage};
use crate::services::metadata_writer::MetadataWriter;
use crate::services::quality_scorer::QualityScorer;
use aiia_common::events::ProgressSink;
use aiia_common::models::{
    Classification, ImageRecord, ProcessingResult, SingleImageResult, NO_IMAGES_PASSED,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod phase_analyzing;
mod phase_curating;
mod phase_persisting;
mod phase_scanning;
pub mod statistics;

pub use statistics::archive_statistics;

/// Error message for a run stopped by its cancellation token
pub const CANCELLED_MESSAGE: &str = "Processing cancelled";

/// One curated or discovered image waiting for analysis
#[derive(Debug, Clone)]
struct WorkItem {
    path: PathBuf,
    quality_score: Option<f64>,
}

/// Workflow orchestrator service
pub struct WorkflowOrchestrator {
    config: Arc<PipelineConfig>,
    curation: CurationStage,
    analyzer: ContentAnalyzer,
    writer: MetadataWriter,
    ai_model: String,
}

impl WorkflowOrchestrator {
    /// Validate the config and build every stage
    ///
    /// Configuration problems (missing API key, unknown persona, embedded
    /// mode without exiftool) surface here, before any directory is touched.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let scorer = Arc::new(QualityScorer::load(
            &config.iqa_metric,
            &config.iqa_command,
            Duration::from_secs(config.iqa_timeout_secs),
        ));
        let analyzer = ContentAnalyzer::from_config(&config)?;
        let writer = MetadataWriter::from_config(&config)?;

        tracing::info!(
            iqa = scorer.metric_name(),
            backends = ?analyzer.backend_names(),
            persona = %config.persona,
            mode = ?config.metadata_mode,
            "Pipeline initialized"
        );

        Ok(Self::with_components(
            config,
            CurationStage::new(scorer),
            analyzer,
            writer,
        ))
    }

    /// Assemble from prebuilt stages
    pub fn with_components(
        config: PipelineConfig,
        curation: CurationStage,
        analyzer: ContentAnalyzer,
        writer: MetadataWriter,
    ) -> Self {
        let ai_model = config.ai_model_label();
        Self {
            config: Arc::new(config),
            curation,
            analyzer,
            writer,
            ai_model,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ai_model(&self) -> &str {
        &self.ai_model
    }

    fn new_result(&self, run: &PipelineRun) -> ProcessingResult {
        ProcessingResult::new(
            run.run_id,
            self.config.quality_threshold,
            self.curation.scorer().metric_name(),
            &self.ai_model,
        )
    }

    /// Curate, analyze and persist every image under `directory`
    ///
    /// Always returns a result; fatal-for-run conditions (missing directory,
    /// nothing survived curation) are reported as `success: false`.
    pub async fn process_directory(
        &self,
        directory: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProcessingResult {
        self.process_directory_tracked(directory, sink, cancel).await.0
    }

    /// As `process_directory`, also returning the run's state history
    pub async fn process_directory_tracked(
        &self,
        directory: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> (ProcessingResult, PipelineRun) {
        let started = Instant::now();
        let mut run = PipelineRun::new();
        let mut result = self.new_result(&run);

        tracing::info!(run_id = %run.run_id, directory = %directory.display(), "Starting pipeline run");
        sink.status("Starting multi-stage processing pipeline...".to_string());
        sink.status(format!("Target directory: {}", directory.display()));

        let files = match self.phase_scanning(directory).await {
            Ok(files) => files,
            Err(e) => {
                sink.status(format!("Scan failed: {}", e));
                run.transition_to(PipelineState::Done);
                return (finish(result.fail(e.to_string()), started), run);
            }
        };
        result.total_images_found = files.len();

        run.transition_to(PipelineState::Curating);
        let curated = self.phase_curating(&files, sink, cancel).await;
        result.images_curated = curated.len();

        if curated.is_empty() {
            run.transition_to(PipelineState::Done);
            let result = if cancel.is_cancelled() {
                result.cancelled = true;
                result.fail(CANCELLED_MESSAGE)
            } else {
                sink.status("No images selected for processing".to_string());
                result.fail(NO_IMAGES_PASSED)
            };
            return (finish(result, started), run);
        }

        let items: Vec<WorkItem> = curated
            .into_iter()
            .map(|s| WorkItem {
                path: s.path,
                quality_score: Some(s.quality_score),
            })
            .collect();

        sink.status(format!(
            "Starting AI analysis of {} curated images...",
            items.len()
        ));
        self.analyze_and_persist(&items, &mut run, &mut result, sink, cancel)
            .await;

        self.report_completion(&result, started, sink);
        (finish(result, started), run)
    }

    /// Archive mode: analyze and persist every discovered image, no curation
    pub async fn process_directory_archive(
        &self,
        directory: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProcessingResult {
        let started = Instant::now();
        let mut run = PipelineRun::new();
        let mut result = self.new_result(&run);

        tracing::info!(run_id = %run.run_id, directory = %directory.display(), "Starting archive run");
        sink.status("Starting archive mode, processing all images...".to_string());
        sink.status(format!("Target directory: {}", directory.display()));

        let files = match self.phase_scanning(directory).await {
            Ok(files) if files.is_empty() => {
                sink.status("No supported images found".to_string());
                run.transition_to(PipelineState::Done);
                return finish(result.fail("No images found"), started);
            }
            Ok(files) => files,
            Err(e) => {
                sink.status(format!("Scan failed: {}", e));
                run.transition_to(PipelineState::Done);
                return finish(result.fail(e.to_string()), started);
            }
        };
        result.total_images_found = files.len();
        sink.status(format!("Found {} images for archive processing", files.len()));

        let items: Vec<WorkItem> = files
            .into_iter()
            .map(|path| WorkItem {
                path,
                quality_score: None,
            })
            .collect();

        self.analyze_and_persist(&items, &mut run, &mut result, sink, cancel)
            .await;

        let stats = archive_statistics(&result.results);
        sink.status(format!(
            "Archive summary: average rating {:.2}, {} five-star images ({:.1}% gallery-worthy)",
            stats.average_rating, stats.five_star_images, stats.gallery_worthy_percentage
        ));
        result.archive_statistics = Some(stats);

        self.report_completion(&result, started, sink);
        finish(result, started)
    }

    /// Shared tail of directory runs: ANALYZING, then PERSISTING unless cancelled
    async fn analyze_and_persist(
        &self,
        items: &[WorkItem],
        run: &mut PipelineRun,
        result: &mut ProcessingResult,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) {
        run.transition_to(PipelineState::Analyzing);
        let mut records = self.phase_analyzing(items, result, sink, cancel).await;

        if cancel.is_cancelled() {
            tracing::info!(run_id = %run.run_id, analyzed = records.len(), "Run cancelled before persistence");
        } else {
            run.transition_to(PipelineState::Persisting);
            result.metadata_written = self.phase_persisting(&mut records, sink, cancel).await;
        }

        result.results = records;
        run.transition_to(PipelineState::Done);

        if cancel.is_cancelled() {
            result.cancelled = true;
            result.success = false;
            result.error = Some(CANCELLED_MESSAGE.to_string());
        } else {
            result.success = true;
        }
    }

    fn report_completion(&self, result: &ProcessingResult, started: Instant, sink: &dyn ProgressSink) {
        let elapsed = started.elapsed().as_secs_f64();
        if result.cancelled {
            sink.status(format!(
                "Pipeline cancelled after {} analyzed images",
                result.images_analyzed
            ));
        } else {
            sink.status("Pipeline complete!".to_string());
        }
        sink.status(format!(
            "Processed {}/{} images in {:.1}s",
            result.metadata_written,
            result.images_analyzed,
            elapsed
        ));
        if result.placeholder_classifications > 0 {
            sink.status(format!(
                "{} images received placeholder classifications",
                result.placeholder_classifications
            ));
        }
        sink.status(format!("Used {} quality assessment", result.iqa_model.to_uppercase()));
        sink.status(format!("Used {} AI model", result.ai_model));

        tracing::info!(
            run_id = %result.run_id,
            found = result.total_images_found,
            curated = result.images_curated,
            analyzed = result.images_analyzed,
            written = result.metadata_written,
            placeholders = result.placeholder_classifications,
            cancelled = result.cancelled,
            elapsed_secs = elapsed,
            "Pipeline run finished"
        );
    }

    /// Analyze and persist one image, skipping curation
    pub async fn process_single_image(&self, image_path: &Path) -> SingleImageResult {
        let started = Instant::now();

        if !image_path.is_file() {
            return SingleImageResult {
                success: false,
                result: None,
                error: Some(format!("Image file not found: {}", image_path.display())),
                metadata_written: false,
                processing_time_seconds: started.elapsed().as_secs_f64(),
                ai_model: self.ai_model.clone(),
                message: "Image file not found".to_string(),
            };
        }

        let item = WorkItem {
            path: image_path.to_path_buf(),
            quality_score: None,
        };
        let mut record = self.analyze_item(&item).await.0;
        let written = self.persist_record(&mut record).await;

        let elapsed = started.elapsed().as_secs_f64();
        let message = if record.classification.is_placeholder() {
            format!("All backends failed, placeholder recorded in {:.2}s", elapsed)
        } else {
            format!("Processed successfully in {:.2}s", elapsed)
        };

        SingleImageResult {
            success: true,
            result: Some(record),
            error: None,
            metadata_written: written,
            processing_time_seconds: elapsed,
            ai_model: self.ai_model.clone(),
            message,
        }
    }

    /// Run a directory on a background task and emit the sentinel protocol
    ///
    /// Every returned result, including structured failures, is delivered as
    /// the completion sentinel plus payload. The error sentinel is reserved
    /// for a run task that panicked.
    pub fn spawn_directory_run(
        self: Arc<Self>,
        directory: PathBuf,
        archive: bool,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let run_sink = Arc::clone(&sink);
            let task = tokio::spawn(async move {
                if archive {
                    self.process_directory_archive(&directory, run_sink.as_ref(), &cancel)
                        .await
                } else {
                    self.process_directory(&directory, run_sink.as_ref(), &cancel)
                        .await
                }
            });

            match task.await {
                Ok(result) => sink.complete(result),
                Err(e) => {
                    tracing::error!(error = %e, "Pipeline task failed");
                    sink.error(&format!("Pipeline task failed: {}", e));
                }
            }
        })
    }
}

fn finish(mut result: ProcessingResult, started: Instant) -> ProcessingResult {
    result.processing_time_seconds = started.elapsed().as_secs_f64();
    result
}

fn new_record(item: &WorkItem, classification: Classification) -> ImageRecord {
    ImageRecord {
        file_path: item.path.clone(),
        image_name: display_name(&item.path),
        classification,
        quality_score: item.quality_score,
        timestamp: Utc::now(),
        metadata_written: false,
        star_rating: None,
        written_tags: Vec::new(),
    }
}
