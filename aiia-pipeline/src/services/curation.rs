//! Curation stage
//!
//! Scans a directory, scores every image, sorts best-first by the active
//! metric's convention and keeps the top fraction.

use crate::services::file_scanner::{FileScanner, ScanError};
use crate::services::quality_scorer::QualityScorer;
use aiia_common::events::ProgressSink;
use aiia_common::models::ScoredImage;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of scoring and selection
#[derive(Debug, Clone, Default)]
pub struct CurationOutcome {
    /// Images enumerated by the scanner
    pub found: usize,
    /// Images that received a score
    pub scored: usize,
    /// Selected images, best first
    pub selected: Vec<ScoredImage>,
}

/// Number of images kept: `max(1, floor(n * fraction))`, or 0 when `n == 0`
///
/// A tiny epsilon absorbs float error so that e.g. `10 * 0.3` keeps 3.
pub fn selection_count(n: usize, top_fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let raw = (n as f64 * top_fraction + 1e-9).floor() as usize;
    raw.clamp(1, n)
}

/// Sort best-first and keep the top fraction
pub fn select_top(
    mut scored: Vec<ScoredImage>,
    top_fraction: f64,
    lower_is_better: bool,
) -> Vec<ScoredImage> {
    scored.sort_by(|a, b| {
        let ord = a
            .quality_score
            .partial_cmp(&b.quality_score)
            .unwrap_or(Ordering::Equal);
        let ord = if lower_is_better { ord } else { ord.reverse() };
        // Stable tie-break on path keeps runs reproducible
        ord.then_with(|| a.path.cmp(&b.path))
    });

    let keep = selection_count(scored.len(), top_fraction);
    scored.truncate(keep);
    scored
}

/// Curation stage
pub struct CurationStage {
    scorer: Arc<QualityScorer>,
}

impl CurationStage {
    pub fn new(scorer: Arc<QualityScorer>) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Scan, score and select in one call
    pub async fn curate(
        &self,
        directory: &Path,
        top_fraction: f64,
        recursive: bool,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<CurationOutcome, ScanError> {
        let files = FileScanner::new().recursive(recursive).scan(directory)?;
        Ok(self.score_and_select(&files, top_fraction, sink, cancel).await)
    }

    /// Score already-discovered files and select the best fraction
    ///
    /// Unscorable images are dropped. Cancellation stops scoring early and
    /// selects among what was scored.
    pub async fn score_and_select(
        &self,
        files: &[PathBuf],
        top_fraction: f64,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CurationOutcome {
        let total = files.len();
        sink.status(format!("Found {} images for quality assessment", total));

        let mut scored = Vec::with_capacity(total);
        for (i, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(scored = scored.len(), total, "Curation cancelled");
                break;
            }

            sink.status(format!(
                "Scoring image {}/{}: {}",
                i + 1,
                total,
                display_name(path)
            ));

            match self.scorer.score(path).await {
                Some(quality_score) => scored.push(ScoredImage {
                    path: path.clone(),
                    quality_score,
                }),
                None => tracing::debug!(file = %path.display(), "Excluded from curation"),
            }
        }

        let scored_count = scored.len();
        let selected = select_top(scored, top_fraction, self.scorer.lower_is_better());

        if !selected.is_empty() {
            sink.status(format!(
                "Selected top {} images ({:.0}%) for AI analysis",
                selected.len(),
                top_fraction * 100.0
            ));
            if let (Some(best), Some(last)) = (selected.first(), selected.last()) {
                sink.status(format!(
                    "Quality score range: {:.2} - {:.2} ({})",
                    best.quality_score,
                    last.quality_score,
                    self.scorer.metric_name()
                ));
            }
        }

        tracing::info!(
            found = total,
            scored = scored_count,
            selected = selected.len(),
            metric = self.scorer.metric_name(),
            "Curation complete"
        );

        CurationOutcome {
            found: total,
            scored: scored_count,
            selected,
        }
    }
}

/// File name for progress messages
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
