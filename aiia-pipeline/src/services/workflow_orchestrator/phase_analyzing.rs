//! Phase: ANALYZING
//!
//! Images are analyzed strictly in order (best quality first for curated
//! runs). Backend failures never reach here; the analyzer degrades to the
//! placeholder classification.

use super::{new_record, WorkItem, WorkflowOrchestrator};
use aiia_common::events::ProgressSink;
use aiia_common::models::{ImageRecord, ProcessingResult};
use tokio_util::sync::CancellationToken;

impl WorkflowOrchestrator {
    pub(super) async fn phase_analyzing(
        &self,
        items: &[WorkItem],
        result: &mut ProcessingResult,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<ImageRecord> {
        let total = items.len();
        let mut records = Vec::with_capacity(total);

        for (i, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(analyzed = records.len(), total, "Analysis cancelled");
                break;
            }

            sink.status(format!(
                "Analyzing {}/{}: {}",
                i + 1,
                total,
                super::display_name(&item.path)
            ));

            let (record, backend) = self.analyze_item(item).await;
            sink.status(summary_line(&record, backend.as_deref()));

            if backend.is_none() {
                result.placeholder_classifications += 1;
            }
            records.push(record);
        }

        result.images_analyzed = records.len();
        records
    }

    /// Classify one item; returns the record and the backend that answered
    pub(super) async fn analyze_item(&self, item: &WorkItem) -> (ImageRecord, Option<String>) {
        let outcome = self.analyzer.analyze_detailed(&item.path).await;
        let record = new_record(item, outcome.classification);
        (record, outcome.backend)
    }
}

/// One-line result, e.g. `Place | Beach | Sunset, Outdoor | 4 stars (8/10)`
fn summary_line(record: &ImageRecord, backend: Option<&str>) -> String {
    let c = &record.classification;
    match backend {
        Some(backend) => format!(
            "{} | {} | {} | {} stars ({}/{}) via {}",
            c.category,
            c.subcategory,
            c.tags.join(", "),
            c.star_rating(),
            c.score,
            c.scale.max(),
            backend
        ),
        None => format!(
            "All backends failed for {}, using placeholder classification",
            record.image_name
        ),
    }
}
