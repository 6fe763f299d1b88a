//! Phase: PERSISTING
//!
//! One write per image, in analysis order. A failed write is counted and
//! the batch continues.

use super::{display_name, WorkflowOrchestrator};
use aiia_common::events::ProgressSink;
use aiia_common::models::ImageRecord;
use tokio_util::sync::CancellationToken;

impl WorkflowOrchestrator {
    /// Persist every record; returns the number written
    pub(super) async fn phase_persisting(
        &self,
        records: &mut [ImageRecord],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> usize {
        let total = records.len();
        let mut written = 0;

        for (i, record) in records.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(written, total, "Persistence cancelled");
                break;
            }

            sink.status(format!(
                "Writing metadata {}/{}: {}",
                i + 1,
                total,
                display_name(&record.file_path)
            ));

            if self.persist_record(record).await {
                written += 1;
            } else {
                sink.status(format!("Metadata write failed: {}", record.image_name));
            }
        }

        tracing::info!(written, failed = total - written, mode = ?self.writer.mode(), "Metadata persistence complete");
        written
    }

    /// Persist one record and fill in what was written
    pub(super) async fn persist_record(&self, record: &mut ImageRecord) -> bool {
        match self
            .writer
            .persist_with_quality(&record.file_path, &record.classification, record.quality_score)
            .await
        {
            Some(written) => {
                record.metadata_written = true;
                record.star_rating = Some(written.rating);
                record.written_tags = written.tags;
                true
            }
            None => {
                record.metadata_written = false;
                false
            }
        }
    }
}
