//! Phase: CURATING

use super::WorkflowOrchestrator;
use aiia_common::events::ProgressSink;
use aiia_common::models::ScoredImage;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

impl WorkflowOrchestrator {
    /// Score every discovered file and keep the configured top fraction
    pub(super) async fn phase_curating(
        &self,
        files: &[PathBuf],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<ScoredImage> {
        let outcome = self
            .curation
            .score_and_select(files, self.config.quality_threshold, sink, cancel)
            .await;

        if outcome.scored < outcome.found {
            tracing::info!(
                excluded = outcome.found - outcome.scored,
                "Images excluded from curation (unscorable or cancelled)"
            );
        }

        outcome.selected
    }
}
