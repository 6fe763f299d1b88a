//! Phase: SCANNING
//!
//! File discovery only. Scoring happens in CURATING.

use super::WorkflowOrchestrator;
use crate::services::file_scanner::{FileScanner, ScanError};
use std::path::{Path, PathBuf};

impl WorkflowOrchestrator {
    /// Discover supported images under `directory`
    ///
    /// Traversal is blocking filesystem work and runs off the async runtime.
    pub(super) async fn phase_scanning(&self, directory: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let recursive = self.config.recursive;
        let root = directory.to_path_buf();

        let scan = tokio::task::spawn_blocking(move || {
            FileScanner::new().recursive(recursive).scan_with_stats(&root)
        })
        .await
        .map_err(|e| ScanError::FileAccessError(directory.to_path_buf(), e.to_string()))??;

        for error in &scan.errors {
            tracing::warn!(error = %error, "Skipped unreadable entry during scan");
        }

        tracing::info!(
            directory = %directory.display(),
            files = scan.files.len(),
            total_bytes = scan.total_size,
            formats = ?scan.by_format,
            recursive,
            "Scan complete"
        );

        Ok(scan.files)
    }
}
