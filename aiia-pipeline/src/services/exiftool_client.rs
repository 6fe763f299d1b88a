//! Embedded metadata via exiftool
//!
//! The metadata tool is an external process taking a file path and a tag
//! map and editing the file in place. Every invocation is independent and
//! killed if it outlives the configured timeout.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// Per-invocation limit unless configured otherwise
pub const DEFAULT_EXIFTOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum MetadataToolError {
    /// exiftool binary not found
    #[error("exiftool not found: {0}")]
    BinaryNotFound(String),

    /// Failed to spawn or join the process
    #[error("Failed to execute exiftool: {0}")]
    ExecutionError(String),

    /// exiftool ran and reported failure
    #[error("exiftool failed on {0}: {1}")]
    ToolFailed(PathBuf, String),

    /// Output was not the expected JSON
    #[error("Failed to parse exiftool output: {0}")]
    ParseError(String),

    /// Invocation did not finish in time and was killed
    #[error("exiftool timed out on {0} after {1}s")]
    Timeout(PathBuf, u64),
}

/// Value assigned to one tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Number(i64),
    /// List-type tag; replaces existing entries
    List(Vec<String>),
}

/// Tag name (e.g. `XMP-dc:Subject`) to value
pub type TagMap = BTreeMap<String, TagValue>;

/// External metadata editor
#[async_trait]
pub trait MetadataTool: Send + Sync {
    /// Highest rating already embedded in the file, if any
    async fn read_rating(&self, path: &Path) -> Result<Option<u8>, MetadataToolError>;

    /// Apply all tags in one in-place edit
    async fn write_tags(&self, path: &Path, tags: &TagMap) -> Result<(), MetadataToolError>;
}

/// exiftool process wrapper
#[derive(Debug, Clone)]
pub struct ExifTool {
    binary: String,
    version: String,
    timeout: Duration,
}

impl ExifTool {
    /// Verify the binary by running `-ver`
    pub fn new(binary: &str) -> Result<Self, MetadataToolError> {
        match Command::new(binary).arg("-ver").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                tracing::debug!(binary, version = %version, "exiftool available");
                Ok(Self {
                    binary: binary.to_string(),
                    version,
                    timeout: DEFAULT_EXIFTOOL_TIMEOUT,
                })
            }
            Ok(output) => Err(MetadataToolError::ExecutionError(format!(
                "{} -ver exited with {}",
                binary, output.status
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MetadataToolError::BinaryNotFound(binary.to_string()))
            }
            Err(e) => Err(MetadataToolError::ExecutionError(e.to_string())),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    async fn run(&self, args: Vec<String>, path: &Path) -> Result<std::process::Output, MetadataToolError> {
        let mut command = tokio::process::Command::new(&self.binary);
        command.args(&args).arg(path).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| MetadataToolError::Timeout(path.to_path_buf(), self.timeout.as_secs()))?
            .map_err(|e| MetadataToolError::ExecutionError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MetadataToolError::ToolFailed(
                path.to_path_buf(),
                stderr.trim().to_string(),
            ));
        }
        Ok(output)
    }
}

#[async_trait]
impl MetadataTool for ExifTool {
    async fn read_rating(&self, path: &Path) -> Result<Option<u8>, MetadataToolError> {
        let args = ["-j", "-n", "-G", "-XMP-xmp:Rating", "-EXIF:Rating"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.run(args, path).await?;
        parse_rating_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn write_tags(&self, path: &Path, tags: &TagMap) -> Result<(), MetadataToolError> {
        tracing::debug!(file = %path.display(), tags = tags.len(), "Writing embedded metadata");
        self.run(write_args(tags), path).await?;
        Ok(())
    }
}

/// Command-line arguments for an in-place write
pub fn write_args(tags: &TagMap) -> Vec<String> {
    let mut args = vec![
        "-overwrite_original".to_string(),
        "-m".to_string(),
        "-charset".to_string(),
        "iptc=UTF8".to_string(),
        "-codedcharacterset=utf8".to_string(),
    ];

    for (tag, value) in tags {
        match value {
            TagValue::Text(text) => args.push(format!("-{}={}", tag, text)),
            TagValue::Number(n) => args.push(format!("-{}={}", tag, n)),
            TagValue::List(items) => {
                // Empty assignment clears, repeated assignments accumulate
                args.push(format!("-{}=", tag));
                for item in items {
                    args.push(format!("-{}+={}", tag, item));
                }
            }
        }
    }
    args
}

/// Highest rating in `exiftool -j -n -G` output
pub fn parse_rating_output(json: &str) -> Result<Option<u8>, MetadataToolError> {
    let parsed: Vec<BTreeMap<String, serde_json::Value>> =
        serde_json::from_str(json).map_err(|e| MetadataToolError::ParseError(e.to_string()))?;

    let rating = parsed
        .first()
        .into_iter()
        .flat_map(|tags| tags.iter())
        .filter(|(key, _)| key.ends_with(":Rating") || key.as_str() == "Rating")
        .filter_map(|(_, value)| {
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .filter(|r| *r >= 1.0)
        .map(|r| r.round().min(5.0) as u8)
        .max();

    Ok(rating)
}
