//! No-reference image quality scoring
//!
//! [`QualityScorer`] wraps one [`IqaMetric`] chosen by name and degrades to
//! a deterministic heuristic:
//! - metric not loadable: try `brisque`, then the heuristic for the whole run
//! - metric fails on one image: heuristic for that image only
//! - image unreadable: `None`, excluded from curation
//!
//! Metric providers:
//! - [`PyIqaMetric`]: external `pyiqa` command-line scorer, any known metric
//! - [`SharpnessMetric`]: built-in variance of the Laplacian
//! - [`HeuristicMetric`]: resolution / compression / aspect ratio

use async_trait::async_trait;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// Metric used when the requested one cannot be loaded
pub const FALLBACK_METRIC: &str = "brisque";

/// Per-image limit for the external scorer
pub const DEFAULT_IQA_TIMEOUT: Duration = Duration::from_secs(120);

/// Quality scoring errors
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Image file missing
    #[error("Image file not found: {0}")]
    FileNotFound(PathBuf),

    /// Image could not be decoded or measured
    #[error("Cannot read image {0}: {1}")]
    Unreadable(PathBuf, String),

    /// Metric name or scorer binary unavailable
    #[error("IQA metric unavailable: {0}")]
    MetricUnavailable(String),

    /// Scorer ran but failed
    #[error("IQA metric failed: {0}")]
    MetricFailed(String),

    /// Scorer output carried no score
    #[error("Failed to parse IQA output: {0}")]
    ParseError(String),

    /// Scorer did not finish in time and was killed
    #[error("IQA metric timed out after {0}s")]
    Timeout(u64),
}

/// A no-reference quality metric addressed by name
#[async_trait]
pub trait IqaMetric: Send + Sync {
    /// Metric name as reported in results (e.g. `brisque`)
    fn name(&self) -> &str;

    /// Ordering convention: `true` if smaller scores mean better quality
    fn lower_is_better(&self) -> bool;

    /// Score one image
    async fn score(&self, path: &Path) -> Result<f64, ScoreError>;
}

/// Ordering convention of known metrics, `Some(lower_is_better)`
pub fn metric_direction(name: &str) -> Option<bool> {
    match name.to_ascii_lowercase().as_str() {
        "brisque" | "niqe" | "ilniqe" | "piqe" | "pi" => Some(true),
        "musiq" | "musiq-koniq" | "musiq-spaq" | "musiq-ava" | "topiq_nr" | "clipiqa"
        | "clipiqa+" | "nima" | "maniqa" | "dbcnn" | "hyperiqa" | "paq2piq" | "nrqm"
        | "sharpness" | "heuristic" => Some(false),
        _ => None,
    }
}

/// Deterministic fallback score, higher is better, range 0-100
///
/// Pure function of file size and pixel dimensions.
pub fn heuristic_score(file_bytes: u64, width: u32, height: u32) -> f64 {
    if width == 0 || height == 0 {
        return 0.0;
    }

    let pixels = width as f64 * height as f64;
    let resolution = (pixels / 10_000.0).min(100.0);
    let compression = (file_bytes as f64 / pixels * 100.0).min(100.0);
    let ratio = width as f64 / height as f64;
    let aspect = ratio.min(1.0 / ratio) * 100.0;

    resolution * 0.4 + compression * 0.4 + aspect * 0.2
}

/// Heuristic metric: reads only the file size and the image header
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicMetric;

#[async_trait]
impl IqaMetric for HeuristicMetric {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn lower_is_better(&self) -> bool {
        false
    }

    async fn score(&self, path: &Path) -> Result<f64, ScoreError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let bytes = std::fs::metadata(&path)
                .map_err(|_| ScoreError::FileNotFound(path.clone()))?
                .len();
            let (width, height) = image::image_dimensions(&path)
                .map_err(|e| ScoreError::Unreadable(path.clone(), e.to_string()))?;
            Ok(heuristic_score(bytes, width, height))
        })
        .await
        .map_err(|e| ScoreError::MetricFailed(e.to_string()))?
    }
}

/// Built-in sharpness metric (variance of the Laplacian)
#[derive(Debug, Clone, Copy)]
pub struct SharpnessMetric {
    /// Images are downscaled so the longest edge is at most this
    max_dimension: u32,
}

impl SharpnessMetric {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl Default for SharpnessMetric {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl IqaMetric for SharpnessMetric {
    fn name(&self) -> &str {
        "sharpness"
    }

    fn lower_is_better(&self) -> bool {
        false
    }

    async fn score(&self, path: &Path) -> Result<f64, ScoreError> {
        let path = path.to_path_buf();
        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || {
            let img = image::open(&path)
                .map_err(|e| ScoreError::Unreadable(path.clone(), e.to_string()))?;
            let img = if img.width().max(img.height()) > max_dimension {
                img.thumbnail(max_dimension, max_dimension)
            } else {
                img
            };
            Ok(laplacian_variance(&img.to_luma8()))
        })
        .await
        .map_err(|e| ScoreError::MetricFailed(e.to_string()))?
    }
}

/// Variance of the 3x3 Laplacian over a grayscale image
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0.0;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = img.get_pixel(x, y)[0] as i32;
            let top = img.get_pixel(x, y - 1)[0] as i32;
            let bottom = img.get_pixel(x, y + 1)[0] as i32;
            let left = img.get_pixel(x - 1, y)[0] as i32;
            let right = img.get_pixel(x + 1, y)[0] as i32;

            let laplacian = (top + bottom + left + right - 4 * center) as f64;
            sum += laplacian;
            sum_sq += laplacian * laplacian;
            count += 1.0;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

/// External pyiqa command-line scorer
///
/// Invoked as `<command> <metric> -t <image>`; the score is the last number
/// printed on stdout.
pub struct PyIqaMetric {
    command: String,
    metric: String,
    lower_is_better: bool,
    timeout: Duration,
}

impl PyIqaMetric {
    /// Resolve a metric by name and verify the scorer is runnable
    pub fn load(command: &str, metric: &str) -> Result<Self, ScoreError> {
        let metric = metric.to_ascii_lowercase();
        let lower_is_better = metric_direction(&metric)
            .ok_or_else(|| ScoreError::MetricUnavailable(format!("unknown metric '{}'", metric)))?;

        match Command::new(command).arg("-ls").output() {
            Ok(output) if output.status.success() => Ok(Self {
                command: command.to_string(),
                metric,
                lower_is_better,
                timeout: DEFAULT_IQA_TIMEOUT,
            }),
            Ok(output) => Err(ScoreError::MetricUnavailable(format!(
                "{} -ls exited with {}",
                command, output.status
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                ScoreError::MetricUnavailable(format!("{} not found in PATH", command)),
            ),
            Err(e) => Err(ScoreError::MetricUnavailable(e.to_string())),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl IqaMetric for PyIqaMetric {
    fn name(&self) -> &str {
        &self.metric
    }

    fn lower_is_better(&self) -> bool {
        self.lower_is_better
    }

    async fn score(&self, path: &Path) -> Result<f64, ScoreError> {
        if !path.is_file() {
            return Err(ScoreError::FileNotFound(path.to_path_buf()));
        }

        let mut command = tokio::process::Command::new(&self.command);
        command.arg(&self.metric).arg("-t").arg(path).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ScoreError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ScoreError::MetricFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScoreError::MetricFailed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_last_number(&stdout).ok_or_else(|| ScoreError::ParseError(stdout.trim().to_string()))
    }
}

/// Last finite floating-point token in scorer output
pub fn parse_last_number(output: &str) -> Option<f64> {
    output
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':' || c == '=')
        .rev()
        .filter_map(|token| {
            token
                .trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                .parse::<f64>()
                .ok()
        })
        .find(|v| v.is_finite())
}

/// Quality scorer with fallback
pub struct QualityScorer {
    metric: Box<dyn IqaMetric>,
    fallback: HeuristicMetric,
}

impl QualityScorer {
    /// Load the named metric, falling back to brisque, then the heuristic
    pub fn load(metric_name: &str, iqa_command: &str, timeout: Duration) -> Self {
        let metric: Box<dyn IqaMetric> = match metric_name.to_ascii_lowercase().as_str() {
            "sharpness" => Box::new(SharpnessMetric::default()),
            "heuristic" => Box::new(HeuristicMetric),
            name => match PyIqaMetric::load(iqa_command, name) {
                Ok(metric) => Box::new(metric.with_timeout(timeout)),
                Err(e) => {
                    tracing::warn!(metric = name, error = %e, "IQA metric not loadable");
                    Self::load_fallback(name, iqa_command, timeout)
                }
            },
        };

        tracing::info!(
            metric = metric.name(),
            lower_is_better = metric.lower_is_better(),
            "Quality scorer ready"
        );
        Self::with_metric(metric)
    }

    fn load_fallback(requested: &str, iqa_command: &str, timeout: Duration) -> Box<dyn IqaMetric> {
        if requested != FALLBACK_METRIC {
            match PyIqaMetric::load(iqa_command, FALLBACK_METRIC) {
                Ok(metric) => {
                    tracing::warn!("Falling back to {} metric", FALLBACK_METRIC);
                    return Box::new(metric.with_timeout(timeout));
                }
                Err(e) => {
                    tracing::warn!(metric = FALLBACK_METRIC, error = %e, "Fallback metric not loadable");
                }
            }
        }
        tracing::warn!("Using heuristic quality scoring");
        Box::new(HeuristicMetric)
    }

    /// Use a specific metric provider
    pub fn with_metric(metric: Box<dyn IqaMetric>) -> Self {
        Self {
            metric,
            fallback: HeuristicMetric,
        }
    }

    pub fn metric_name(&self) -> &str {
        self.metric.name()
    }

    pub fn lower_is_better(&self) -> bool {
        self.metric.lower_is_better()
    }

    /// Score one image; `None` if it cannot be scored at all
    ///
    /// A per-image heuristic fallback under a lower-is-better metric is
    /// reported as `100 - h` so it sorts in the metric's direction.
    pub async fn score(&self, path: &Path) -> Option<f64> {
        if !path.is_file() {
            tracing::debug!(file = %path.display(), "Skipping missing image");
            return None;
        }

        match self.metric.score(path).await {
            Ok(score) if score.is_finite() => return Some(score),
            Ok(score) => {
                tracing::warn!(file = %path.display(), score, "Non-finite quality score, using heuristic");
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), metric = self.metric.name(), error = %e, "Quality metric failed, using heuristic");
            }
        }

        match self.fallback.score(path).await {
            Ok(h) if self.lower_is_better() => Some(100.0 - h),
            Ok(h) => Some(h),
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Image not scorable");
                None
            }
        }
    }
}
