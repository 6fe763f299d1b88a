//! In-process stand-ins for external collaborators

use aiia_common::events::{ProgressEvent, ProgressSink};
use aiia_pipeline::services::backends::{BackendError, VisionBackend};
use aiia_pipeline::services::exiftool_client::{MetadataTool, MetadataToolError, TagMap};
use aiia_pipeline::services::image_prep::PreparedImage;
use aiia_pipeline::services::quality_scorer::{IqaMetric, ScoreError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Metric returning a fixed score per file name; unknown files fail
pub struct FixedScoreMetric {
    scores: HashMap<String, f64>,
    lower_is_better: bool,
}

impl FixedScoreMetric {
    pub fn new(scores: &[(&str, f64)], lower_is_better: bool) -> Self {
        Self {
            scores: scores.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            lower_is_better,
        }
    }
}

#[async_trait]
impl IqaMetric for FixedScoreMetric {
    fn name(&self) -> &str {
        "fixed"
    }

    fn lower_is_better(&self) -> bool {
        self.lower_is_better
    }

    async fn score(&self, path: &Path) -> Result<f64, ScoreError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.scores
            .get(&name)
            .copied()
            .ok_or_else(|| ScoreError::MetricFailed(format!("no score for {}", name)))
    }
}

/// One scripted backend reply
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
}

/// Backend replaying scripted replies; repeats the last one when exhausted
pub struct ScriptedBackend {
    name: String,
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(name: &str, replies: Vec<Reply>) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always(name: &str, reply: Reply) -> Self {
        Self::new(name, vec![reply])
    }

    /// Shared call counter, readable after the backend is boxed
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _prompt: &str, _image: &PreparedImage) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self.last.lock().unwrap().clone().unwrap_or(Reply::Fail),
        };
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail => Err(BackendError::NetworkError("connection refused".to_string())),
        }
    }
}

/// Metadata tool keeping ratings and writes in memory
#[derive(Default)]
pub struct FakeMetadataTool {
    existing: Mutex<HashMap<PathBuf, u8>>,
    writes: Mutex<Vec<(PathBuf, TagMap)>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl FakeMetadataTool {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    /// Writes succeed but the existing rating cannot be read
    pub fn unreadable() -> Self {
        Self {
            fail_reads: true,
            ..Default::default()
        }
    }

    pub fn with_rating(self, path: &Path, rating: u8) -> Self {
        self.existing.lock().unwrap().insert(path.to_path_buf(), rating);
        self
    }

    pub fn writes(&self) -> Vec<(PathBuf, TagMap)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataTool for FakeMetadataTool {
    async fn read_rating(&self, path: &Path) -> Result<Option<u8>, MetadataToolError> {
        if self.fail_reads {
            return Err(MetadataToolError::ToolFailed(
                path.to_path_buf(),
                "Error: File is locked".to_string(),
            ));
        }
        Ok(self.existing.lock().unwrap().get(path).copied())
    }

    async fn write_tags(&self, path: &Path, tags: &TagMap) -> Result<(), MetadataToolError> {
        if self.fail_writes {
            return Err(MetadataToolError::ToolFailed(
                path.to_path_buf(),
                "Error: File format error".to_string(),
            ));
        }
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone()));
        Ok(())
    }
}

/// Sink recording every event in order
#[derive(Default, Clone)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(|e| e.to_line()).collect()
    }

    pub fn any_line_starts_with(&self, prefix: &str) -> bool {
        self.lines().iter().any(|l| l.starts_with(prefix))
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
