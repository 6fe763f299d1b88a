//! aiia-pipeline library interface
//!
//! Quality curation, vision-backend analysis and metadata persistence for
//! photo collections. The binary in `main.rs` is a thin CLI over
//! [`WorkflowOrchestrator`].

pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod services;

pub use crate::config::{BackendKind, MetadataMode, PipelineConfig};
pub use crate::error::{ConfigError, PipelineError};
pub use crate::services::WorkflowOrchestrator;
