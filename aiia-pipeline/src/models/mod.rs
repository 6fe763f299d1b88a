//! Pipeline-internal models

pub mod pipeline_run;

pub use pipeline_run::{PipelineRun, PipelineState, StateTransition};
