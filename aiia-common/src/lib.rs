//! Shared types for the AI image analysis pipeline
//!
//! Holds everything a front-end (CLI, desktop GUI, web wrapper) needs to
//! drive the pipeline and interpret its output without linking the pipeline
//! itself:
//! - [`models`] - the Classification / ProcessingResult data model
//! - [`taxonomy`] - persona table and controlled vocabularies
//! - [`events`] - progress sink abstraction and sentinel protocol
//! - [`config`] - configuration file discovery

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod taxonomy;

pub use error::{Error, Result};
