//! Text-to-hypergraph ingestion pipeline.
//!
//! The multi-stage streaming machine that turns raw text into validated
//! structured facts and graph mutations:
//!
//! ```text
//! text -> classifier -> {regular, modification}
//!   regular, per sentence: canonicalise -> extract -> expand -> write
//!   after all temporal writes succeed: causal inference -> write
//!   modifications: extract -> apply directly
//! ```
//!
//! Sentences are processed concurrently; stages within one sentence are
//! strictly ordered, and every stage emits one [`events::ProgressEvent`].

pub mod canonical;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod modification;
pub mod orchestrator;
pub mod spatial;
pub mod state;
pub mod text;

pub use config::ModelConfig;
pub use error::{PipelineError, Result};
pub use events::{ProgressEvent, Stage};
pub use orchestrator::{Pipeline, PipelineReport};
