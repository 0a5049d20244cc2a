//! Error types for the pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by individual pipeline stages.
///
/// Most failures are absorbed by stage-level fallbacks (keyword
/// classification, passing the original sentence through); these variants
/// are for the places where a stage genuinely cannot continue.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An LLM call failed.
    #[error("LLM error: {0}")]
    Llm(#[from] llm::LlmError),

    /// A geocoding call failed.
    #[error("Geocoding error: {0}")]
    Geocode(#[from] geocoder::GeocodeError),

    /// A graph operation failed.
    #[error("Graph error: {0}")]
    Graph(#[from] graph_store::GraphError),

    /// An LLM response did not conform to the declared JSON schema.
    #[error("Schema violation: {0}")]
    Schema(String),

    /// An LLM response was not parseable JSON.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}
