//! API request and response models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hypergraph::{SpatialContext, TemporalInterval};
use graph_store::HyperedgeData;

fn default_chunk_size() -> usize {
    3
}

fn default_max_loops() -> usize {
    3
}

/// Request model for processing text through the pipeline.
#[derive(Debug, Deserialize)]
pub struct ProcessTextRequest {
    pub text: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Response model for text processing.
#[derive(Debug, Serialize)]
pub struct ProcessTextResponse {
    pub status: String,
    pub message: String,
    pub facts_processed: usize,
}

/// Query parameters of the SSE streaming endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub text: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Request model for adding a prebuilt hyperedge.
#[derive(Debug, Deserialize)]
pub struct AddHyperedgeRequest {
    pub subjects: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    pub relation_type: String,
    #[serde(default)]
    pub temporal_intervals: Vec<TemporalInterval>,
    #[serde(default)]
    pub spatial_contexts: Vec<SpatialContext>,
}

/// Response model for adding a hyperedge.
#[derive(Debug, Serialize)]
pub struct AddHyperedgeResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperedge_id: Option<String>,
    pub spatial_data: Vec<SpatialContext>,
}

/// Query parameters of the read-side data endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Comma-separated location names.
    pub location_names: Option<String>,
    /// JSON array of `[lon, lat]` pairs.
    pub location_coordinates: Option<String>,
    #[serde(default)]
    pub include_spatially_unconstrained: bool,
    #[serde(default)]
    pub include_temporally_unconstrained: bool,
}

/// The visualisation payload.
#[derive(Debug, Serialize)]
pub struct HyperstructureData {
    pub name: String,
    pub entities: Vec<String>,
    pub hyperedges: Vec<HyperedgeData>,
    pub hyperedge_count: usize,
}

/// Response wrapper for the data endpoint.
#[derive(Debug, Serialize)]
pub struct HyperstructureResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperstructure_data: Option<HyperstructureData>,
}

/// Request model for the ask loop.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub message: String,
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,
}

/// One tool invocation in the ask trace.
#[derive(Debug, Serialize)]
pub struct ToolTraceEntry {
    pub loop_index: usize,
    pub tool: String,
    pub args: Value,
    pub result: Value,
}

/// Response model for the ask loop.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub status: String,
    pub valid: bool,
    pub descriptor: String,
    pub tool_trace: Vec<ToolTraceEntry>,
}
