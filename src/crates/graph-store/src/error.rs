//! Error types for the graph store.

use thiserror::Error;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur when talking to the graph store.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Missing or invalid connection configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Driver-level failure (connection, auth, protocol, query).
    #[error("Graph driver error: {0}")]
    Driver(#[from] neo4rs::Error),

    /// A row did not contain the expected columns.
    #[error("Unexpected result shape: {0}")]
    ResultShape(String),

    /// The record cannot be written as requested.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
