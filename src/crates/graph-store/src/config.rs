//! Connection configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Configuration for the Neo4j connection, read from `NEO4J_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    /// Target database, defaults to `neo4j`.
    pub database: String,
}

impl GraphConfig {
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            username: username.into(),
            password: password.into(),
            database: "neo4j".to_string(),
        }
    }

    /// Read `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD` and
    /// `NEO4J_DATABASE`. Missing credentials are a fatal configuration
    /// error for this component.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| GraphError::Config(format!("{name} is not set")))
        };
        Ok(Self {
            uri: var("NEO4J_URI")?,
            username: var("NEO4J_USERNAME")?,
            password: var("NEO4J_PASSWORD")?,
            database: std::env::var("NEO4J_DATABASE").unwrap_or_else(|_| "neo4j".to_string()),
        })
    }

    /// Set the target database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}
