//! Per-stage model selection.

use serde::{Deserialize, Serialize};

/// Which model each pipeline stage calls.
///
/// Canonicalisation and causal inference carry the most context and get the
/// larger model; the schema-constrained extraction stages run on the small
/// one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub classify: String,
    pub canonicalise: String,
    pub extract: String,
    pub modification: String,
    pub causal: String,
    pub ask: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classify: "gpt-5-nano".to_string(),
            canonicalise: "gpt-5-mini".to_string(),
            extract: "gpt-5-nano".to_string(),
            modification: "gpt-5-nano".to_string(),
            causal: "gpt-5-mini".to_string(),
            ask: "gpt-5-nano".to_string(),
        }
    }
}
