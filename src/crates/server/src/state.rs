//! Shared application state.

use std::sync::Arc;

use tokio::sync::OnceCell;

use pipeline::Pipeline;

use crate::error::ApiError;

/// Shared state: the pipeline handle behind a one-shot async guard.
///
/// The pipeline (and its graph connection) is built lazily on the first
/// request that needs it; concurrent first requests share one
/// initialisation.
#[derive(Clone, Default)]
pub struct AppState {
    pipeline: Arc<OnceCell<Arc<Pipeline>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with a pre-built pipeline, for tests and embedding.
    pub fn with_pipeline(pipeline: Arc<Pipeline>) -> Self {
        let cell = OnceCell::new();
        // A fresh cell cannot already be set.
        let _ = cell.set(pipeline);
        Self {
            pipeline: Arc::new(cell),
        }
    }

    /// The shared pipeline, initialising it from the environment on first
    /// use.
    pub async fn pipeline(&self) -> Result<Arc<Pipeline>, ApiError> {
        self.pipeline
            .get_or_try_init(|| async {
                Pipeline::from_env()
                    .await
                    .map(Arc::new)
                    .map_err(|error| ApiError::Unavailable(error.to_string()))
            })
            .await
            .cloned()
    }
}
