//! Graph read/write handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde_json::json;

use graph_store::SpatioTemporalFilter;
use hypergraph::{Geometry, TemporalFact};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddHyperedgeRequest, AddHyperedgeResponse, DataParams, HyperstructureData,
    HyperstructureResponse,
};
use crate::state::AppState;

/// Handler for `GET /` - liveness probe.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({"message": "Spatiotemporal hypergraph ingestion API"}))
}

/// Handler for `POST /api/hyperedge/add`.
///
/// Writes a prebuilt fact, bypassing the NL front-end, and returns the
/// resolved spatial data for map display.
pub async fn add_hyperedge(
    State(state): State<AppState>,
    Json(request): Json<AddHyperedgeRequest>,
) -> ApiResult<Json<AddHyperedgeResponse>> {
    if request.subjects.is_empty() || request.relation_type.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "subjects and relation_type are required".to_string(),
        ));
    }

    let pipeline = state.pipeline().await?;
    let store = pipeline
        .store()
        .ok_or_else(|| ApiError::Unavailable("graph store is not connected".to_string()))?;

    let fact = TemporalFact {
        subjects: request.subjects,
        objects: request.objects,
        relation_type: request.relation_type,
        temporal_intervals: request.temporal_intervals,
        spatial_contexts: request.spatial_contexts,
    };
    let hyperedge_id = store.write_fact(&fact).await?;

    // Only geometry that can be drawn goes back to the map.
    let spatial_data = fact
        .spatial_contexts
        .into_iter()
        .filter(|ctx| !matches!(ctx.geometry, Geometry::Point(None) | Geometry::Unknown))
        .collect::<Vec<_>>();

    Ok(Json(AddHyperedgeResponse {
        status: "success".to_string(),
        message: format!(
            "Successfully added hyperedge with {} spatial contexts",
            spatial_data.len()
        ),
        hyperedge_id: Some(hyperedge_id),
        spatial_data,
    }))
}

/// Handler for `POST /api/hyperstructure/clear` - delete every node and
/// edge.
pub async fn clear_hyperstructure(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let pipeline = state.pipeline().await?;
    let store = pipeline
        .store()
        .ok_or_else(|| ApiError::Unavailable("graph store is not connected".to_string()))?;
    store.clear().await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Successfully cleared all hyperstructure data from the database"
    })))
}

fn parse_area(raw: &str) -> Result<Vec<[f64; 2]>, ApiError> {
    let pairs: Vec<[f64; 2]> = serde_json::from_str(raw).map_err(|_| {
        ApiError::BadRequest("Invalid JSON format for location coordinates".to_string())
    })?;
    if pairs.len() < 3 {
        return Err(ApiError::BadRequest(
            "Location coordinates must contain at least 3 [lon, lat] pairs".to_string(),
        ));
    }
    Ok(pairs)
}

/// Handler for `GET /api/hyperstructure/data` - read-side spatiotemporal
/// query in the visualisation format.
pub async fn get_hyperstructure_data(
    State(state): State<AppState>,
    Query(params): Query<DataParams>,
) -> ApiResult<Json<HyperstructureResponse>> {
    let pipeline = state.pipeline().await?;
    let store = pipeline
        .store()
        .ok_or_else(|| ApiError::Unavailable("graph store is not connected".to_string()))?;

    let location_names = params.location_names.as_deref().map(|names| {
        names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    let location_coordinates = params
        .location_coordinates
        .as_deref()
        .map(parse_area)
        .transpose()?;

    let filter = SpatioTemporalFilter {
        start_time: params.start_time.clone(),
        end_time: params.end_time.clone(),
        location_names,
        location_coordinates,
        include_spatially_unconstrained: params.include_spatially_unconstrained,
        include_temporally_unconstrained: params.include_temporally_unconstrained,
    };

    let hyperedges = if filter.is_empty() {
        store.fetch_hyperedges(None).await?
    } else {
        let ids: Vec<String> = store.query_spatiotemporal(&filter).await?.into_iter().collect();
        store.fetch_hyperedges(Some(&ids)).await?
    };

    let mut entities: Vec<String> = hyperedges
        .iter()
        .flat_map(|h| h.entities.iter().cloned())
        .collect();
    entities.sort();
    entities.dedup();

    let message = format!(
        "Retrieved {} hyperedges and {} entities",
        hyperedges.len(),
        entities.len()
    );
    Ok(Json(HyperstructureResponse {
        status: "success".to_string(),
        message,
        hyperstructure_data: Some(HyperstructureData {
            name: "Neo4j Hyperstructure".to_string(),
            entities,
            hyperedge_count: hyperedges.len(),
            hyperedges,
        }),
    }))
}
