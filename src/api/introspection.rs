use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::occupancy::Occupancy;
use crate::registry::BackendSummary;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct BackendsResponse {
    pub backends: Vec<BackendSummary>,
}

#[derive(Debug, Serialize)]
pub struct OccupancyResponse {
    pub channel: String,
    pub occupancy: Occupancy,
}

/// GET /api/v1/backends - registered backends in registration order
pub async fn list_backends(State(state): State<AppState>) -> Json<BackendsResponse> {
    let backends = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| d.summary())
        .collect();

    Json(BackendsResponse { backends })
}

/// GET /api/v1/occupancy/{channel}
pub async fn channel_occupancy(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<OccupancyResponse>> {
    let occupancy = state.occupancy.get(&channel).await?;
    Ok(Json(OccupancyResponse { channel, occupancy }))
}
