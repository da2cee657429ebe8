//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::dispatch::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub occupancy: OccupancyHealthResponse,
    pub dispatch: DispatchHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct OccupancyHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct DispatchHealthResponse {
    pub backends: usize,
    pub disabled: bool,
    pub webhook_optimisation_enabled: bool,
    pub default_provider: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub dispatcher: DispatcherStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatch = &state.settings.dispatch;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        occupancy: OccupancyHealthResponse {
            backend: state.occupancy.backend_name().to_string(),
        },
        dispatch: DispatchHealthResponse {
            backends: state.registry.len(),
            disabled: dispatch.disabled,
            webhook_optimisation_enabled: dispatch.webhook_optimisation_enabled,
            default_provider: dispatch.default_provider.clone(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        dispatcher: state.dispatcher.stats().snapshot(),
    })
}
