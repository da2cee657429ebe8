use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};
use crate::webhook::channel_existence;

use super::entities::entity_event;
use super::health::{health, stats};
use super::introspection::{channel_occupancy, list_backends};
use super::metrics::prometheus_metrics;
use super::push::push_event;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Webhook (authenticated by signature)
        .route("/pusher/channel-existence", post(channel_existence))
        // Dispatch endpoints
        .nest(
            "/api/v1",
            Router::new()
                .route("/entities/{entity}/events", post(entity_event))
                .route("/push", post(push_event))
                .route("/backends", get(list_backends))
                .route("/occupancy/{channel}", get(channel_occupancy))
                .layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
