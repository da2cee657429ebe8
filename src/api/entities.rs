use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch::{EventType, MutationContext};
use crate::error::{AppError, Result};
use crate::serializer::JsonEntity;
use crate::server::AppState;

/// Mutation reported by the owning application.
///
/// For deletions the caller must report before removing the record.
#[derive(Debug, Deserialize)]
pub struct EntityEventRequest {
    pub event: EventType,
    /// Current field values; required for everything except `sync`
    #[serde(default)]
    pub instance: Option<Map<String, Value>>,
    /// Channels the instance itself announces on
    #[serde(default)]
    pub instance_channels: Vec<String>,
    /// Context-level channels
    #[serde(default)]
    pub channels: Vec<String>,
    /// Attach the `X-Pusher-Socket-Id` socket so it does not receive the echo
    #[serde(default)]
    pub exclude_origin: bool,
}

#[derive(Debug, Serialize)]
pub struct EntityEventResponse {
    pub dispatched: usize,
}

/// POST /api/v1/entities/{entity}/events
pub async fn entity_event(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(request): Json<EntityEventRequest>,
) -> Result<Json<EntityEventResponse>> {
    let ctx = MutationContext::from_headers(&headers)
        .with_channels(request.channels)
        .excluding_origin(request.exclude_origin);

    let dispatched = match (request.event, request.instance) {
        (EventType::Sync, _) => state.dispatcher.sync(&ctx, &entity).await?,
        (event, Some(attributes)) => {
            let instance =
                JsonEntity::new(entity.clone(), attributes).with_channels(request.instance_channels);
            state
                .dispatcher
                .push_changes(&ctx, &entity, event, Some(&instance))
                .await?
        }
        (event, None) => {
            return Err(AppError::Validation(format!(
                "instance is required for '{}' events",
                event
            )));
        }
    };

    tracing::debug!(entity = %entity, dispatched, "Entity event handled");
    Ok(Json(EntityEventResponse { dispatched }))
}
