use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::provider::{channels_from_value, validate_channels};
use crate::server::AppState;

/// Request to push an arbitrary event
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    /// Must be a list of channel names
    #[serde(default)]
    pub channels: Value,
    /// Event name (e.g., "announcement.published")
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Value,
    /// Socket to exclude from delivery
    pub socket_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub success: bool,
    pub channels: usize,
}

/// POST /api/v1/push
pub async fn push_event(
    State(state): State<AppState>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>> {
    let channels = channels_from_value(&request.channels)?;
    validate_channels(&channels)?;

    if request.event.is_empty() {
        return Err(AppError::Validation("event must not be empty".to_string()));
    }

    let data = match request.data {
        Value::Null => Value::Object(Default::default()),
        data => data,
    };
    let count = channels.len();

    state
        .dispatcher
        .push(channels, &request.event, data, request.socket_id)
        .await?;

    Ok(Json(PushResponse {
        success: true,
        channels: count,
    }))
}
