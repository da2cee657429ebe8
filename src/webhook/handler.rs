use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::error::{AppError, Result};
use crate::metrics::WebhookMetrics;
use crate::server::AppState;

use super::{reconcile, ReconcileSummary};

pub const WEBHOOK_KEY_HEADER: &str = "x-pusher-key";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-pusher-signature";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /pusher/channel-existence
///
/// Signature failures are rejected before the cache is touched.
pub async fn channel_existence(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ReconcileSummary>)> {
    let payload = state
        .transport
        .validate_webhook(
            header_str(&headers, WEBHOOK_KEY_HEADER),
            header_str(&headers, WEBHOOK_SIGNATURE_HEADER),
            &body,
        )
        .inspect_err(|e| {
            let reason = match e {
                AppError::Auth(_) => "auth",
                _ => "malformed",
            };
            WebhookMetrics::record_rejected(reason);
            tracing::warn!(reason, error = %e, "Webhook rejected");
        })?;

    let summary = reconcile(state.occupancy.as_ref(), &payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}
