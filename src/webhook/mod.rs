//! Channel-existence webhook ingestion.
//!
//! The messaging service reports occupancy transitions in batches; each
//! `channel_occupied` / `channel_vacated` event is written to the occupancy
//! cache in the order received. This is the only externally driven write
//! path into the cache.

mod handler;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::WebhookMetrics;
use crate::occupancy::OccupancyCache;

pub use handler::{channel_existence, WEBHOOK_KEY_HEADER, WEBHOOK_SIGNATURE_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventName {
    ChannelOccupied,
    ChannelVacated,
    /// Any other webhook event (member_added, client_event, ...)
    #[serde(other)]
    Other,
}

impl WebhookEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventName::ChannelOccupied => "channel_occupied",
            WebhookEventName::ChannelVacated => "channel_vacated",
            WebhookEventName::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub name: WebhookEventName,
    #[serde(default)]
    pub channel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub time_ms: i64,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// Counts of events applied from one webhook delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub occupied: usize,
    pub vacated: usize,
    pub ignored: usize,
}

/// Apply a validated payload to the cache, in event order.
#[tracing::instrument(name = "webhook.reconcile", skip_all, fields(events = payload.events.len()))]
pub async fn reconcile(
    cache: &dyn OccupancyCache,
    payload: &WebhookPayload,
) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();

    for event in &payload.events {
        WebhookMetrics::record_event(event.name.as_str());

        match event.name {
            WebhookEventName::ChannelOccupied if !event.channel.is_empty() => {
                cache.set_occupied(&event.channel).await?;
                summary.occupied += 1;
                tracing::debug!(channel = %event.channel, "Channel occupied");
            }
            WebhookEventName::ChannelVacated if !event.channel.is_empty() => {
                cache.set_vacated(&event.channel).await?;
                summary.vacated += 1;
                tracing::debug!(channel = %event.channel, "Channel vacated");
            }
            _ => summary.ignored += 1,
        }
    }

    tracing::info!(
        occupied = summary.occupied,
        vacated = summary.vacated,
        ignored = summary.ignored,
        "Webhook applied"
    );
    Ok(summary)
}
