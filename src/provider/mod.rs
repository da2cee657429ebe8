//! Delivery providers.
//!
//! A provider receives fully resolved packets from the delivery receiver and
//! decides whether, and to which channels, they reach the transport.

mod channels;
mod pusher;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use channels::{
    channels_from_value, is_valid_channel_name, validate_channels, MAX_CHANNELS_PER_TRIGGER,
    MAX_CHANNEL_NAME_LEN,
};
pub use pusher::PusherProvider;

#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Name the delivery receiver resolves hints against
    fn name(&self) -> &str;

    async fn trigger(
        &self,
        channels: &[String],
        event_name: &str,
        data: &Value,
        socket_id: Option<&str>,
    ) -> Result<()>;
}

/// Validates and discards every trigger.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait]
impl DeliveryProvider for NoopProvider {
    fn name(&self) -> &str {
        "noop"
    }

    async fn trigger(
        &self,
        channels: &[String],
        event_name: &str,
        _data: &Value,
        _socket_id: Option<&str>,
    ) -> Result<()> {
        validate_channels(channels)?;
        tracing::debug!(event_name = %event_name, channels = ?channels, "Noop provider discarded trigger");
        Ok(())
    }
}
