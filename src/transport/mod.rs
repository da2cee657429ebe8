//! Real-time delivery transport.
//!
//! The dispatcher only relies on three operations of the messaging service:
//! triggering an event on a set of channels, listing occupied channels, and
//! validating webhook deliveries. [`PusherClient`] implements them against
//! the Pusher Channels HTTP API.

mod pusher;
mod signature;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;
use crate::webhook::WebhookPayload;

pub use pusher::PusherClient;
pub use signature::{constant_time_eq, hmac_hex, signed_query, validate_webhook};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

/// Body of a trigger call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub name: String,
    pub channels: Vec<String>,
    /// JSON-encoded event data
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

impl TriggerRequest {
    pub fn new(
        channels: &[String],
        event_name: &str,
        data: &Value,
        socket_id: Option<&str>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            name: event_name.to_string(),
            channels: channels.to_vec(),
            data: serde_json::to_string(data)?,
            socket_id: socket_id.map(str::to_string),
        })
    }
}

/// Response of the channel introspection call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelsInfo {
    #[serde(default)]
    pub channels: HashMap<String, Value>,
}

impl ChannelsInfo {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: names
                .into_iter()
                .map(|n| (n.into(), Value::Object(Default::default())))
                .collect(),
        }
    }

    /// Occupied channel names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn trigger(&self, request: &TriggerRequest) -> Result<(), TransportError>;

    /// Currently occupied channels.
    async fn channels_info(&self) -> Result<ChannelsInfo, TransportError>;

    /// Authenticate a webhook delivery and parse its payload.
    fn validate_webhook(
        &self,
        key: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookPayload, AppError>;
}
