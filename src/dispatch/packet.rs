use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Kind of mutation being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Create,
    Update,
    PartialUpdate,
    Delete,
    /// No payload; subscribers should re-fetch
    Sync,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::PartialUpdate => "partial_update",
            EventType::Delete => "delete",
            EventType::Sync => "sync",
        }
    }

    /// Whether the event is announced before the instance is removed.
    pub fn is_pre_destroy(&self) -> bool {
        matches!(self, EventType::Delete)
    }

    pub fn carries_payload(&self) -> bool {
        !matches!(self, EventType::Sync)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(EventType::Create),
            "update" => Ok(EventType::Update),
            "partial_update" => Ok(EventType::PartialUpdate),
            "delete" => Ok(EventType::Delete),
            "sync" => Ok(EventType::Sync),
            other => Err(AppError::Validation(format!("unknown event type '{}'", other))),
        }
    }
}

/// Resolved delivery envelope handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    channels: Vec<String>,
    event_name: String,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin_socket: Option<String>,
}

impl Packet {
    /// Build a packet, removing duplicate channels (first occurrence wins).
    ///
    /// Fails if no channel remains or the event name is empty.
    pub fn new(
        channels: Vec<String>,
        event_name: impl Into<String>,
        data: Value,
        origin_socket: Option<String>,
    ) -> Result<Self> {
        let event_name = event_name.into();
        if event_name.is_empty() {
            return Err(AppError::Configuration(
                "packet requires an event name".to_string(),
            ));
        }

        let channels = dedup_channels(channels);
        if channels.is_empty() {
            return Err(AppError::Configuration(format!(
                "no channels resolved for '{}'",
                event_name
            )));
        }

        Ok(Self {
            channels,
            event_name,
            data,
            origin_socket,
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Socket the transport should not echo this packet back to.
    pub fn origin_socket(&self) -> Option<&str> {
        self.origin_socket.as_deref()
    }
}

/// Order-preserving de-duplication.
pub(crate) fn dedup_channels(channels: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(channels.len());
    channels
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}
