use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Anything that can contribute channel names to a dispatch.
///
/// Contexts, serialized records and entity instances may each implement it;
/// the dispatch backend unions whatever they return.
pub trait ChannelSource: Send + Sync {
    fn channels(&self) -> Vec<String>;
}

/// A tracked data record.
pub trait Entity: Send + Sync {
    /// Type name, e.g. `Widget`. Lowercased to form registry keys and event names.
    fn entity_type(&self) -> &str;

    /// Current field values of the live instance.
    fn attributes(&self) -> Result<Map<String, Value>, serde_json::Error>;

    /// Instance-level channels, if the entity knows where it should be announced.
    fn channel_source(&self) -> Option<&dyn ChannelSource> {
        None
    }
}

/// Entity backed by a plain JSON object, used for mutations reported over HTTP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonEntity {
    pub entity_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl JsonEntity {
    pub fn new(entity_type: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            entity_type: entity_type.into(),
            attributes,
            channels: Vec::new(),
        }
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }
}

impl ChannelSource for JsonEntity {
    fn channels(&self) -> Vec<String> {
        self.channels.clone()
    }
}

impl Entity for JsonEntity {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn attributes(&self) -> Result<Map<String, Value>, serde_json::Error> {
        Ok(self.attributes.clone())
    }

    fn channel_source(&self) -> Option<&dyn ChannelSource> {
        if self.channels.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
