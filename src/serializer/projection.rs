use serde_json::{Map, Value};

use crate::error::{AppError, Result};

use super::{ChannelSource, Entity};

/// Output of a serializer: the payload pushed to subscribers, plus any
/// channels the serializer itself contributes.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedRecord {
    pub data: Value,
    pub channels: Vec<String>,
}

impl ChannelSource for SerializedRecord {
    fn channels(&self) -> Vec<String> {
        self.channels.clone()
    }
}

/// Turns an entity instance into a JSON payload.
pub trait RecordSerializer: Send + Sync {
    /// Type name of the entities this serializer handles.
    fn entity_type(&self) -> &str;

    fn serialize(&self, instance: &dyn Entity) -> Result<SerializedRecord>;
}

/// Field-list projection of an entity's attributes.
///
/// Only the listed fields are copied; the output map keeps its keys sorted.
/// A listed field the instance does not have is emitted as `null`.
#[derive(Debug, Clone)]
pub struct FieldProjection {
    entity_type: String,
    fields: Vec<String>,
    channels: Vec<String>,
}

impl FieldProjection {
    pub fn new<I, S>(entity_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type: entity_type.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            channels: Vec::new(),
        }
    }

    /// Channels every record produced by this projection is announced on.
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl RecordSerializer for FieldProjection {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn serialize(&self, instance: &dyn Entity) -> Result<SerializedRecord> {
        if !instance.entity_type().eq_ignore_ascii_case(&self.entity_type) {
            return Err(AppError::Configuration(format!(
                "serializer for '{}' cannot serialize a '{}'",
                self.entity_type,
                instance.entity_type()
            )));
        }

        let mut attributes = instance
            .attributes()
            .map_err(|e| AppError::Internal(format!("failed to read attributes: {}", e)))?;

        let mut data = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = attributes.remove(field).unwrap_or(Value::Null);
            data.insert(field.clone(), value);
        }

        Ok(SerializedRecord {
            data: Value::Object(data),
            channels: self.channels.clone(),
        })
    }
}
