//! Record serialization and channel-source capabilities.
//!
//! Entities are opaque to the dispatcher: it only needs their type name, a
//! JSON attribute map to project fields from, and optionally the channels
//! they want to be announced on. Serializers turn an entity into the payload
//! that is pushed to subscribers.

mod entity;
mod projection;

pub use entity::{ChannelSource, Entity, JsonEntity};
pub use projection::{FieldProjection, RecordSerializer, SerializedRecord};
