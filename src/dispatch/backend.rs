use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::metrics::DispatchMetrics;
use crate::registry::BackendDescriptor;
use crate::serializer::{ChannelSource, Entity, RecordSerializer, SerializedRecord};
use crate::signal::{NotificationBus, SignalEvent, SignalKind, SignalPayload};

use super::packet::{dedup_channels, EventType, Packet};
use super::DispatchContext;

/// One registered policy bound to one mutation context.
///
/// Built per mutation and dropped once its packet has been published.
pub struct DispatchBackend<'a> {
    descriptor: &'a BackendDescriptor,
    context: &'a dyn DispatchContext,
    origin_socket: Option<String>,
}

impl<'a> DispatchBackend<'a> {
    pub fn new(descriptor: &'a BackendDescriptor, context: &'a dyn DispatchContext) -> Self {
        Self {
            descriptor,
            context,
            origin_socket: context.origin_socket(),
        }
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        self.descriptor
    }

    pub fn origin_socket(&self) -> Option<&str> {
        self.origin_socket.as_deref()
    }

    /// Serialization mapping: the backend's own, else the context's.
    fn serializer(&self) -> Result<Arc<dyn RecordSerializer>> {
        if let Some(serializer) = self.descriptor.serializer() {
            return Ok(serializer.clone());
        }
        self.context.serializer().ok_or_else(|| {
            AppError::Configuration(format!(
                "backend '{}' has no serializer and its context provides none",
                self.descriptor.name()
            ))
        })
    }

    /// Serialize a live instance.
    pub fn resolve_serializer(&self, instance: &dyn Entity) -> Result<SerializedRecord> {
        self.serializer()?.serialize(instance)
    }

    /// Union of context, serialized-record and instance channels, in that
    /// order, then namespaced by the backend's scope.
    pub fn resolve_channels(
        &self,
        instance: Option<&dyn Entity>,
        serialized: Option<&SerializedRecord>,
    ) -> Result<Vec<String>> {
        let sources: [Option<&dyn ChannelSource>; 3] = [
            self.context.channel_source(),
            serialized.map(|s| s as &dyn ChannelSource),
            instance.and_then(|i| i.channel_source()),
        ];

        let base: Vec<String> = sources
            .into_iter()
            .flatten()
            .flat_map(|source| source.channels())
            .collect();
        let base = dedup_channels(base);

        if base.is_empty() {
            return Err(AppError::Configuration(format!(
                "backend '{}' resolved no channels",
                self.descriptor.name()
            )));
        }

        Ok(self.descriptor.scope().apply(base))
    }

    /// `<lowercased entity type>.<event type>`
    pub fn resolve_event_name(&self, event_type: EventType) -> Result<String> {
        let entity_type = if self.descriptor.entity_type().is_empty() {
            self.serializer()?.entity_type().to_lowercase()
        } else {
            self.descriptor.entity_type().to_string()
        };
        Ok(format!("{}.{}", entity_type, event_type))
    }

    pub fn should_exclude_origin(&self) -> bool {
        self.context.exclude_origin()
    }

    /// Resolve everything a delivery needs. Serializes the instance, so for
    /// deletions this must run before the instance is removed.
    pub fn build_packet(
        &self,
        event_type: EventType,
        instance: Option<&dyn Entity>,
    ) -> Result<Packet> {
        let serialized = match instance {
            Some(instance) if event_type.carries_payload() => {
                Some(self.resolve_serializer(instance)?)
            }
            _ => None,
        };

        let channels = self.resolve_channels(instance, serialized.as_ref())?;
        let event_name = self.resolve_event_name(event_type)?;
        let data = serialized.map(|s| s.data).unwrap_or_else(empty_payload);
        let origin_socket = if self.should_exclude_origin() {
            self.origin_socket.clone()
        } else {
            None
        };

        Packet::new(channels, event_name, data, origin_socket)
    }

    /// Build the packet and publish it on the matching signal.
    #[tracing::instrument(
        name = "dispatch.backend",
        skip(self, bus, instance),
        fields(backend = %self.descriptor.name(), event_type = %event_type)
    )]
    pub async fn dispatch(
        &self,
        bus: &NotificationBus,
        event_type: EventType,
        instance: Option<&dyn Entity>,
        pre_destroy: bool,
    ) -> Result<()> {
        let packet = self.build_packet(event_type, instance).inspect_err(|e| {
            DispatchMetrics::record_failed(e.kind());
        })?;

        tracing::debug!(
            channels = ?packet.channels(),
            event_name = %packet.event_name(),
            origin_excluded = packet.origin_socket().is_some(),
            "Packet resolved"
        );

        let kind = if pre_destroy {
            SignalKind::PreDestroy
        } else {
            SignalKind::PostMutation
        };
        let payload = SignalPayload {
            sender: self.descriptor.name().to_string(),
            packet,
            provider_hint: self.descriptor.provider().map(str::to_string),
        };

        bus.publish(SignalEvent::new(kind, payload))
            .await
            .inspect_err(|e| DispatchMetrics::record_failed(e.kind()))?;

        DispatchMetrics::record_dispatched(event_type);
        Ok(())
    }
}

fn empty_payload() -> Value {
    json!({})
}
