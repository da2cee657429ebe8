use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DispatchConfig;
use crate::error::{AppError, Result};
use crate::registry::BackendRegistry;
use crate::serializer::Entity;
use crate::signal::{NotificationBus, SignalEvent, SignalPayload};

use super::{DispatchBackend, DispatchContext, EventType, Packet};

/// Sender name used for packets published through [`ModelDispatcher::push`].
const PUSH_SENDER: &str = "push";

/// Per-kind switches for the mutation-owning side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushToggles {
    pub creations: bool,
    pub updates: bool,
    pub deletions: bool,
}

impl Default for PushToggles {
    fn default() -> Self {
        Self {
            creations: true,
            updates: true,
            deletions: true,
        }
    }
}

impl From<&DispatchConfig> for PushToggles {
    fn from(settings: &DispatchConfig) -> Self {
        Self {
            creations: settings.push_creations,
            updates: settings.push_updates,
            deletions: settings.push_deletions,
        }
    }
}

impl PushToggles {
    pub fn allows(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::Create => self.creations,
            EventType::Update | EventType::PartialUpdate => self.updates,
            EventType::Delete => self.deletions,
            EventType::Sync => true,
        }
    }
}

/// Statistics for the model dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Mutations reported to the dispatcher
    pub mutations: AtomicU64,
    /// Backend dispatches that published a packet
    pub dispatched: AtomicU64,
    /// Mutations skipped by a toggle or with no backend registered
    pub skipped: AtomicU64,
    /// Backend dispatches that failed
    pub failed: AtomicU64,
    /// Arbitrary pushes
    pub pushes: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            mutations: self.mutations.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pushes: self.pushes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub mutations: u64,
    pub dispatched: u64,
    pub skipped: u64,
    pub failed: u64,
    pub pushes: u64,
}

/// Entry point for mutation-owning code.
///
/// Looks up every backend registered for the mutated entity type and runs
/// each one against the caller's context, in registration order. Execution
/// is sequential and happens on the caller's task; the first failure aborts
/// the remaining backends and is returned to the caller.
pub struct ModelDispatcher {
    registry: Arc<BackendRegistry>,
    bus: Arc<NotificationBus>,
    toggles: PushToggles,
    stats: DispatcherStats,
}

impl ModelDispatcher {
    pub fn new(registry: Arc<BackendRegistry>, bus: Arc<NotificationBus>) -> Self {
        Self {
            registry,
            bus,
            toggles: PushToggles::default(),
            stats: DispatcherStats::default(),
        }
    }

    pub fn with_toggles(mut self, toggles: PushToggles) -> Self {
        self.toggles = toggles;
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    pub fn toggles(&self) -> PushToggles {
        self.toggles
    }

    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Run every backend registered for `entity_type`.
    ///
    /// Returns the number of backends that published a packet.
    #[tracing::instrument(
        name = "dispatch.push_changes",
        skip(self, ctx, instance),
        fields(entity_type = %entity_type, event_type = %event_type)
    )]
    pub async fn push_changes(
        &self,
        ctx: &dyn DispatchContext,
        entity_type: &str,
        event_type: EventType,
        instance: Option<&dyn Entity>,
    ) -> Result<usize> {
        self.stats.mutations.fetch_add(1, Ordering::Relaxed);

        if !self.toggles.allows(event_type) {
            tracing::debug!("Push disabled for this event type");
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(0);
        }

        let descriptors = self.registry.lookup(entity_type);
        if descriptors.is_empty() {
            tracing::debug!("No backends registered");
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(0);
        }

        for descriptor in descriptors {
            let backend = DispatchBackend::new(descriptor, ctx);
            if let Err(e) = backend
                .dispatch(&self.bus, event_type, instance, event_type.is_pre_destroy())
                .await
            {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(backend = %descriptor.name(), error = %e, "Dispatch failed");
                return Err(e);
            }
            self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        }

        Ok(descriptors.len())
    }

    pub async fn created(&self, ctx: &dyn DispatchContext, instance: &dyn Entity) -> Result<usize> {
        self.push_changes(ctx, instance.entity_type(), EventType::Create, Some(instance))
            .await
    }

    pub async fn updated(
        &self,
        ctx: &dyn DispatchContext,
        instance: &dyn Entity,
        partial: bool,
    ) -> Result<usize> {
        let event_type = if partial {
            EventType::PartialUpdate
        } else {
            EventType::Update
        };
        self.push_changes(ctx, instance.entity_type(), event_type, Some(instance))
            .await
    }

    /// Tell subscribers to re-fetch; no payload is sent.
    pub async fn sync(&self, ctx: &dyn DispatchContext, entity_type: &str) -> Result<usize> {
        self.push_changes(ctx, entity_type, EventType::Sync, None)
            .await
    }

    /// Announce a deletion, then perform it.
    ///
    /// `delete` only runs once every backend has published its packet; if any
    /// of them fails the instance is left in place.
    pub async fn destroy<T, E, F, Fut>(
        &self,
        ctx: &dyn DispatchContext,
        instance: &dyn Entity,
        delete: F,
    ) -> std::result::Result<T, E>
    where
        E: From<AppError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.push_changes(ctx, instance.entity_type(), EventType::Delete, Some(instance))
            .await
            .map_err(E::from)?;
        delete().await
    }

    /// Publish a caller-built packet without backend resolution.
    #[tracing::instrument(name = "dispatch.push", skip(self, channels, data))]
    pub async fn push(
        &self,
        channels: Vec<String>,
        event_name: &str,
        data: Value,
        socket_id: Option<String>,
    ) -> Result<()> {
        let packet = Packet::new(channels, event_name, data, socket_id)?;
        self.stats.pushes.fetch_add(1, Ordering::Relaxed);

        self.bus
            .publish(SignalEvent::PostMutation(SignalPayload {
                sender: PUSH_SENDER.to_string(),
                packet,
                provider_hint: None,
            }))
            .await
    }
}
