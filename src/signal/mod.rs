//! In-process notification bus.
//!
//! Dispatch backends never talk to the transport directly: they publish a
//! typed [`SignalEvent`] here and whichever receivers are connected (normally
//! a single [`DeliveryReceiver`]) take it from there. Publishing is
//! sequential: receivers run in connection order and the first error stops
//! the chain and is returned to the publisher.

mod receiver;

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::Packet;
use crate::error::Result;

pub use receiver::DeliveryReceiver;

/// The two logical publish points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// create, update, partial_update, sync
    PostMutation,
    /// delete, published while the instance still exists
    PreDestroy,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::PostMutation => "post_mutation",
            SignalKind::PreDestroy => "pre_destroy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalPayload {
    /// Name of the backend (or caller) that produced the packet
    pub sender: String,
    pub packet: Packet,
    /// Provider to deliver through; the receiver's default when `None`
    pub provider_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SignalEvent {
    PostMutation(SignalPayload),
    PreDestroy(SignalPayload),
}

impl SignalEvent {
    pub fn new(kind: SignalKind, payload: SignalPayload) -> Self {
        match kind {
            SignalKind::PostMutation => SignalEvent::PostMutation(payload),
            SignalKind::PreDestroy => SignalEvent::PreDestroy(payload),
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            SignalEvent::PostMutation(_) => SignalKind::PostMutation,
            SignalEvent::PreDestroy(_) => SignalKind::PreDestroy,
        }
    }

    pub fn payload(&self) -> &SignalPayload {
        match self {
            SignalEvent::PostMutation(payload) | SignalEvent::PreDestroy(payload) => payload,
        }
    }
}

#[async_trait]
pub trait SignalReceiver: Send + Sync {
    fn name(&self) -> &str;

    async fn receive(&self, event: &SignalEvent) -> Result<()>;
}

/// Receivers are connected during bootstrap; the bus is then shared behind an `Arc`.
#[derive(Default)]
pub struct NotificationBus {
    post_mutation: Vec<Arc<dyn SignalReceiver>>,
    pre_destroy: Vec<Arc<dyn SignalReceiver>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, kind: SignalKind, receiver: Arc<dyn SignalReceiver>) {
        tracing::debug!(signal = kind.as_str(), receiver = %receiver.name(), "Receiver connected");
        self.receivers_mut(kind).push(receiver);
    }

    /// Connect a receiver to both publish points.
    pub fn connect_all(&mut self, receiver: Arc<dyn SignalReceiver>) {
        self.connect(SignalKind::PostMutation, receiver.clone());
        self.connect(SignalKind::PreDestroy, receiver);
    }

    /// Disconnect every receiver. Test teardown only.
    pub fn disconnect_all(&mut self) {
        self.post_mutation.clear();
        self.pre_destroy.clear();
    }

    pub fn receiver_count(&self, kind: SignalKind) -> usize {
        self.receivers(kind).len()
    }

    /// Run every receiver connected to the event's kind, in order.
    #[tracing::instrument(
        name = "signal.publish",
        skip(self, event),
        fields(
            signal = event.kind().as_str(),
            event_name = %event.payload().packet.event_name(),
            sender = %event.payload().sender
        )
    )]
    pub async fn publish(&self, event: SignalEvent) -> Result<()> {
        let receivers = self.receivers(event.kind());
        if receivers.is_empty() {
            tracing::warn!("Signal published with no receivers connected");
            return Ok(());
        }

        for receiver in receivers {
            receiver.receive(&event).await?;
        }

        Ok(())
    }

    fn receivers(&self, kind: SignalKind) -> &[Arc<dyn SignalReceiver>] {
        match kind {
            SignalKind::PostMutation => &self.post_mutation,
            SignalKind::PreDestroy => &self.pre_destroy,
        }
    }

    fn receivers_mut(&mut self, kind: SignalKind) -> &mut Vec<Arc<dyn SignalReceiver>> {
        match kind {
            SignalKind::PostMutation => &mut self.post_mutation,
            SignalKind::PreDestroy => &mut self.pre_destroy,
        }
    }
}
