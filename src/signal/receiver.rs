use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::provider::DeliveryProvider;

use super::{SignalEvent, SignalReceiver};

/// Hands packets to a delivery provider.
///
/// The provider is picked by the payload's hint, falling back to the
/// default provider name.
pub struct DeliveryReceiver {
    providers: HashMap<String, Arc<dyn DeliveryProvider>>,
    default_provider: String,
}

impl DeliveryReceiver {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn DeliveryProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn resolve(&self, hint: Option<&str>) -> Result<&Arc<dyn DeliveryProvider>> {
        let name = hint.unwrap_or(self.default_provider.as_str());
        self.providers.get(name).ok_or_else(|| {
            AppError::Configuration(format!("no delivery provider named '{}'", name))
        })
    }
}

#[async_trait]
impl SignalReceiver for DeliveryReceiver {
    fn name(&self) -> &str {
        "delivery"
    }

    async fn receive(&self, event: &SignalEvent) -> Result<()> {
        let payload = event.payload();
        let provider = self.resolve(payload.provider_hint.as_deref())?;
        let packet = &payload.packet;

        provider
            .trigger(
                packet.channels(),
                packet.event_name(),
                packet.data(),
                packet.origin_socket(),
            )
            .await
    }
}
