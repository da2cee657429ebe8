use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::dispatch::{ModelDispatcher, PushToggles};
use crate::error::Result;
use crate::occupancy::{create_occupancy_cache, OccupancyCache};
use crate::provider::{NoopProvider, PusherProvider};
use crate::registry::{manifest, BackendRegistry};
use crate::signal::{DeliveryReceiver, NotificationBus};
use crate::transport::{PusherClient, Transport};

/// Application context owning every process-wide collaborator.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<BackendRegistry>,
    pub dispatcher: Arc<ModelDispatcher>,
    pub occupancy: Arc<dyn OccupancyCache>,
    pub transport: Arc<dyn Transport>,
    pub start_time: Instant,
}

impl AppState {
    /// Discover backend manifests, connect the transport and occupancy cache.
    pub async fn new(settings: Settings) -> Result<Self> {
        let registry = manifest::load_registry(
            settings.dispatch.backend_dirs.as_slice(),
            &settings.dispatch.backends_file,
        )?;
        let transport: Arc<dyn Transport> = Arc::new(PusherClient::new(&settings.pusher)?);
        let occupancy = create_occupancy_cache(&settings.occupancy).await;

        Ok(Self::from_parts(settings, registry, transport, occupancy))
    }

    /// Wire the bus, providers and dispatcher around the given collaborators.
    pub fn from_parts(
        settings: Settings,
        registry: BackendRegistry,
        transport: Arc<dyn Transport>,
        occupancy: Arc<dyn OccupancyCache>,
    ) -> Self {
        let pusher = PusherProvider::new(transport.clone(), occupancy.clone(), &settings.dispatch);
        let receiver = DeliveryReceiver::new(settings.dispatch.default_provider.clone())
            .with_provider(Arc::new(pusher))
            .with_provider(Arc::new(NoopProvider));

        let mut bus = NotificationBus::new();
        bus.connect_all(Arc::new(receiver));

        let registry = Arc::new(registry);
        let dispatcher = ModelDispatcher::new(registry.clone(), Arc::new(bus))
            .with_toggles(PushToggles::from(&settings.dispatch));

        tracing::info!(
            backends = registry.len(),
            occupancy = occupancy.backend_name(),
            default_provider = %settings.dispatch.default_provider,
            "Application state initialised"
        );

        Self {
            settings: Arc::new(settings),
            registry,
            dispatcher: Arc::new(dispatcher),
            occupancy,
            transport,
            start_time: Instant::now(),
        }
    }
}
