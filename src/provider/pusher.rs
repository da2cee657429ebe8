use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::DispatchConfig;
use crate::error::Result;
use crate::metrics::{DeliveryMetrics, OccupancyMetrics};
use crate::occupancy::{Occupancy, OccupancyCache};
use crate::transport::{Transport, TriggerRequest};

use super::{validate_channels, DeliveryProvider};

/// Delivers through the transport, honouring the disable switch and the
/// occupancy admission filter.
///
/// Both flags are read once at construction.
pub struct PusherProvider {
    transport: Arc<dyn Transport>,
    occupancy: Arc<dyn OccupancyCache>,
    disabled: bool,
    optimisation_enabled: bool,
}

impl PusherProvider {
    pub fn new(
        transport: Arc<dyn Transport>,
        occupancy: Arc<dyn OccupancyCache>,
        settings: &DispatchConfig,
    ) -> Self {
        if settings.disabled {
            tracing::warn!("Delivery disabled, triggers will be discarded");
        }

        Self {
            transport,
            occupancy,
            disabled: settings.disabled,
            optimisation_enabled: settings.webhook_optimisation_enabled,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn optimisation_enabled(&self) -> bool {
        self.optimisation_enabled
    }

    /// Mark every channel the transport reports as occupied.
    ///
    /// Channels missing from the report are left untouched.
    #[tracing::instrument(name = "provider.sync_cache", skip(self))]
    pub async fn sync_cache(&self) -> Result<usize> {
        let info = self.transport.channels_info().await?;
        let names = info.names();
        self.occupancy.bulk_set_occupied(&names).await?;

        tracing::debug!(occupied = names.len(), "Occupancy cache refreshed");
        Ok(names.len())
    }

    /// Cache read that never fails; errors count as a miss.
    async fn lookup(&self, channel: &str) -> Occupancy {
        match self.occupancy.get(channel).await {
            Ok(state) => state,
            Err(e) => {
                OccupancyMetrics::record_lookup_error();
                tracing::warn!(channel = %channel, error = %e, "Occupancy lookup failed");
                Occupancy::Unknown
            }
        }
    }

    /// Keep only channels known to be occupied.
    ///
    /// The first miss triggers one refresh from the transport; channels
    /// still unknown afterwards are dropped, as are vacant ones.
    pub async fn filter_occupied(&self, channels: &[String]) -> Vec<String> {
        let mut kept = Vec::with_capacity(channels.len());
        let mut refreshed = false;

        for channel in channels {
            let mut state = self.lookup(channel).await;

            if state.is_unknown() && !refreshed {
                refreshed = true;
                match self.sync_cache().await {
                    Ok(_) => OccupancyMetrics::record_refresh("ok"),
                    Err(e) => {
                        OccupancyMetrics::record_refresh("error");
                        tracing::warn!(error = %e, "Occupancy refresh failed");
                    }
                }
                state = self.lookup(channel).await;
            }

            OccupancyMetrics::record_lookup(state);
            if state.is_occupied() {
                kept.push(channel.clone());
            } else {
                tracing::debug!(channel = %channel, occupancy = state.as_str(), "Channel dropped");
            }
        }

        kept
    }
}

#[async_trait]
impl DeliveryProvider for PusherProvider {
    fn name(&self) -> &str {
        "pusher"
    }

    #[tracing::instrument(
        name = "provider.trigger",
        skip(self, channels, data, socket_id),
        fields(event_name = %event_name, channels = channels.len())
    )]
    async fn trigger(
        &self,
        channels: &[String],
        event_name: &str,
        data: &Value,
        socket_id: Option<&str>,
    ) -> Result<()> {
        validate_channels(channels)?;

        if self.disabled {
            DeliveryMetrics::record_skipped("disabled");
            tracing::debug!("Delivery disabled, trigger discarded");
            return Ok(());
        }

        let channels = if self.optimisation_enabled {
            self.filter_occupied(channels).await
        } else {
            channels.to_vec()
        };

        if channels.is_empty() {
            DeliveryMetrics::record_skipped("no_occupied_channels");
            tracing::debug!("No occupied channels, trigger skipped");
            return Ok(());
        }

        let request = TriggerRequest::new(&channels, event_name, data, socket_id)?;
        self.transport.trigger(&request).await?;

        DeliveryMetrics::record_delivered(channels.len());
        tracing::info!(channels = ?channels, "Event delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use crate::error::AppError;
    use crate::occupancy::{MemoryOccupancyCache, OccupancyError};
    use crate::transport::{ChannelsInfo, TransportError};
    use crate::webhook::WebhookPayload;

    #[derive(Default)]
    struct FakeTransport {
        occupied: Vec<String>,
        triggers: Mutex<Vec<TriggerRequest>>,
        introspections: AtomicUsize,
        fail_introspection: bool,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn trigger(&self, request: &TriggerRequest) -> std::result::Result<(), TransportError> {
            self.triggers.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn channels_info(&self) -> std::result::Result<ChannelsInfo, TransportError> {
            self.introspections.fetch_add(1, Ordering::SeqCst);
            if self.fail_introspection {
                return Err(TransportError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(ChannelsInfo::from_names(self.occupied.clone()))
        }

        fn validate_webhook(
            &self,
            _key: Option<&str>,
            _signature: Option<&str>,
            _body: &[u8],
        ) -> std::result::Result<WebhookPayload, AppError> {
            Err(AppError::Auth("not supported".into()))
        }
    }

    /// Cache whose reads always fail.
    struct BrokenCache;

    #[async_trait]
    impl OccupancyCache for BrokenCache {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _channel: &str) -> std::result::Result<Occupancy, OccupancyError> {
            Err(OccupancyError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))))
        }

        async fn set_occupied(&self, _channel: &str) -> std::result::Result<(), OccupancyError> {
            Ok(())
        }

        async fn set_vacated(&self, _channel: &str) -> std::result::Result<(), OccupancyError> {
            Ok(())
        }

        async fn bulk_set_occupied(
            &self,
            _channels: &[String],
        ) -> std::result::Result<(), OccupancyError> {
            Ok(())
        }
    }

    fn provider(
        transport: &Arc<FakeTransport>,
        cache: &Arc<MemoryOccupancyCache>,
        disabled: bool,
        optimisation: bool,
    ) -> PusherProvider {
        PusherProvider::new(
            transport.clone(),
            cache.clone(),
            &DispatchConfig {
                disabled,
                webhook_optimisation_enabled: optimisation,
                ..Default::default()
            },
        )
    }

    fn delivered(transport: &FakeTransport) -> Vec<Vec<String>> {
        transport
            .triggers
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.channels.clone())
            .collect()
    }

    async fn send(provider: &PusherProvider, channels: &[&str]) -> Result<()> {
        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        provider
            .trigger(&channels, "widget.create", &json!({"name": "Foo"}), None)
            .await
    }

    #[tokio::test]
    async fn test_delivers_without_optimisation() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, false, false);

        send(&provider, &["a", "b"]).await.unwrap();

        assert_eq!(delivered(&transport), vec![vec!["a", "b"]]);
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 0);
        let request = &transport.triggers.lock().unwrap()[0];
        assert_eq!(request.data, "{\"name\":\"Foo\"}");
        assert_eq!(request.socket_id, None);
    }

    #[tokio::test]
    async fn test_disabled_is_silent_noop() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, true, true);

        send(&provider, &["a"]).await.unwrap();

        assert!(delivered(&transport).is_empty());
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_channels_rejected_before_transport() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, false, false);

        let err = send(&provider, &["not valid"]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(delivered(&transport).is_empty());
    }

    #[tokio::test]
    async fn test_occupied_channel_delivered_without_introspection() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryOccupancyCache::new());
        cache.set_occupied("A").await.unwrap();
        let provider = provider(&transport, &cache, false, true);

        send(&provider, &["A"]).await.unwrap();

        assert_eq!(delivered(&transport), vec![vec!["A"]]);
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vacant_channel_not_delivered() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryOccupancyCache::new());
        cache.set_vacated("B").await.unwrap();
        let provider = provider(&transport, &cache, false, true);

        send(&provider, &["B"]).await.unwrap();

        assert!(delivered(&transport).is_empty());
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_refreshes_once_then_caches() {
        let transport = Arc::new(FakeTransport {
            occupied: vec!["C".to_string()],
            ..Default::default()
        });
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, false, true);

        send(&provider, &["C"]).await.unwrap();
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 1);
        assert_eq!(delivered(&transport), vec![vec!["C"]]);

        send(&provider, &["C"]).await.unwrap();
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 1);
        assert_eq!(delivered(&transport).len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_after_refresh_is_dropped() {
        let transport = Arc::new(FakeTransport {
            occupied: vec!["C".to_string()],
            ..Default::default()
        });
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, false, true);

        send(&provider, &["D", "C", "E"]).await.unwrap();

        assert_eq!(transport.introspections.load(Ordering::SeqCst), 1);
        assert_eq!(delivered(&transport), vec![vec!["C"]]);
        assert!(cache.get("D").await.unwrap().is_unknown());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_swallowed() {
        let transport = Arc::new(FakeTransport {
            occupied: vec!["C".to_string()],
            fail_introspection: true,
            ..Default::default()
        });
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, false, true);

        send(&provider, &["C", "D"]).await.unwrap();

        assert_eq!(transport.introspections.load(Ordering::SeqCst), 1);
        assert!(delivered(&transport).is_empty());
        assert!(cache.get("C").await.unwrap().is_unknown());
    }

    #[tokio::test]
    async fn test_cache_read_error_counts_as_unknown() {
        let transport = Arc::new(FakeTransport {
            occupied: vec!["A".to_string()],
            ..Default::default()
        });
        let provider = PusherProvider::new(
            transport.clone(),
            Arc::new(BrokenCache),
            &DispatchConfig {
                webhook_optimisation_enabled: true,
                ..Default::default()
            },
        );

        assert!(provider.filter_occupied(&["A".to_string()]).await.is_empty());
        send(&provider, &["A"]).await.unwrap();

        assert!(delivered(&transport).is_empty());
        assert_eq!(transport.introspections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sync_cache_marks_reported_channels() {
        let transport = Arc::new(FakeTransport {
            occupied: vec!["x".to_string(), "y".to_string()],
            ..Default::default()
        });
        let cache = Arc::new(MemoryOccupancyCache::new());
        let provider = provider(&transport, &cache, false, true);

        assert_eq!(provider.sync_cache().await.unwrap(), 2);
        assert!(cache.get("x").await.unwrap().is_occupied());
        assert!(cache.get("y").await.unwrap().is_occupied());
    }
}
