//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map};

use model_pusher::config::Settings;
use model_pusher::error::AppError;
use model_pusher::occupancy::MemoryOccupancyCache;
use model_pusher::registry::{BackendDescriptor, BackendRegistry, RegistryBuilder};
use model_pusher::serializer::{FieldProjection, JsonEntity};
use model_pusher::server::AppState;
use model_pusher::transport::{
    hmac_hex, validate_webhook, ChannelsInfo, Transport, TransportError, TriggerRequest,
};
use model_pusher::webhook::WebhookPayload;

pub const APP_KEY: &str = "test-key";
pub const APP_SECRET: &str = "test-secret";

/// In-memory transport recording every call.
#[derive(Default)]
pub struct FakeTransport {
    occupied: Mutex<Vec<String>>,
    triggers: Mutex<Vec<TriggerRequest>>,
    introspections: AtomicUsize,
    fail_triggers: AtomicBool,
    fail_introspection: AtomicBool,
}

impl FakeTransport {
    pub fn with_occupied<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            occupied: Mutex::new(channels.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Every trigger answers with a 500 from the messaging service.
    pub fn failing_triggers(self) -> Self {
        self.fail_triggers.store(true, Ordering::SeqCst);
        self
    }

    /// Every channel introspection call fails.
    pub fn failing_introspection(self) -> Self {
        self.fail_introspection.store(true, Ordering::SeqCst);
        self
    }

    pub fn triggers(&self) -> Vec<TriggerRequest> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn introspection_count(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }
}

fn unavailable() -> TransportError {
    TransportError::Status {
        status: 500,
        body: "service unavailable".to_string(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn trigger(&self, request: &TriggerRequest) -> Result<(), TransportError> {
        if self.fail_triggers.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.triggers.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn channels_info(&self) -> Result<ChannelsInfo, TransportError> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        if self.fail_introspection.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(ChannelsInfo::from_names(self.occupied.lock().unwrap().clone()))
    }

    fn validate_webhook(
        &self,
        key: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookPayload, AppError> {
        validate_webhook(APP_KEY, APP_SECRET, key, signature, body)
    }
}

pub struct TestEnvironment {
    pub state: AppState,
    pub transport: Arc<FakeTransport>,
    pub cache: Arc<MemoryOccupancyCache>,
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.pusher.app_id = "1".to_string();
    settings.pusher.key = APP_KEY.to_string();
    settings.pusher.secret = APP_SECRET.to_string();
    settings
}

pub fn create_test_environment_with(
    settings: Settings,
    registry: BackendRegistry,
    transport: FakeTransport,
) -> TestEnvironment {
    let transport = Arc::new(transport);
    let cache = Arc::new(MemoryOccupancyCache::new());
    let state = AppState::from_parts(settings, registry, transport.clone(), cache.clone());

    TestEnvironment {
        state,
        transport,
        cache,
    }
}

pub fn create_test_environment(descriptors: Vec<BackendDescriptor>) -> TestEnvironment {
    let registry = RegistryBuilder::new()
        .register_all(descriptors)
        .build()
        .unwrap();
    create_test_environment_with(test_settings(), registry, FakeTransport::default())
}

pub fn widget_projection() -> Arc<FieldProjection> {
    Arc::new(FieldProjection::new("Widget", ["name"]))
}

pub fn widget(name: &str) -> JsonEntity {
    let mut attrs = Map::new();
    attrs.insert("name".to_string(), json!(name));
    attrs.insert("secret_notes".to_string(), json!("not for subscribers"));
    JsonEntity::new("Widget", attrs)
}

pub fn sign(body: &[u8]) -> String {
    hmac_hex(APP_SECRET, body).unwrap()
}
