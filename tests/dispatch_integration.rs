//! End-to-end dispatch tests
//!
//! Drive mutations through the dispatcher, the notification bus and the
//! Pusher provider down to a recording transport.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use model_pusher::dispatch::{EventType, MutationContext};
use model_pusher::error::AppError;
use model_pusher::occupancy::OccupancyCache;
use model_pusher::registry::{BackendDescriptor, RegistryBuilder};
use model_pusher::serializer::{FieldProjection, JsonEntity};

use common::{
    create_test_environment, create_test_environment_with, test_settings, widget,
    widget_projection, FakeTransport,
};

fn data_of(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap()
}

#[tokio::test]
async fn test_create_widget_delivers_once() {
    let env = create_test_environment(vec![BackendDescriptor::new(
        "WidgetBackend",
        widget_projection(),
    )]);
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let dispatched = env
        .state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap();

    assert_eq!(dispatched, 1);
    let triggers = env.transport.triggers();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].channels, vec!["widgets"]);
    assert_eq!(triggers[0].name, "widget.create");
    assert_eq!(data_of(&triggers[0].data), json!({"name": "Foo"}));
    assert_eq!(triggers[0].socket_id, None);
}

#[tokio::test]
async fn test_origin_socket_excluded_when_requested() {
    let env = create_test_environment(vec![BackendDescriptor::new(
        "WidgetBackend",
        widget_projection(),
    )]);
    let ctx = MutationContext::new()
        .with_channels(["widgets"])
        .with_origin_socket("abc123")
        .excluding_origin(true);

    env.state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap();

    let triggers = env.transport.triggers();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].socket_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_unregistered_entity_dispatches_nothing() {
    let env = create_test_environment(vec![BackendDescriptor::new(
        "WidgetBackend",
        widget_projection(),
    )]);
    let ctx = MutationContext::new().with_channels(["gadgets"]);

    assert!(env.state.registry.lookup("gadget").is_empty());

    let gadget = JsonEntity::new("Gadget", Default::default());
    let dispatched = env.state.dispatcher.created(&ctx, &gadget).await.unwrap();

    assert_eq!(dispatched, 0);
    assert!(env.transport.triggers().is_empty());
}

#[tokio::test]
async fn test_each_backend_dispatches_independently() {
    let env = create_test_environment(vec![
        BackendDescriptor::new("WidgetPublic", widget_projection()),
        BackendDescriptor::new("WidgetPrivate", widget_projection()).private(),
        BackendDescriptor::new(
            "WidgetCatalogue",
            Arc::new(FieldProjection::new("Widget", ["name"]).with_channels(["catalogue"])),
        ),
    ]);
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let dispatched = env
        .state
        .dispatcher
        .updated(&ctx, &widget("Foo"), false)
        .await
        .unwrap();

    assert_eq!(dispatched, 3);
    let channels: Vec<Vec<String>> = env
        .transport
        .triggers()
        .into_iter()
        .map(|t| t.channels)
        .collect();
    assert_eq!(
        channels,
        vec![
            vec!["widgets".to_string()],
            vec!["private-widgets".to_string()],
            vec!["widgets".to_string(), "catalogue".to_string()],
        ]
    );
}

#[tokio::test]
async fn test_private_channels_keep_order_without_duplicates() {
    let env = create_test_environment(vec![
        BackendDescriptor::new("WidgetPrivate", widget_projection()).private()
    ]);
    let ctx = MutationContext::new().with_channels(["b", "a", "b"]);
    let instance = widget("Foo").with_channels(vec!["c".to_string(), "a".to_string()]);

    env.state
        .dispatcher
        .created(&ctx, &instance)
        .await
        .unwrap();

    let triggers = env.transport.triggers();
    assert_eq!(
        triggers[0].channels,
        vec!["private-b", "private-a", "private-c"]
    );
}

#[tokio::test]
async fn test_no_channels_fails_without_delivery() {
    let env = create_test_environment(vec![BackendDescriptor::new(
        "WidgetBackend",
        widget_projection(),
    )]);
    let ctx = MutationContext::new();

    let err = env
        .state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Configuration(_)));
    assert!(env.transport.triggers().is_empty());
}

#[tokio::test]
async fn test_delete_published_before_removal() {
    let env = create_test_environment(vec![BackendDescriptor::new(
        "WidgetBackend",
        widget_projection(),
    )]);
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let store: Arc<Mutex<HashMap<u32, JsonEntity>>> = Arc::new(Mutex::new(HashMap::new()));
    store.lock().unwrap().insert(1, widget("Foo"));
    let instance = store.lock().unwrap()[&1].clone();

    let transport = env.transport.clone();
    let store_ref = store.clone();
    let triggers_at_delete = env
        .state
        .dispatcher
        .destroy(&ctx, &instance, || async move {
            let seen = transport.triggers().len();
            store_ref.lock().unwrap().remove(&1);
            Ok::<_, AppError>(seen)
        })
        .await
        .unwrap();

    assert_eq!(triggers_at_delete, 1);
    assert!(store.lock().unwrap().is_empty());

    let triggers = env.transport.triggers();
    assert_eq!(triggers[0].name, "widget.delete");
    assert_eq!(data_of(&triggers[0].data), json!({"name": "Foo"}));
}

#[tokio::test]
async fn test_transport_failure_fails_mutation_and_skips_delete() {
    let registry = RegistryBuilder::new()
        .register(BackendDescriptor::new("WidgetBackend", widget_projection()))
        .build()
        .unwrap();
    let env = create_test_environment_with(
        test_settings(),
        registry,
        FakeTransport::default().failing_triggers(),
    );
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let err = env
        .state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Transport(_)));

    let store: Arc<Mutex<HashMap<u32, JsonEntity>>> = Arc::new(Mutex::new(HashMap::new()));
    store.lock().unwrap().insert(1, widget("Foo"));
    let instance = store.lock().unwrap()[&1].clone();

    let store_ref = store.clone();
    let result = env
        .state
        .dispatcher
        .destroy(&ctx, &instance, || async move {
            store_ref.lock().unwrap().remove(&1);
            Ok::<_, AppError>(())
        })
        .await;

    assert!(matches!(result, Err(AppError::Transport(_))));
    assert_eq!(store.lock().unwrap().len(), 1);
    assert!(env.transport.triggers().is_empty());
    assert_eq!(env.state.dispatcher.stats().snapshot().failed, 2);
}

#[tokio::test]
async fn test_refresh_failure_drops_delivery_without_error() {
    let mut settings = test_settings();
    settings.dispatch.webhook_optimisation_enabled = true;
    let registry = RegistryBuilder::new()
        .register(BackendDescriptor::new("WidgetBackend", widget_projection()))
        .build()
        .unwrap();
    let env = create_test_environment_with(
        settings,
        registry,
        FakeTransport::with_occupied(["widgets"]).failing_introspection(),
    );
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let dispatched = env
        .state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap();

    assert_eq!(dispatched, 1);
    assert_eq!(env.transport.introspection_count(), 1);
    assert!(env.transport.triggers().is_empty());
    assert!(env.cache.get("widgets").await.unwrap().is_unknown());
}

#[tokio::test]
async fn test_sync_sends_empty_payload() {
    let env = create_test_environment(vec![BackendDescriptor::new(
        "WidgetBackend",
        widget_projection(),
    )]);
    let ctx = MutationContext::new().with_channels(["widgets"]);

    env.state.dispatcher.sync(&ctx, "Widget").await.unwrap();

    let triggers = env.transport.triggers();
    assert_eq!(triggers[0].name, "widget.sync");
    assert_eq!(data_of(&triggers[0].data), json!({}));
}

#[tokio::test]
async fn test_occupancy_filter_through_full_pipeline() {
    let mut settings = test_settings();
    settings.dispatch.webhook_optimisation_enabled = true;
    let registry = RegistryBuilder::new()
        .register(BackendDescriptor::new("WidgetBackend", widget_projection()))
        .build()
        .unwrap();
    let env = create_test_environment_with(settings, registry, FakeTransport::with_occupied(["C"]));

    env.cache.set_occupied("A").await.unwrap();
    env.cache.set_vacated("B").await.unwrap();

    let dispatch = |channel: &'static str| {
        let ctx = MutationContext::new().with_channels([channel]);
        let dispatcher = env.state.dispatcher.clone();
        async move { dispatcher.created(&ctx, &widget("Foo")).await }
    };

    // Known occupied: delivered, no introspection
    dispatch("A").await.unwrap();
    assert_eq!(env.transport.introspection_count(), 0);
    assert_eq!(env.transport.triggers().len(), 1);

    // Known vacant: dropped
    dispatch("B").await.unwrap();
    assert_eq!(env.transport.introspection_count(), 0);
    assert_eq!(env.transport.triggers().len(), 1);

    // Miss: one refresh, then delivered and cached
    dispatch("C").await.unwrap();
    assert_eq!(env.transport.introspection_count(), 1);
    assert_eq!(env.transport.triggers()[1].channels, vec!["C"]);

    dispatch("C").await.unwrap();
    assert_eq!(env.transport.introspection_count(), 1);
    assert_eq!(env.transport.triggers().len(), 3);
}

#[tokio::test]
async fn test_disabled_delivery_still_resolves() {
    let mut settings = test_settings();
    settings.dispatch.disabled = true;
    let registry = RegistryBuilder::new()
        .register(BackendDescriptor::new("WidgetBackend", widget_projection()))
        .build()
        .unwrap();
    let env = create_test_environment_with(settings, registry, FakeTransport::default());
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let dispatched = env
        .state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap();

    assert_eq!(dispatched, 1);
    assert!(env.transport.triggers().is_empty());
}

#[tokio::test]
async fn test_noop_provider_hint() {
    let env = create_test_environment(vec![
        BackendDescriptor::new("WidgetBackend", widget_projection()).with_provider("noop"),
    ]);
    let ctx = MutationContext::new().with_channels(["widgets"]);

    env.state
        .dispatcher
        .push_changes(&ctx, "widget", EventType::Create, Some(&widget("Foo")))
        .await
        .unwrap();

    assert!(env.transport.triggers().is_empty());
}

#[tokio::test]
async fn test_unknown_provider_hint_fails() {
    let env = create_test_environment(vec![
        BackendDescriptor::new("WidgetBackend", widget_projection()).with_provider("ably"),
    ]);
    let ctx = MutationContext::new().with_channels(["widgets"]);

    let err = env
        .state
        .dispatcher
        .created(&ctx, &widget("Foo"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Configuration(_)));
}
