//! API layer - HTTP endpoint handlers organized by domain.

mod entities;
mod health;
mod introspection;
mod metrics;
mod push;
mod routes;

pub use entities::{entity_event, EntityEventRequest, EntityEventResponse};
pub use health::{health, stats};
pub use introspection::{channel_occupancy, list_backends};
pub use metrics::prometheus_metrics;
pub use push::{push_event, PushRequest, PushResponse};
pub use routes::api_routes;
