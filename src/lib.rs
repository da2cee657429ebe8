// Ambient stack
pub mod config;
pub mod error;
pub mod metrics;

// Dispatch pipeline
pub mod dispatch;
pub mod registry;
pub mod serializer;
pub mod signal;

// Delivery
pub mod occupancy;
pub mod provider;
pub mod transport;
pub mod webhook;

// Application layer
pub mod api;
pub mod server;
