//! Event-to-channel dispatch pipeline.
//!
//! A mutation reported to [`ModelDispatcher`] is fanned out to every backend
//! registered for the entity type. Each [`DispatchBackend`] resolves its
//! channels, event name and payload into a [`Packet`] and publishes it on the
//! notification bus.

mod backend;
mod context;
mod dispatcher;
mod packet;

pub use backend::DispatchBackend;
pub use context::{origin_socket_from_headers, DispatchContext, MutationContext, SOCKET_ID_HEADER};
pub use dispatcher::{DispatcherStats, DispatcherStatsSnapshot, ModelDispatcher, PushToggles};
pub use packet::{EventType, Packet};
